use eframe::egui;

pub fn render_status(ui: &mut egui::Ui, status: &str, progress: (usize, usize)) {
    ui.horizontal(|ui| {
        ui.label(egui::RichText::new("Status:").strong());

        let status_color = if status.contains("Running") || status.contains("Connected") {
            egui::Color32::from_rgb(100, 255, 100)
        } else if status.contains("Error")
            || status.contains("Failed")
            || status.contains("Aborted")
        {
            egui::Color32::from_rgb(255, 100, 100)
        } else {
            egui::Color32::GRAY
        };

        ui.label(egui::RichText::new(status).color(status_color));
    });

    let (done, total) = progress;
    let fraction = if total == 0 {
        0.0
    } else {
        done as f32 / total as f32
    };
    ui.add(
        egui::ProgressBar::new(fraction)
            .text(format!("{}/{}", done, total))
            .desired_width(f32::INFINITY),
    );
}
