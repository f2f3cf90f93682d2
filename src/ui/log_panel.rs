use eframe::egui;
use evony_cdb::core::worker::{LogLine, Severity};

fn severity_color(severity: Severity) -> egui::Color32 {
    match severity {
        Severity::Info => egui::Color32::from_rgb(200, 200, 200),
        Severity::Warn => egui::Color32::from_rgb(255, 165, 0),
        Severity::Error => egui::Color32::from_rgb(255, 100, 100),
    }
}

pub fn render_log_panel(ctx: &egui::Context, log_snapshot: &[LogLine], is_running: bool) -> bool {
    const RUNNING_LOG_LINES: usize = 12;
    let mut clear = false;

    egui::SidePanel::right("log_panel")
        .resizable(true)
        .default_width(320.0)
        .min_width(200.0)
        .show(ctx, |ui| {
            egui::Frame::none()
                .fill(egui::Color32::from_rgb(12, 12, 12))
                .inner_margin(egui::Margin::same(8.0))
                .show(ui, |ui| {
                    ui.horizontal(|ui| {
                        ui.label(
                            egui::RichText::new("Log")
                                .strong()
                                .color(egui::Color32::LIGHT_GRAY),
                        );
                        ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                            if !is_running && ui.small_button("Clear").clicked() {
                                clear = true;
                            }
                            ui.label(
                                egui::RichText::new(format!("{} lines", log_snapshot.len()))
                                    .small()
                                    .color(egui::Color32::DARK_GRAY),
                            );
                        });
                    });

                    ui.add_space(6.0);
                    egui::ScrollArea::vertical()
                        .auto_shrink([false, false])
                        .stick_to_bottom(true)
                        .show(ui, |ui| {
                            if log_snapshot.is_empty() {
                                ui.label(
                                    egui::RichText::new("No log entries yet.")
                                        .italics()
                                        .color(egui::Color32::DARK_GRAY),
                                );
                                return;
                            }
                            // Keep the frame cheap while the worker is appending
                            let start_idx = if is_running {
                                log_snapshot.len().saturating_sub(RUNNING_LOG_LINES)
                            } else {
                                0
                            };
                            for line in &log_snapshot[start_idx..] {
                                ui.label(
                                    egui::RichText::new(line.render())
                                        .monospace()
                                        .color(severity_color(line.severity)),
                                );
                            }
                        });
                });
        });

    clear
}
