#[cfg(windows)]
mod app;
#[cfg(windows)]
mod tools;
#[cfg(windows)]
mod ui;

use tracing_subscriber::EnvFilter;

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
}

#[cfg(windows)]
fn main() -> Result<(), eframe::Error> {
    use eframe::egui;

    init_tracing();

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([900.0, 620.0])
            .with_title("Evony CDB - Coordinate Share"),
        ..Default::default()
    };

    eframe::run_native(
        "Evony CDB",
        options,
        Box::new(|_cc| Box::new(app::EvonyCdbApp::default())),
    )
}

#[cfg(not(windows))]
fn main() {
    init_tracing();
    tracing::error!("evony-cdb drives the Windows game client and only runs on Windows");
    std::process::exit(1);
}
