use eframe::egui;
use evony_cdb::core::platform::WindowLocator;
use evony_cdb::core::window::{Win32Locator, Win32Window};

const KNOWN_PROCESSES: [&str; 4] = ["Evony.exe", "chrome.exe", "msedge.exe", "firefox.exe"];

pub enum HeaderAction {
    Connect(Win32Window),
    Disconnect,
    ToggleLog,
    None,
}

/// Render the unified app header (Connection Status + Utility Buttons)
pub fn render_header(
    ui: &mut egui::Ui,
    process_name: &mut String,
    window: Option<&Win32Window>,
    connection_status: &mut String,
) -> HeaderAction {
    let mut action = HeaderAction::None;

    ui.horizontal(|ui| {
        // --- Left Side: Connection status stack ---
        ui.vertical(|ui| {
            if let Some(window) = window {
                ui.label(
                    egui::RichText::new(format!("Connected (PID: {})", window.pid()))
                        .color(egui::Color32::from_rgb(168, 226, 187))
                        .strong(),
                );

                if let Some(rect) = window.extended_bounds() {
                    ui.label(
                        egui::RichText::new(format!("{}x{}", rect.width, rect.height))
                            .color(egui::Color32::from_rgb(140, 140, 140))
                            .small(),
                    );
                }
            } else {
                ui.label(
                    egui::RichText::new(format!("Status: {}", connection_status))
                        .color(egui::Color32::from_rgb(200, 200, 200))
                        .strong(),
                );
            }
        });

        // --- Right Side: All Buttons ---
        ui.with_layout(egui::Layout::right_to_left(egui::Align::Min), |ui| {
            ui.spacing_mut().item_spacing = egui::vec2(6.0, 0.0);
            let button_size = egui::vec2(80.0, 26.0);
            let compact_size = egui::vec2(50.0, 26.0);

            if ui
                .add_sized(compact_size, egui::Button::new("Log"))
                .clicked()
            {
                action = HeaderAction::ToggleLog;
            }

            if window.is_none() {
                if ui
                    .add_sized(button_size, egui::Button::new("Connect"))
                    .clicked()
                {
                    match Win32Locator.attach(process_name) {
                        Ok(found) => {
                            *connection_status = format!("Connected (PID: {})", found.pid());
                            action = HeaderAction::Connect(found);
                        }
                        Err(e) => {
                            *connection_status = format!("Failed: {}", e);
                        }
                    }
                }
            } else if ui
                .add_sized(button_size, egui::Button::new("Disconnect"))
                .clicked()
            {
                *connection_status = "Disconnected".to_string();
                action = HeaderAction::Disconnect;
            }

            ui.add_enabled_ui(window.is_none(), |ui| {
                egui::ComboBox::from_id_source("process_name")
                    .selected_text(process_name.as_str())
                    .width(120.0)
                    .show_ui(ui, |ui| {
                        for name in KNOWN_PROCESSES {
                            ui.selectable_value(process_name, name.to_string(), name);
                        }
                    });
            });
        });
    });

    action
}
