use eframe::egui;
use evony_cdb::settings::PRIORITY_MONSTERS;

use crate::ui::status::render_status;

#[derive(Debug)]
pub enum ShareUiAction {
    BrowseImages,
    SortMonsters,
    ClearMonsters,
    Activate,
    Stop,
    None,
}

/// Render the coordinate share tab
pub fn render_ui(
    ui: &mut egui::Ui,
    coords_text: &mut String,
    monster_text: &mut String,
    priority_monster: &mut String,
    images_dir: &str,
    is_running: bool,
    status: &str,
    progress: (usize, usize),
    game_connected: bool,
) -> ShareUiAction {
    let mut action = ShareUiAction::None;

    ui.heading("Coordinate Share");
    ui.label("Visits each boss coordinate, checks the boss and shares it to alliance chat.");
    ui.separator();

    if !game_connected {
        ui.colored_label(egui::Color32::RED, "Please connect to game first (top right)");
    }

    // Targets
    ui.label("Coordinates (one or more \"(xy: X Y)\" entries):");
    ui.add_enabled(
        !is_running,
        egui::TextEdit::multiline(coords_text)
            .hint_text("Lv21 Azazel (xy: 460 589) 144km")
            .desired_rows(6)
            .desired_width(f32::INFINITY),
    );

    ui.add_space(8.0);

    // Monster list sorter
    egui::CollapsingHeader::new("Monster list sorter")
        .default_open(false)
        .show(ui, |ui| {
            ui.add(
                egui::TextEdit::multiline(monster_text)
                    .hint_text("Lv5 Pan (Cavalry Troop) (xy: 760 746)")
                    .desired_rows(5)
                    .desired_width(f32::INFINITY),
            );
            ui.horizontal(|ui| {
                ui.label("Priority:");
                egui::ComboBox::from_id_source("priority_monster")
                    .selected_text(priority_monster.as_str())
                    .show_ui(ui, |ui| {
                        for name in PRIORITY_MONSTERS {
                            ui.selectable_value(priority_monster, name.to_string(), name);
                        }
                    });
                if ui.button("Sort").clicked() {
                    action = ShareUiAction::SortMonsters;
                }
                if ui.button("Clear").clicked() {
                    action = ShareUiAction::ClearMonsters;
                }
            });
        });

    ui.add_space(8.0);

    ui.horizontal(|ui| {
        ui.label("Images:");
        ui.label(egui::RichText::new(images_dir).monospace());
        if ui.add_enabled(!is_running, egui::Button::new("Browse...")).clicked() {
            action = ShareUiAction::BrowseImages;
        }
    });

    ui.separator();

    // Controls
    if is_running {
        ui.horizontal(|ui| {
            ui.colored_label(egui::Color32::GREEN, "RUNNING");
            if ui.button("Stop").clicked() {
                action = ShareUiAction::Stop;
            }
            ui.label(
                egui::RichText::new("ESC stops the run")
                    .small()
                    .color(egui::Color32::GRAY),
            );
        });
    } else if ui
        .add_enabled(game_connected, egui::Button::new("Activate"))
        .clicked()
    {
        action = ShareUiAction::Activate;
    }

    ui.separator();

    render_status(ui, status, progress);

    action
}
