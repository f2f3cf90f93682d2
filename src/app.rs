use std::time::Duration;

use eframe::egui;
use evony_cdb::core::input::is_escape_key_down;
use evony_cdb::core::platform::GameWindow;
use evony_cdb::core::window::Win32Window;
use evony_cdb::AppSettings;

use crate::tools::coord_share::CoordShareTool;
use crate::ui::app_header::{render_header, HeaderAction};
use crate::ui::log_panel::render_log_panel;

pub struct EvonyCdbApp {
    settings: AppSettings,
    window: Option<Win32Window>,
    connection_status: String,
    show_log: bool,
    coord_share: CoordShareTool,
}

impl Default for EvonyCdbApp {
    fn default() -> Self {
        Self {
            settings: AppSettings::load(),
            window: None,
            connection_status: "Not connected".to_string(),
            show_log: true,
            coord_share: CoordShareTool::default(),
        }
    }
}

impl eframe::App for EvonyCdbApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        // Emergency stop, works while the game has focus
        if self.coord_share.is_running() && is_escape_key_down() {
            self.coord_share.stop();
        }

        if let Some(window) = self.window {
            if !window.is_valid() {
                self.window = None;
                self.connection_status = "Game window closed".to_string();
            }
        }

        let before = self.settings.clone();

        egui::TopBottomPanel::top("header").show(ctx, |ui| {
            ui.add_space(4.0);
            match render_header(
                ui,
                &mut self.settings.process_name,
                self.window.as_ref(),
                &mut self.connection_status,
            ) {
                HeaderAction::Connect(window) => {
                    window.focus();
                    self.window = Some(window);
                }
                HeaderAction::Disconnect => self.window = None,
                HeaderAction::ToggleLog => self.show_log = !self.show_log,
                HeaderAction::None => {}
            }
            ui.add_space(4.0);
        });

        if self.show_log {
            let is_running = self.coord_share.is_running();
            let log = self.coord_share.worker().log_snapshot();
            if render_log_panel(ctx, &log, is_running) {
                self.coord_share.worker().clear_log();
            }
        }

        egui::CentralPanel::default().show(ctx, |ui| {
            egui::ScrollArea::vertical().show(ui, |ui| {
                self.coord_share.update(ui, &mut self.settings, self.window);
            });
        });

        if self.settings != before {
            self.settings.auto_save();
        }

        // Keep polling ESC and the worker log while a run is active
        if self.coord_share.is_running() {
            ctx.request_repaint_after(Duration::from_millis(100));
        }
    }
}
