use std::path::{Path, PathBuf};
use std::sync::Arc;

use eframe::egui;
use evony_cdb::automation::context::AutomationContext;
use evony_cdb::core::input::{is_escape_key_down, Win32Input};
use evony_cdb::core::target_parser::{parse_targets, sort_monster_lines};
use evony_cdb::core::window::{Win32Locator, Win32Window};
use evony_cdb::core::worker::{Severity, Worker, WorkerShared};
use evony_cdb::{AppSettings, TemplateStore};

use crate::ui::share_panel::{render_ui, ShareUiAction};

pub struct CoordShareTool {
    coords_text: String,
    monster_text: String,
    worker: Worker,
    /// Decoded templates, kept across runs while the folder stays the same.
    store: Option<Arc<TemplateStore>>,
}

impl Default for CoordShareTool {
    fn default() -> Self {
        Self {
            coords_text: String::new(),
            monster_text: String::new(),
            worker: Worker::new(),
            store: None,
        }
    }
}

impl CoordShareTool {
    pub fn stop(&mut self) {
        if self.worker.is_running() {
            self.worker.stop();
            self.worker.shared().log(Severity::Warn, "Stop requested");
        }
    }

    pub fn is_running(&self) -> bool {
        self.worker.is_running()
    }

    pub fn worker(&self) -> &WorkerShared {
        self.worker.shared()
    }

    pub fn update(
        &mut self,
        ui: &mut egui::Ui,
        settings: &mut AppSettings,
        window: Option<Win32Window>,
    ) {
        if window.is_none() && self.worker.is_running() {
            self.worker.stop();
            self.worker.set_status("Disconnected");
        }

        let is_running = self.worker.is_running();
        let status = self.worker.get_status();
        let progress = self.worker.shared().progress();
        let images_dir = settings.images_dir.display().to_string();

        let action = render_ui(
            ui,
            &mut self.coords_text,
            &mut self.monster_text,
            &mut settings.priority_monster,
            &images_dir,
            is_running,
            &status,
            progress,
            window.is_some(),
        );

        match action {
            ShareUiAction::BrowseImages => {
                if let Some(dir) = rfd::FileDialog::new()
                    .set_directory(&settings.images_dir)
                    .pick_folder()
                {
                    settings.images_dir = dir;
                }
            }
            ShareUiAction::SortMonsters => {
                self.monster_text =
                    sort_monster_lines(&self.monster_text, &settings.priority_monster);
            }
            ShareUiAction::ClearMonsters => self.monster_text.clear(),
            ShareUiAction::Activate => match window {
                Some(window) => self.start(settings, window),
                None => self.worker.set_status("Connect to game first"),
            },
            ShareUiAction::Stop => self.stop(),
            ShareUiAction::None => {}
        }
    }

    fn store_for(&mut self, dir: &Path) -> Arc<TemplateStore> {
        if let Some(store) = &self.store {
            if store.dir() == dir {
                return Arc::clone(store);
            }
        }
        let store = Arc::new(TemplateStore::new(dir));
        self.store = Some(Arc::clone(&store));
        store
    }

    fn start(&mut self, settings: &AppSettings, window: Win32Window) {
        let shared = self.worker.shared();
        shared.clear_log();
        shared.log(Severity::Info, "== Activate clicked, starting pipeline ==");

        let targets = parse_targets(&self.coords_text);
        shared.log(Severity::Info, format!("Parsed {} targets.", targets.len()));
        if targets.is_empty() {
            shared.log(
                Severity::Warn,
                "No valid coordinates parsed. Expected: Lv21 Azazel (xy: 460 589) 144km",
            );
            self.worker.set_status("No targets");
            return;
        }
        shared.set_progress(0, targets.len());

        let images_dir: PathBuf = std::env::current_dir()
            .map(|cwd| cwd.join(&settings.images_dir))
            .unwrap_or_else(|_| settings.images_dir.clone());
        let store = self.store_for(&images_dir);
        let mut settings = settings.clone();
        settings.images_dir = images_dir;
        let locator_pid = window.pid();

        self.worker.set_status("Running...");
        self.worker.start(move |shared: WorkerShared| {
            let input = match Win32Input::new() {
                Ok(input) => input,
                Err(e) => {
                    shared.log(Severity::Error, e.to_string());
                    shared.set_status("Error: input unavailable");
                    return;
                }
            };

            let ctx = match AutomationContext::attach(&Win32Locator, &settings, store) {
                Ok(ctx) => ctx,
                Err(e) => {
                    shared.log(Severity::Error, e.to_string());
                    shared.set_status(&format!("Failed: {}", e));
                    return;
                }
            };
            if ctx.window.pid() != locator_pid {
                shared.log(
                    Severity::Info,
                    format!("Game restarted, now attached to PID {}", ctx.window.pid()),
                );
            }

            let mut pipeline = ctx.into_pipeline(input);
            let summary = pipeline.run(&targets, shared.running_flag(), |event| {
                shared.log(event.severity, event.message.clone());
                shared.set_progress(event.completed, event.total);
                if is_escape_key_down() {
                    shared.set_running(false);
                }
            });

            let status = if let Some(reason) = &summary.aborted {
                format!("Aborted: {}", reason)
            } else if summary.stopped {
                "Stopped".to_string()
            } else {
                "Done".to_string()
            };
            shared.log(Severity::Info, format!("Summary: {}", summary.describe()));
            shared.set_status(&status);
        });
    }
}
