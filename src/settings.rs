use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::Result;

/// Settle delays in milliseconds. Each one waits for a UI animation or a
/// travel to finish before the next observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Timings {
    pub after_coord_tab: u64,
    pub field_settle: u64,
    pub press_release: u64,
    pub key_interval: u64,
    pub after_click: u64,
    pub after_go: u64,
    pub after_open_panel: u64,
    pub attack_retry: u64,
    pub after_reposition: u64,
    pub after_reopen: u64,
    pub after_share: u64,
    pub after_alliance: u64,
    pub after_target: u64,
}

impl Default for Timings {
    fn default() -> Self {
        Self {
            after_coord_tab: 250,
            field_settle: 120,
            press_release: 30,
            key_interval: 40,
            after_click: 80,
            after_go: 1400, // world-map travel
            after_open_panel: 250,
            attack_retry: 350,
            after_reposition: 120,
            after_reopen: 300,
            after_share: 250,
            after_alliance: 250,
            after_target: 200,
        }
    }
}

impl Timings {
    /// No waits at all. For tests and dry runs against fake adapters.
    pub fn instant() -> Self {
        Self {
            after_coord_tab: 0,
            field_settle: 0,
            press_release: 0,
            key_interval: 0,
            after_click: 0,
            after_go: 0,
            after_open_panel: 0,
            attack_retry: 0,
            after_reposition: 0,
            after_reopen: 0,
            after_share: 0,
            after_alliance: 0,
            after_target: 0,
        }
    }
}

pub const DEFAULT_VERIFY_POOL: [&str; 23] = [
    "Azazel.png",
    "StymphalianBirdPower.png",
    "KrakenPower.png",
    "AmmitPower.png",
    "Turtle6.png",
    "Turtle5.png",
    "Cerb4.png",
    "Cerb3.png",
    "Sphinx7.png",
    "Sphinx6.png",
    "Sphinx5.png",
    "ymir3.png",
    "ymir4.png",
    "ymir5.png",
    "ymir6.png",
    "PanRange6.png",
    "PanCav4.png",
    "PanCav5.png",
    "PanCav6.png",
    "Warlord3.png",
    "Warlord4.png",
    "Warlord5.png",
    "Warlord6.png",
];

pub const PRIORITY_MONSTERS: [&str; 9] = [
    "Warlord",
    "Pan",
    "Kraken",
    "Azazel",
    "Sphinx",
    "Cerberus",
    "Stymphalian Bird",
    "Ymir",
    "Ammit",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppSettings {
    pub process_name: String,
    pub images_dir: PathBuf,
    pub click_jitter: i32,
    pub strict_threshold: f32,
    pub relaxed_threshold: f32,
    pub timings: Timings,
    pub verify_pool: Vec<String>,
    pub priority_monster: String,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            process_name: "Evony.exe".to_string(),
            images_dir: PathBuf::from("Images"),
            click_jitter: 3,
            strict_threshold: 0.82,
            relaxed_threshold: 0.72,
            timings: Timings::default(),
            verify_pool: DEFAULT_VERIFY_POOL.iter().map(|s| s.to_string()).collect(),
            priority_monster: PRIORITY_MONSTERS[0].to_string(),
        }
    }
}

impl AppSettings {
    const SETTINGS_FILE: &'static str = "evony_cdb_settings.json";

    /// Settings file next to the executable, or in the working directory if
    /// the executable path is unknown.
    pub fn default_path() -> PathBuf {
        std::env::current_exe()
            .ok()
            .and_then(|exe| exe.parent().map(|dir| dir.join(Self::SETTINGS_FILE)))
            .unwrap_or_else(|| PathBuf::from(Self::SETTINGS_FILE))
    }

    /// Load settings from file, or create default if doesn't exist
    pub fn load() -> Self {
        Self::load_from(&Self::default_path())
    }

    pub fn load_from(path: &Path) -> Self {
        match fs::read_to_string(path) {
            Ok(contents) => match serde_json::from_str::<AppSettings>(&contents) {
                Ok(mut settings) => {
                    if settings.verify_pool.is_empty() {
                        settings.verify_pool = Self::default().verify_pool;
                    }
                    settings
                }
                Err(e) => {
                    tracing::warn!("Ignoring unreadable settings file {}: {}", path.display(), e);
                    Self::default()
                }
            },
            Err(_) => Self::default(),
        }
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::default_path())
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    /// Auto-save (ignores errors)
    pub fn auto_save(&self) {
        if let Err(e) = self.save() {
            tracing::debug!("Auto-save failed: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = AppSettings::default();
        assert_eq!(settings.click_jitter, 3);
        assert_eq!(settings.verify_pool.len(), 23);
        assert_eq!(settings.timings.after_go, 1400);
        assert!(settings.strict_threshold > settings.relaxed_threshold);
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");

        let mut settings = AppSettings::default();
        settings.process_name = "chrome.exe".to_string();
        settings.timings = Timings::instant();
        settings.save_to(&path).unwrap();

        assert_eq!(AppSettings::load_from(&path), settings);
    }

    #[test]
    fn test_partial_and_corrupt_files_fall_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let partial = dir.path().join("partial.json");
        fs::write(&partial, r#"{ "click_jitter": 5, "timings": { "after_go": 2000 } }"#).unwrap();

        let loaded = AppSettings::load_from(&partial);
        assert_eq!(loaded.click_jitter, 5);
        assert_eq!(loaded.timings.after_go, 2000);
        assert_eq!(loaded.timings.after_click, 80);
        assert_eq!(loaded.process_name, "Evony.exe");

        let corrupt = dir.path().join("corrupt.json");
        fs::write(&corrupt, "{ not json").unwrap();
        assert_eq!(AppSettings::load_from(&corrupt), AppSettings::default());

        let missing = dir.path().join("missing.json");
        assert_eq!(AppSettings::load_from(&missing), AppSettings::default());
    }
}
