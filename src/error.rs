//! Error types for the automation engine.

use std::path::PathBuf;
use thiserror::Error;

/// Faults that stop a run or prevent it from starting.
///
/// Expected misses (a template that is absent, a score below threshold, an
/// empty capture) are not errors; they travel as sentinels in the returned
/// values instead.
#[derive(Error, Debug)]
pub enum AutomationError {
    #[error("Images folder not found: {0}")]
    ImagesDirMissing(PathBuf),

    #[error("Missing template: {0}")]
    TemplateMissing(PathBuf),

    #[error("Process \"{0}\" not found.")]
    ProcessNotFound(String),

    #[error("Found the process, but no top-level window was detected.")]
    WindowNotFound,

    #[error("No process name provided.")]
    EmptyProcessName,

    #[error("OS call failed: {0}")]
    Os(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Settings error: {0}")]
    Settings(#[from] serde_json::Error),
}

/// Result type alias for automation operations
pub type Result<T> = std::result::Result<T, AutomationError>;
