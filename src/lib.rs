//! Unattended boss-coordinate sharing for the Evony client.
//!
//! The engine captures the game window, finds known UI fragments with
//! multi-scale ZNCC template matching, and clicks or types on the matches.
//! Win32 adapters live behind the traits in [`crate::core::platform`] so the
//! matcher and pipeline run (and are tested) on any platform.

pub mod automation;
pub mod core;
pub mod error;
pub mod settings;

pub use crate::automation::detection::{MatchParams, MatchResult, Matcher, ScaleRange};
pub use crate::automation::pipeline::{PipelineConfig, ProgressEvent, RunSummary, SharePipeline};
pub use crate::automation::templates::TemplateStore;
pub use crate::core::frame::CaptureFrame;
pub use crate::core::target_parser::{parse_targets, Target};
pub use crate::error::{AutomationError, Result};
pub use crate::settings::AppSettings;
