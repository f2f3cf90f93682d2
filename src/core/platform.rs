// Capability seams between the engine and the operating system.
use crate::core::coords::Rect;
use crate::core::frame::CaptureFrame;
use crate::error::Result;

/// An attached top-level window of the target application.
pub trait GameWindow {
    /// Current outer bounds in screen coordinates, `None` if the window is gone.
    fn bounds(&self) -> Option<Rect>;

    /// Picture of the window's current contents. Degenerate bounds give an
    /// empty frame; only OS faults are errors.
    fn capture(&self) -> Result<CaptureFrame>;

    /// Restore and bring the window to the foreground.
    fn focus(&self) -> bool;
}

/// Global synthetic input. These events go to whatever window has focus.
pub trait InputDevice {
    fn move_to(&mut self, x: i32, y: i32) -> Result<()>;
    fn left_down(&mut self) -> Result<()>;
    fn left_up(&mut self) -> Result<()>;
    /// Select the focused field's whole content.
    fn select_all(&mut self) -> Result<()>;
    fn delete(&mut self) -> Result<()>;
    fn type_text(&mut self, text: &str) -> Result<()>;
}

/// Resolves a running application to its main window.
pub trait WindowLocator {
    type Window: GameWindow;

    fn attach(&self, process_name: &str) -> Result<Self::Window>;
}

/// "Evony.exe" -> "Evony"
pub fn normalize_process_name(name: &str) -> String {
    let trimmed = name.trim();
    match trimmed.len().checked_sub(4) {
        Some(stem) if stem > 0 && trimmed.is_char_boundary(stem) => {
            if trimmed[stem..].eq_ignore_ascii_case(".exe") {
                trimmed[..stem].to_string()
            } else {
                trimmed.to_string()
            }
        }
        _ => trimmed.to_string(),
    }
}
