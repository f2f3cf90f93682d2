use rustautogui::RustAutoGui;
use windows::Win32::UI::Input::KeyboardAndMouse::{
    GetAsyncKeyState, SendInput, INPUT, INPUT_0, INPUT_MOUSE, MOUSEEVENTF_LEFTDOWN,
    MOUSEEVENTF_LEFTUP, MOUSE_EVENT_FLAGS, MOUSEINPUT,
};
use windows::Win32::UI::WindowsAndMessaging::SetCursorPos;

use crate::core::platform::InputDevice;
use crate::error::{AutomationError, Result};

/// Real pointer and keyboard. Moves the system cursor; keystrokes go to
/// whichever window is in the foreground.
pub struct Win32Input {
    gui: RustAutoGui,
}

impl Win32Input {
    pub fn new() -> Result<Self> {
        let gui = RustAutoGui::new(false)
            .map_err(|e| {
                AutomationError::Os(format!("Failed to initialize RustAutoGui: {:?}", e))
            })?;
        Ok(Self { gui })
    }
}

fn send_mouse(flags: MOUSE_EVENT_FLAGS) -> Result<()> {
    let input = INPUT {
        r#type: INPUT_MOUSE,
        Anonymous: INPUT_0 {
            mi: MOUSEINPUT {
                dx: 0,
                dy: 0,
                mouseData: 0,
                dwFlags: flags,
                time: 0,
                dwExtraInfo: 0,
            },
        },
    };
    let sent = unsafe { SendInput(&[input], std::mem::size_of::<INPUT>() as i32) };
    if sent == 1 {
        Ok(())
    } else {
        Err(AutomationError::Os("SendInput was blocked".into()))
    }
}

impl InputDevice for Win32Input {
    fn move_to(&mut self, x: i32, y: i32) -> Result<()> {
        unsafe { SetCursorPos(x, y) }
            .map_err(|e| AutomationError::Os(format!("SetCursorPos failed: {}", e)))
    }

    fn left_down(&mut self) -> Result<()> {
        send_mouse(MOUSEEVENTF_LEFTDOWN)
    }

    fn left_up(&mut self) -> Result<()> {
        send_mouse(MOUSEEVENTF_LEFTUP)
    }

    fn select_all(&mut self) -> Result<()> {
        self.gui
            .keyboard_multi_key("ctrl", "a", None)
            .map_err(|e| AutomationError::Os(format!("Keyboard error: {:?}", e)))
    }

    fn delete(&mut self) -> Result<()> {
        self.gui
            .keyboard_command("delete")
            .map_err(|e| AutomationError::Os(format!("Keyboard error: {:?}", e)))
    }

    fn type_text(&mut self, text: &str) -> Result<()> {
        self.gui
            .keyboard_input(text)
            .map_err(|e| AutomationError::Os(format!("Keyboard error: {:?}", e)))
    }
}

/// Check if ESC key is currently down (works even when app doesn't have focus)
pub fn is_escape_key_down() -> bool {
    unsafe {
        let key_state = GetAsyncKeyState(0x1B); // VK_ESCAPE
        (key_state as u16) & 0x8000 != 0
    }
}
