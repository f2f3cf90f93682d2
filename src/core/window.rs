use std::time::{Duration, Instant};

use windows::{
    Win32::Foundation::{CloseHandle, BOOL, HWND, LPARAM, RECT},
    Win32::Graphics::Dwm::{DwmGetWindowAttribute, DWMWA_EXTENDED_FRAME_BOUNDS},
    Win32::System::Diagnostics::ToolHelp::{
        CreateToolhelp32Snapshot, Process32FirstW, Process32NextW, PROCESSENTRY32W,
        TH32CS_SNAPPROCESS,
    },
    Win32::UI::WindowsAndMessaging::{
        EnumWindows, GetWindow, GetWindowRect, GetWindowThreadProcessId, IsIconic, IsWindow,
        IsWindowVisible, SetForegroundWindow, ShowWindowAsync, GW_OWNER, SW_RESTORE, SW_SHOW,
    },
};

use crate::core::coords::Rect;
use crate::core::frame::CaptureFrame;
use crate::core::platform::{normalize_process_name, GameWindow, WindowLocator};
use crate::core::screen_capture::capture_window;
use crate::error::{AutomationError, Result};

const WINDOW_WAIT: Duration = Duration::from_millis(2000);
const WINDOW_POLL: Duration = Duration::from_millis(50);

/// Main window of an attached process.
#[derive(Debug, Clone, Copy)]
pub struct Win32Window {
    hwnd: HWND,
    pid: u32,
}

impl Win32Window {
    pub fn hwnd(&self) -> HWND {
        self.hwnd
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }

    pub fn is_valid(&self) -> bool {
        is_window_valid(self.hwnd)
    }

    /// DWM extended frame bounds (excludes the drop shadow), falling back to
    /// the plain window rectangle.
    pub fn extended_bounds(&self) -> Option<Rect> {
        get_extended_frame_bounds(self.hwnd).or_else(|| get_window_rect(self.hwnd))
    }
}

impl GameWindow for Win32Window {
    fn bounds(&self) -> Option<Rect> {
        get_window_rect(self.hwnd)
    }

    fn capture(&self) -> Result<CaptureFrame> {
        capture_window(self.hwnd)
    }

    fn focus(&self) -> bool {
        unsafe {
            if IsIconic(self.hwnd).as_bool() {
                let _ = ShowWindowAsync(self.hwnd, SW_RESTORE);
            } else {
                let _ = ShowWindowAsync(self.hwnd, SW_SHOW);
            }
            SetForegroundWindow(self.hwnd).as_bool()
        }
    }
}

/// Finds a process by executable name and resolves its top-level window.
#[derive(Debug, Default, Clone, Copy)]
pub struct Win32Locator;

impl WindowLocator for Win32Locator {
    type Window = Win32Window;

    fn attach(&self, process_name: &str) -> Result<Win32Window> {
        let name = normalize_process_name(process_name);
        if name.is_empty() {
            return Err(AutomationError::EmptyProcessName);
        }

        let pids = find_process_ids(&name)?;
        if pids.is_empty() {
            return Err(AutomationError::ProcessNotFound(name));
        }

        // The window may not exist yet right after the process starts
        let deadline = Instant::now() + WINDOW_WAIT;
        loop {
            for &pid in &pids {
                if let Some(hwnd) = find_top_level_window(pid) {
                    return Ok(Win32Window { hwnd, pid });
                }
            }
            if Instant::now() >= deadline {
                return Err(AutomationError::WindowNotFound);
            }
            std::thread::sleep(WINDOW_POLL);
        }
    }
}

fn find_process_ids(name: &str) -> Result<Vec<u32>> {
    let wanted = format!("{}.exe", name);
    let mut pids = Vec::new();
    unsafe {
        let snapshot = CreateToolhelp32Snapshot(TH32CS_SNAPPROCESS, 0)
            .map_err(|e| AutomationError::Os(format!("CreateToolhelp32Snapshot: {}", e)))?;

        let mut entry = PROCESSENTRY32W {
            dwSize: std::mem::size_of::<PROCESSENTRY32W>() as u32,
            ..Default::default()
        };

        let mut more = Process32FirstW(snapshot, &mut entry).is_ok();
        while more {
            let len = entry
                .szExeFile
                .iter()
                .position(|&c| c == 0)
                .unwrap_or(entry.szExeFile.len());
            let exe = String::from_utf16_lossy(&entry.szExeFile[..len]);
            if exe.eq_ignore_ascii_case(&wanted) || exe.eq_ignore_ascii_case(name) {
                pids.push(entry.th32ProcessID);
            }
            more = Process32NextW(snapshot, &mut entry).is_ok();
        }

        let _ = CloseHandle(snapshot);
    }
    Ok(pids)
}

struct WindowSearch {
    pid: u32,
    found: Option<HWND>,
}

unsafe extern "system" fn enum_windows_callback(hwnd: HWND, lparam: LPARAM) -> BOOL {
    let search = &mut *(lparam.0 as *mut WindowSearch);
    if !IsWindowVisible(hwnd).as_bool() {
        return BOOL(1);
    }
    let mut pid = 0u32;
    GetWindowThreadProcessId(hwnd, Some(&mut pid));
    if pid == search.pid && GetWindow(hwnd, GW_OWNER).0 == 0 {
        search.found = Some(hwnd);
        return BOOL(0); // stop
    }
    BOOL(1)
}

/// Visible, unowned top-level window belonging to `pid`
fn find_top_level_window(pid: u32) -> Option<HWND> {
    let mut search = WindowSearch { pid, found: None };
    unsafe {
        // EnumWindows reports an error when the callback stops early
        let _ = EnumWindows(
            Some(enum_windows_callback),
            LPARAM(&mut search as *mut WindowSearch as isize),
        );
    }
    search.found.filter(|hwnd| is_window_valid(*hwnd))
}

/// Check if window handle is valid
pub fn is_window_valid(hwnd: HWND) -> bool {
    unsafe { IsWindow(hwnd).as_bool() }
}

/// Get window rectangle in screen coordinates
pub fn get_window_rect(hwnd: HWND) -> Option<Rect> {
    unsafe {
        let mut rect = RECT::default();
        if GetWindowRect(hwnd, &mut rect).is_ok() {
            Some(Rect::from_ltrb(rect.left, rect.top, rect.right, rect.bottom))
        } else {
            None
        }
    }
}

fn get_extended_frame_bounds(hwnd: HWND) -> Option<Rect> {
    unsafe {
        let mut rect = RECT::default();
        DwmGetWindowAttribute(
            hwnd,
            DWMWA_EXTENDED_FRAME_BOUNDS,
            &mut rect as *mut RECT as *mut _,
            std::mem::size_of::<RECT>() as u32,
        )
        .ok()?;
        Some(Rect::from_ltrb(rect.left, rect.top, rect.right, rect.bottom))
    }
}
