//! Window capture into a [`CaptureFrame`](crate::core::frame::CaptureFrame).
//!
//! The Win32 path copies the window DC with `BitBlt`. Occluded or
//! hardware-accelerated windows often come back solid black that way, so an
//! all-black buffer is redrawn in place with `PrintWindow` and
//! `PW_RENDERFULLCONTENT`. Every GDI handle is owned by a guard that releases
//! it on drop, including on early returns.

use image::{Rgb, RgbImage};

#[cfg(windows)]
pub use win32::capture_window;

/// True when every pixel of a 32-bit BGRA buffer is black (alpha ignored).
pub fn is_all_black(bgra: &[u8]) -> bool {
    bgra.chunks_exact(4)
        .all(|px| px[0] == 0 && px[1] == 0 && px[2] == 0)
}

/// Convert a top-down BGRA buffer to an RGB image.
pub fn bgra_to_rgb(bgra: &[u8], width: u32, height: u32) -> RgbImage {
    let mut img = RgbImage::new(width, height);
    for (dst, src) in img.pixels_mut().zip(bgra.chunks_exact(4)) {
        *dst = Rgb([src[2], src[1], src[0]]);
    }
    img
}

#[cfg(windows)]
mod win32 {
    use windows::Win32::Foundation::HWND;
    use windows::Win32::Graphics::Gdi::{
        BitBlt, CreateCompatibleBitmap, CreateCompatibleDC, DeleteDC, DeleteObject, GetDIBits,
        GetWindowDC, ReleaseDC, SelectObject, BITMAPINFO, BITMAPINFOHEADER, BI_RGB,
        DIB_RGB_COLORS, HBITMAP, HDC, HGDIOBJ, SRCCOPY,
    };
    use windows::Win32::Storage::Xps::{PrintWindow, PRINT_WINDOW_FLAGS};

    use super::{bgra_to_rgb, is_all_black};
    use crate::core::frame::CaptureFrame;
    use crate::core::window::get_window_rect;
    use crate::error::{AutomationError, Result};

    const PW_RENDERFULLCONTENT: u32 = 0x0000_0002;

    struct WindowDc {
        hwnd: HWND,
        hdc: HDC,
    }

    impl WindowDc {
        unsafe fn acquire(hwnd: HWND) -> Result<Self> {
            let hdc = GetWindowDC(hwnd);
            if hdc.is_invalid() {
                return Err(AutomationError::Os("Failed to get window device context".into()));
            }
            Ok(Self { hwnd, hdc })
        }
    }

    impl Drop for WindowDc {
        fn drop(&mut self) {
            unsafe {
                ReleaseDC(self.hwnd, self.hdc);
            }
        }
    }

    struct MemoryDc(HDC);

    impl MemoryDc {
        unsafe fn compatible(source: &WindowDc) -> Result<Self> {
            let dc = CreateCompatibleDC(source.hdc);
            if dc.is_invalid() {
                return Err(AutomationError::Os("Failed to create compatible DC".into()));
            }
            Ok(Self(dc))
        }
    }

    impl Drop for MemoryDc {
        fn drop(&mut self) {
            unsafe {
                let _ = DeleteDC(self.0);
            }
        }
    }

    struct Bitmap(HBITMAP);

    impl Bitmap {
        unsafe fn compatible(source: &WindowDc, width: i32, height: i32) -> Result<Self> {
            let bitmap = CreateCompatibleBitmap(source.hdc, width, height);
            if bitmap.is_invalid() {
                return Err(AutomationError::Os("Failed to create compatible bitmap".into()));
            }
            Ok(Self(bitmap))
        }
    }

    impl Drop for Bitmap {
        fn drop(&mut self) {
            unsafe {
                let _ = DeleteObject(self.0);
            }
        }
    }

    /// Bitmap selected into a memory DC; restores the previous object on drop.
    struct Selection {
        dc: HDC,
        previous: HGDIOBJ,
    }

    impl Selection {
        unsafe fn select(dc: &MemoryDc, bitmap: &Bitmap) -> Self {
            let previous = SelectObject(dc.0, bitmap.0);
            Self { dc: dc.0, previous }
        }
    }

    impl Drop for Selection {
        fn drop(&mut self) {
            unsafe {
                SelectObject(self.dc, self.previous);
            }
        }
    }

    /// Capture the whole window (frame included) in window-local coordinates.
    pub fn capture_window(hwnd: HWND) -> Result<CaptureFrame> {
        let Some(bounds) = get_window_rect(hwnd) else {
            return Ok(CaptureFrame::empty());
        };
        if bounds.is_empty() {
            return Ok(CaptureFrame::empty());
        }
        let (width, height) = (bounds.width, bounds.height);

        unsafe {
            let window_dc = WindowDc::acquire(hwnd)?;
            let mem_dc = MemoryDc::compatible(&window_dc)?;
            let bitmap = Bitmap::compatible(&window_dc, width, height)?;

            {
                let _selected = Selection::select(&mem_dc, &bitmap);
                BitBlt(mem_dc.0, 0, 0, width, height, window_dc.hdc, 0, 0, SRCCOPY)
                    .map_err(|e| AutomationError::Os(format!("BitBlt failed: {}", e)))?;
            }
            let mut pixels = read_bits(&mem_dc, &bitmap, width, height)?;

            if is_all_black(&pixels) {
                tracing::debug!("BitBlt returned a black frame, retrying with PrintWindow");
                {
                    let _selected = Selection::select(&mem_dc, &bitmap);
                    let _ = PrintWindow(hwnd, mem_dc.0, PRINT_WINDOW_FLAGS(PW_RENDERFULLCONTENT));
                }
                pixels = read_bits(&mem_dc, &bitmap, width, height)?;
            }

            Ok(CaptureFrame::new(
                bgra_to_rgb(&pixels, width as u32, height as u32),
                bounds.top_left(),
            ))
        }
    }

    unsafe fn read_bits(
        dc: &MemoryDc,
        bitmap: &Bitmap,
        width: i32,
        height: i32,
    ) -> Result<Vec<u8>> {
        let mut bmi = BITMAPINFO {
            bmiHeader: BITMAPINFOHEADER {
                biSize: std::mem::size_of::<BITMAPINFOHEADER>() as u32,
                biWidth: width,
                biHeight: -height, // Negative for top-down bitmap
                biPlanes: 1,
                biBitCount: 32, // BGRA, rows need no padding
                biCompression: BI_RGB.0 as u32,
                biSizeImage: 0,
                biXPelsPerMeter: 0,
                biYPelsPerMeter: 0,
                biClrUsed: 0,
                biClrImportant: 0,
            },
            bmiColors: [Default::default(); 1],
        };

        let mut buffer = vec![0u8; width as usize * height as usize * 4];
        let scan_lines = GetDIBits(
            dc.0,
            bitmap.0,
            0,
            height as u32,
            Some(buffer.as_mut_ptr() as *mut _),
            &mut bmi,
            DIB_RGB_COLORS,
        );
        if scan_lines == 0 {
            return Err(AutomationError::Os("Failed to get bitmap bits".into()));
        }
        Ok(buffer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_black_ignores_alpha() {
        assert!(is_all_black(&[0, 0, 0, 255, 0, 0, 0, 0]));
        assert!(!is_all_black(&[0, 0, 0, 255, 0, 1, 0, 255]));
        assert!(is_all_black(&[]));
    }

    #[test]
    fn test_bgra_to_rgb_swaps_channels() {
        let bgra = [10, 20, 30, 255, 1, 2, 3, 0];
        let img = bgra_to_rgb(&bgra, 2, 1);
        assert_eq!(img.get_pixel(0, 0).0, [30, 20, 10]);
        assert_eq!(img.get_pixel(1, 0).0, [3, 2, 1]);
    }
}
