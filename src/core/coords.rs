use serde::{Deserialize, Serialize};

/// A point in pixels. Frame-local or screen space depending on context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    pub fn offset(self, dx: i32, dy: i32) -> Self {
        Self::new(self.x + dx, self.y + dy)
    }
}

/// Axis-aligned rectangle as (left, top, width, height).
///
/// Width and height may be zero or negative when built from untrusted input;
/// such rectangles are empty and never intersect anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Rect {
    pub const fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self { x, y, width, height }
    }

    /// Build from (left, top, right, bottom) edges, as Win32 reports them.
    pub fn from_ltrb(left: i32, top: i32, right: i32, bottom: i32) -> Self {
        Self::new(left, top, right - left, bottom - top)
    }

    pub fn right(&self) -> i32 {
        self.x.saturating_add(self.width)
    }

    pub fn bottom(&self) -> i32 {
        self.y.saturating_add(self.height)
    }

    pub fn is_empty(&self) -> bool {
        self.width <= 0 || self.height <= 0
    }

    pub fn top_left(&self) -> Point {
        Point::new(self.x, self.y)
    }

    pub fn center(&self) -> Point {
        Point::new(self.x + self.width / 2, self.y + self.height / 2)
    }

    pub fn contains_rect(&self, other: &Rect) -> bool {
        other.x >= self.x
            && other.y >= self.y
            && other.right() <= self.right()
            && other.bottom() <= self.bottom()
    }

    /// Intersection of two rectangles, `None` when they do not overlap.
    pub fn intersect(&self, other: &Rect) -> Option<Rect> {
        if self.is_empty() || other.is_empty() {
            return None;
        }
        let left = self.x.max(other.x);
        let top = self.y.max(other.y);
        let right = self.right().min(other.right());
        let bottom = self.bottom().min(other.bottom());
        if right <= left || bottom <= top {
            return None;
        }
        Some(Rect::from_ltrb(left, top, right, bottom))
    }

    /// Clamp to a `width` x `height` image anchored at the origin.
    pub fn clamp_to(&self, width: u32, height: u32) -> Option<Rect> {
        let bounds = Rect::new(0, 0, to_i32(width), to_i32(height));
        self.intersect(&bounds)
    }
}

fn to_i32(value: u32) -> i32 {
    i32::try_from(value).unwrap_or(i32::MAX)
}

/// Rectangle centered on a `win_w` x `win_h` window, sized to `fraction` of
/// each dimension but never smaller than `floor` pixels, then clipped to the
/// window.
pub fn centered_roi(win_w: i32, win_h: i32, fraction: f32, floor: i32) -> Rect {
    let roi_w = floor.max((win_w as f32 * fraction) as i32);
    let roi_h = floor.max((win_h as f32 * fraction) as i32);
    let center_x = win_w / 2;
    let center_y = win_h / 2;
    Rect::new(
        (center_x - roi_w / 2).max(0),
        (center_y - roi_h / 2).max(0),
        roi_w.min(win_w),
        roi_h.min(win_h),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intersect_partial_overlap() {
        let a = Rect::new(0, 0, 100, 80);
        let b = Rect::new(-20, 50, 60, 100);
        assert_eq!(a.intersect(&b), Some(Rect::new(0, 50, 40, 30)));
    }

    #[test]
    fn test_intersect_disjoint_and_degenerate() {
        let a = Rect::new(0, 0, 100, 80);
        assert_eq!(a.intersect(&Rect::new(100, 0, 10, 10)), None);
        assert_eq!(a.intersect(&Rect::new(10, 10, 0, 10)), None);
        assert_eq!(a.intersect(&Rect::new(10, 10, -5, 10)), None);
    }

    #[test]
    fn test_clamp_oversized_region() {
        let r = Rect::new(-50, -50, 10_000, 10_000);
        assert_eq!(r.clamp_to(640, 480), Some(Rect::new(0, 0, 640, 480)));
    }

    #[test]
    fn test_centered_roi_uses_fraction_and_floor() {
        // 45% of 1000x800 is 450x360
        assert_eq!(centered_roi(1000, 800, 0.45, 200), Rect::new(275, 220, 450, 360));
        // Floor dominates on a small window
        assert_eq!(centered_roi(300, 240, 0.45, 200), Rect::new(50, 20, 200, 200));
    }

    #[test]
    fn test_centered_roi_clipped_to_tiny_window() {
        let roi = centered_roi(150, 100, 0.42, 220);
        assert_eq!(roi, Rect::new(0, 0, 150, 100));
    }

    #[test]
    fn test_from_ltrb_and_center() {
        let r = Rect::from_ltrb(10, 20, 110, 70);
        assert_eq!(r, Rect::new(10, 20, 100, 50));
        assert_eq!(r.center(), Point::new(60, 45));
    }
}
