use std::thread;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::core::coords::{Point, Rect};
use crate::core::platform::InputDevice;
use crate::error::Result;
use crate::settings::Timings;

/// Delay for a specified number of milliseconds
pub fn delay_ms(ms: u64) {
    if ms > 0 {
        thread::sleep(Duration::from_millis(ms));
    }
}

/// Turns frame-local match locations into jittered screen clicks and
/// keystrokes on an [`InputDevice`].
pub struct ActionExecutor<I> {
    input: I,
    jitter: i32,
    timings: Timings,
    rng: StdRng,
}

impl<I: InputDevice> ActionExecutor<I> {
    pub fn new(input: I, jitter: i32, timings: Timings) -> Self {
        Self::with_rng(input, jitter, timings, StdRng::from_entropy())
    }

    /// Executor with a fixed random seed, for reproducible click points.
    pub fn seeded(input: I, jitter: i32, timings: Timings, seed: u64) -> Self {
        Self::with_rng(input, jitter, timings, StdRng::seed_from_u64(seed))
    }

    fn with_rng(input: I, jitter: i32, timings: Timings, rng: StdRng) -> Self {
        Self {
            input,
            jitter: jitter.max(0),
            timings,
            rng,
        }
    }

    pub fn input(&self) -> &I {
        &self.input
    }

    pub fn into_input(self) -> I {
        self.input
    }

    fn jittered(&mut self, p: Point) -> Point {
        if self.jitter == 0 {
            return p;
        }
        let j = self.jitter;
        p.offset(self.rng.gen_range(-j..=j), self.rng.gen_range(-j..=j))
    }

    /// Press and release the left button at a screen point (no jitter).
    pub fn click_screen(&mut self, p: Point) -> Result<()> {
        self.input.move_to(p.x, p.y)?;
        self.input.left_down()?;
        delay_ms(self.timings.press_release);
        self.input.left_up()
    }

    /// Click a frame-local point of a window whose top-left is `origin`.
    /// Returns the screen point actually clicked.
    pub fn click_frame_point(&mut self, origin: Point, point: Point) -> Result<Point> {
        let target = self.jittered(origin.offset(point.x, point.y));
        self.click_screen(target)?;
        Ok(target)
    }

    /// Click the center of a frame-local match rectangle.
    pub fn click_match(&mut self, origin: Point, rect: Rect) -> Result<Point> {
        self.click_frame_point(origin, rect.center())
    }

    /// Clear the focused field and type `text` into it.
    pub fn type_text(&mut self, text: &str) -> Result<()> {
        self.input.select_all()?;
        delay_ms(self.timings.key_interval);
        self.input.delete()?;
        delay_ms(self.timings.key_interval);
        self.input.type_text(text)
    }

    /// Focus an input field by clicking it, then replace its content.
    pub fn fill_field(&mut self, origin: Point, point: Point, text: &str) -> Result<Point> {
        let clicked = self.click_frame_point(origin, point)?;
        delay_ms(self.timings.field_settle);
        self.type_text(text)?;
        delay_ms(self.timings.field_settle);
        Ok(clicked)
    }

    /// Corrective click in the middle of the window (screen bounds).
    pub fn click_window_center(&mut self, bounds: Rect) -> Result<Point> {
        self.click_frame_point(bounds.top_left(), Point::new(bounds.width / 2, bounds.height / 2))
    }
}
