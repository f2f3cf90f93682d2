use image::{GrayImage, RgbImage};

use crate::core::coords::{Point, Rect};

/// One captured picture of the game window, in window-local coordinates.
///
/// `origin` is the window's top-left corner on screen at capture time. An
/// empty frame (zero width or height) means nothing could be captured and no
/// match is possible against it.
#[derive(Debug, Clone)]
pub struct CaptureFrame {
    image: RgbImage,
    origin: Point,
}

impl CaptureFrame {
    pub fn new(image: RgbImage, origin: Point) -> Self {
        Self { image, origin }
    }

    pub fn empty() -> Self {
        Self::new(RgbImage::new(0, 0), Point::default())
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn is_empty(&self) -> bool {
        self.width() == 0 || self.height() == 0
    }

    pub fn origin(&self) -> Point {
        self.origin
    }

    pub fn image(&self) -> &RgbImage {
        &self.image
    }

    pub fn bounds(&self) -> Rect {
        Rect::new(0, 0, self.width() as i32, self.height() as i32)
    }

    /// Intensity image of `area` (already clamped to the frame).
    pub fn gray_view(&self, area: Rect) -> GrayImage {
        let view = image::imageops::crop_imm(
            &self.image,
            area.x as u32,
            area.y as u32,
            area.width as u32,
            area.height as u32,
        )
        .to_image();
        image::imageops::grayscale(&view)
    }
}
