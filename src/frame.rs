//! Decoded frames.

use image::{DynamicImage, Rgb, RgbImage};

/// A decoded RGB image: height x width x 3, origin top-left, row-major.
///
/// A frame is owned by exactly one pipeline stage at a time. Once inference
/// has run the drive loop freezes it behind an `Arc` before handing it to
/// the sink, so nothing downstream can mutate the buffer in place.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    image: RgbImage,
}

impl Frame {
    pub fn new(image: RgbImage) -> Self {
        Self { image }
    }

    /// Convert any decoded image into an RGB frame.
    pub fn from_dynamic(image: DynamicImage) -> Self {
        Self::new(image.to_rgb8())
    }

    /// Build a frame from packed RGB bytes. Returns `None` when the buffer
    /// length does not match `width * height * 3`.
    pub fn from_raw(width: u32, height: u32, data: Vec<u8>) -> Option<Self> {
        RgbImage::from_raw(width, height, data).map(Self::new)
    }

    /// A frame filled with a single color.
    pub fn filled(width: u32, height: u32, color: [u8; 3]) -> Self {
        Self::new(RgbImage::from_pixel(width, height, Rgb(color)))
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// True when either dimension is zero.
    pub fn is_empty(&self) -> bool {
        self.image.width() == 0 || self.image.height() == 0
    }

    pub fn image(&self) -> &RgbImage {
        &self.image
    }

    pub fn image_mut(&mut self) -> &mut RgbImage {
        &mut self.image
    }

    pub fn into_image(self) -> RgbImage {
        self.image
    }

    /// Packed RGB bytes in row-major order.
    pub fn as_raw(&self) -> &[u8] {
        self.image.as_raw()
    }
}

impl From<RgbImage> for Frame {
    fn from(image: RgbImage) -> Self {
        Self::new(image)
    }
}
