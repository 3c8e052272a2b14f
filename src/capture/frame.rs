//! Frame data structures for captured camera content

use anyhow::{anyhow, Result};
use image::{DynamicImage, RgbImage, RgbaImage};
use std::time::Instant;

/// A captured frame from the camera feed
#[derive(Debug, Clone)]
pub struct CapturedFrame {
    /// Raw RGBA pixel data
    pub data: Vec<u8>,
    /// Frame width in pixels
    pub width: u32,
    /// Frame height in pixels
    pub height: u32,
    /// Timestamp when frame was captured
    pub timestamp: Instant,
}

impl CapturedFrame {
    /// Create a new captured frame stamped with the current time
    pub fn new(data: Vec<u8>, width: u32, height: u32) -> Self {
        Self {
            data,
            width,
            height,
            timestamp: Instant::now(),
        }
    }

    /// Build a frame from a decoded image
    pub fn from_image(image: &DynamicImage) -> Self {
        let rgba = image.to_rgba8();
        let (width, height) = rgba.dimensions();
        Self::new(rgba.into_raw(), width, height)
    }

    /// Get frame dimensions as (width, height)
    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Whether the buffer holds a full RGBA image of the stated size
    pub fn is_valid(&self) -> bool {
        self.width > 0
            && self.height > 0
            && self.data.len() == (self.width as usize) * (self.height as usize) * 4
    }

    /// Convert to an RGB image, dropping the alpha channel
    pub fn to_rgb_image(&self) -> Result<RgbImage> {
        let rgba = RgbaImage::from_raw(self.width, self.height, self.data.clone()).ok_or_else(|| {
            anyhow!(
                "frame buffer of {} bytes does not fit {}x{} RGBA",
                self.data.len(),
                self.width,
                self.height
            )
        })?;
        Ok(DynamicImage::ImageRgba8(rgba).to_rgb8())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_validity() {
        let frame = CapturedFrame::new(vec![0; 2 * 3 * 4], 2, 3);
        assert!(frame.is_valid());
        assert_eq!(frame.dimensions(), (2, 3));

        let short = CapturedFrame::new(vec![0; 5], 2, 3);
        assert!(!short.is_valid());

        let empty = CapturedFrame::new(vec![], 0, 0);
        assert!(!empty.is_valid());
    }

    #[test]
    fn test_to_rgb_image_drops_alpha() {
        let data = vec![
            255, 0, 0, 255, // red
            0, 0, 255, 128, // blue, half transparent
        ];
        let frame = CapturedFrame::new(data, 2, 1);
        let rgb = frame.to_rgb_image().unwrap();

        assert_eq!(rgb.dimensions(), (2, 1));
        assert_eq!(rgb.get_pixel(0, 0).0, [255, 0, 0]);
        assert_eq!(rgb.get_pixel(1, 0).0, [0, 0, 255]);
    }

    #[test]
    fn test_to_rgb_image_rejects_bad_buffer() {
        let frame = CapturedFrame::new(vec![1, 2, 3], 4, 4);
        assert!(frame.to_rgb_image().is_err());
    }

    #[test]
    fn test_from_image() {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(3, 2, image::Rgb([10, 20, 30])));
        let frame = CapturedFrame::from_image(&img);

        assert_eq!(frame.dimensions(), (3, 2));
        assert!(frame.is_valid());
        assert_eq!(&frame.data[0..4], &[10, 20, 30, 255]);
    }
}
