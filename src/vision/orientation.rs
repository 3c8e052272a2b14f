//! Image orientation hypotheses
//!
//! OCR only reads upright text, and a hand-held camera delivers frames in
//! whatever rotation the sensor happens to be in. Each [`Orientation`] is a
//! clockwise correction applied to the raw frame before recognition.

use image::{imageops, RgbImage};
use serde::{Deserialize, Serialize};

/// Clockwise rotation that turns the raw frame upright
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Orientation {
    /// Frame is already upright
    #[default]
    Up,
    /// Rotate 90° clockwise
    Right,
    /// Rotate 180°
    Down,
    /// Rotate 270° clockwise
    Left,
}

impl Orientation {
    /// All orientations in their fixed cyclic order
    pub const ALL: [Orientation; 4] = [
        Orientation::Up,
        Orientation::Right,
        Orientation::Down,
        Orientation::Left,
    ];

    /// Clockwise correction in degrees
    pub fn degrees(self) -> u32 {
        match self {
            Orientation::Up => 0,
            Orientation::Right => 90,
            Orientation::Down => 180,
            Orientation::Left => 270,
        }
    }

    /// The four candidates in cyclic order, starting at `first`
    pub fn candidates(first: Orientation) -> [Orientation; 4] {
        let start = Self::ALL.iter().position(|o| *o == first).unwrap_or(0);
        std::array::from_fn(|i| Self::ALL[(start + i) % Self::ALL.len()])
    }

    /// Map how the device is held to the orientation of the captured image
    pub fn for_device(device: DeviceOrientation, camera: CameraPosition) -> ImageOrientation {
        let rotation = match device {
            DeviceOrientation::Portrait => Orientation::Right,
            DeviceOrientation::PortraitUpsideDown => Orientation::Left,
            DeviceOrientation::LandscapeLeft => Orientation::Up,
            DeviceOrientation::LandscapeRight => Orientation::Down,
        };
        ImageOrientation {
            rotation,
            mirrored: camera == CameraPosition::Front,
        }
    }
}

impl std::fmt::Display for Orientation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}°", self.degrees())
    }
}

/// Physical orientation of the device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceOrientation {
    Portrait,
    PortraitUpsideDown,
    LandscapeLeft,
    LandscapeRight,
}

/// Which camera produced the frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CameraPosition {
    #[default]
    Back,
    Front,
}

/// Rotation plus mirroring for a captured image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageOrientation {
    /// Clockwise correction
    pub rotation: Orientation,
    /// Front cameras deliver horizontally mirrored frames
    pub mirrored: bool,
}

/// Apply an orientation correction to an image
pub fn upright(image: &RgbImage, orientation: Orientation) -> RgbImage {
    match orientation {
        Orientation::Up => image.clone(),
        Orientation::Right => imageops::rotate90(image),
        Orientation::Down => imageops::rotate180(image),
        Orientation::Left => imageops::rotate270(image),
    }
}

/// Apply a full image orientation, un-mirroring first
pub fn upright_oriented(image: &RgbImage, orientation: ImageOrientation) -> RgbImage {
    if orientation.mirrored {
        upright(&imageops::flip_horizontal(image), orientation.rotation)
    } else {
        upright(image, orientation.rotation)
    }
}
