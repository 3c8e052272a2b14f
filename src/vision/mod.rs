//! Vision/OCR Layer
//!
//! Turns captured frames into text. Orientation handling lives here as well,
//! since every recognition attempt is made against one rotation hypothesis.

pub mod ocr;
pub mod orientation;

pub use ocr::{OcrError, OcrModelPaths, OcrsRecognizer, TextRecognizer};
pub use orientation::{CameraPosition, DeviceOrientation, ImageOrientation, Orientation};
