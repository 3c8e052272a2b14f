//! OCR (Optical Character Recognition) module
//!
//! The pipeline talks to OCR through [`TextRecognizer`]. The bundled backend
//! runs the `ocrs` engine on `rten` models.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use image::RgbImage;
use ocrs::{ImageSource, OcrEngine, OcrEngineParams};
use rten::Model;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

use super::orientation::{upright_oriented, ImageOrientation, Orientation};
use crate::capture::frame::CapturedFrame;

/// Default model file names, as published for `ocrs-cli`
pub const DETECTION_MODEL_FILE: &str = "text-detection.rten";
pub const RECOGNITION_MODEL_FILE: &str = "text-recognition.rten";

/// Why a single recognition attempt produced no text
#[derive(Debug, Error)]
pub enum OcrError {
    #[error("no text recognized")]
    Empty,
    #[error("frame buffer is not a valid image")]
    InvalidFrame,
    #[error("recognition timed out")]
    Timeout,
    #[error("OCR engine failed: {0}")]
    Engine(String),
}

/// Asynchronous OCR collaborator: one request per call
#[async_trait]
pub trait TextRecognizer: Send + Sync {
    /// Recognize the text in `frame` after applying `orientation`
    async fn recognize(
        &self,
        frame: &CapturedFrame,
        orientation: Orientation,
    ) -> Result<String, OcrError>;
}

/// Locations of the detection and recognition models
#[derive(Debug, Clone)]
pub struct OcrModelPaths {
    pub detection: PathBuf,
    pub recognition: PathBuf,
}

impl OcrModelPaths {
    /// Models in the `ocrs-cli` cache directory (`~/.cache/ocrs`)
    pub fn default_cache() -> Result<Self> {
        let base = directories::BaseDirs::new()
            .ok_or_else(|| anyhow::anyhow!("Could not determine home directory"))?;
        Ok(Self::in_dir(&base.home_dir().join(".cache").join("ocrs")))
    }

    /// Models with their default file names inside `dir`
    pub fn in_dir(dir: &Path) -> Self {
        Self {
            detection: dir.join(DETECTION_MODEL_FILE),
            recognition: dir.join(RECOGNITION_MODEL_FILE),
        }
    }
}

/// OCR backend built on the `ocrs` engine
pub struct OcrsRecognizer {
    engine: Arc<OcrEngine>,
    /// Un-mirror frames before rotating (front camera)
    mirrored: bool,
}

impl OcrsRecognizer {
    /// Load the detection and recognition models
    pub fn load(paths: &OcrModelPaths) -> Result<Self> {
        if !paths.detection.exists() || !paths.recognition.exists() {
            bail!(
                "OCR models not found. Download them with ocrs-cli or point the config at them.\n\
                 Expected locations:\n  - {}\n  - {}",
                paths.detection.display(),
                paths.recognition.display()
            );
        }

        info!("Loading OCR models from {:?}", paths.detection.parent());

        let detection_model = Model::load_file(&paths.detection)
            .with_context(|| format!("Failed to load {}", paths.detection.display()))?;
        let recognition_model = Model::load_file(&paths.recognition)
            .with_context(|| format!("Failed to load {}", paths.recognition.display()))?;

        let engine = OcrEngine::new(OcrEngineParams {
            detection_model: Some(detection_model),
            recognition_model: Some(recognition_model),
            ..Default::default()
        })
        .context("Failed to create OCR engine")?;

        info!("OCR engine initialized");

        Ok(Self {
            engine: Arc::new(engine),
            mirrored: false,
        })
    }

    /// Treat incoming frames as mirrored
    pub fn with_mirroring(mut self, mirrored: bool) -> Self {
        self.mirrored = mirrored;
        self
    }
}

#[async_trait]
impl TextRecognizer for OcrsRecognizer {
    async fn recognize(
        &self,
        frame: &CapturedFrame,
        orientation: Orientation,
    ) -> Result<String, OcrError> {
        if !frame.is_valid() {
            return Err(OcrError::InvalidFrame);
        }

        let rgb = frame.to_rgb_image().map_err(|_| OcrError::InvalidFrame)?;
        let image = upright_oriented(
            &rgb,
            ImageOrientation {
                rotation: orientation,
                mirrored: self.mirrored,
            },
        );
        let engine = Arc::clone(&self.engine);

        let text = tokio::task::spawn_blocking(move || run_engine(&engine, &image))
            .await
            .map_err(|e| OcrError::Engine(e.to_string()))??;

        debug!(
            "OCR at {} on {:?} frame read {} characters",
            orientation,
            frame.dimensions(),
            text.len()
        );
        Ok(text)
    }
}

fn run_engine(engine: &OcrEngine, image: &RgbImage) -> Result<String, OcrError> {
    let source = ImageSource::from_bytes(image.as_raw(), image.dimensions())
        .map_err(|e| OcrError::Engine(e.to_string()))?;
    let input = engine
        .prepare_input(source)
        .map_err(|e| OcrError::Engine(e.to_string()))?;
    let text = engine
        .get_text(&input)
        .map_err(|e| OcrError::Engine(e.to_string()))?;

    non_empty(text)
}

/// Blank recognizer output counts as a failed attempt
pub fn non_empty(text: String) -> Result<String, OcrError> {
    if text.trim().is_empty() {
        Err(OcrError::Empty)
    } else {
        Ok(text)
    }
}
