//! Camera Capture Layer
//!
//! Supplies a continuous sequence of frames to the pipeline. The camera
//! itself is abstracted behind [`FrameSource`]; the bundled source replays
//! image files from a directory as if they were a live feed.

pub mod frame;

use anyhow::{Context, Result};
use std::ops::ControlFlow;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{debug, info};

use frame::CapturedFrame;

/// File extensions accepted by [`DirectorySource`]
const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp", "tif", "tiff", "webp"];

/// Camera feed configuration
#[derive(Debug, Clone)]
pub struct CaptureConfig {
    /// Maximum frames per second delivered to the pipeline
    pub max_fps: u32,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self { max_fps: 30 }
    }
}

/// Anything that can produce camera frames
pub trait FrameSource {
    /// Next frame, or `None` when the feed has ended
    fn next_frame(&mut self) -> Result<Option<CapturedFrame>>;
}

/// Replays the image files of a directory as a camera feed
pub struct DirectorySource {
    files: Vec<PathBuf>,
    position: usize,
    looping: bool,
}

impl DirectorySource {
    /// Collect the image files in `dir`, sorted by file name
    pub fn open(dir: &Path, looping: bool) -> Result<Self> {
        let mut files = Vec::new();
        for entry in std::fs::read_dir(dir)
            .with_context(|| format!("Failed to read frame directory {}", dir.display()))?
        {
            let path = entry?.path();
            if path.is_file() && is_image_file(&path) {
                files.push(path);
            }
        }
        files.sort();

        info!("Frame source {} holds {} images", dir.display(), files.len());

        Ok(Self {
            files,
            position: 0,
            looping,
        })
    }

    /// Number of distinct frames in the feed
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Whether the directory contained no images
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

impl FrameSource for DirectorySource {
    fn next_frame(&mut self) -> Result<Option<CapturedFrame>> {
        if self.position >= self.files.len() {
            if !self.looping || self.files.is_empty() {
                return Ok(None);
            }
            self.position = 0;
        }

        let path = &self.files[self.position];
        self.position += 1;

        let image = image::open(path)
            .with_context(|| format!("Failed to decode frame {}", path.display()))?;
        debug!("Captured frame from {}", path.display());

        Ok(Some(CapturedFrame::from_image(&image)))
    }
}

fn is_image_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

/// Drives a [`FrameSource`] at a fixed frame rate
pub struct FramePump {
    config: CaptureConfig,
}

impl FramePump {
    /// Create a new pump
    pub fn new(config: CaptureConfig) -> Self {
        Self { config }
    }

    /// Interval between frames implied by `max_fps`
    pub fn frame_interval(&self) -> Duration {
        Duration::from_secs(1) / self.config.max_fps.max(1)
    }

    /// Deliver frames to `on_frame` until the source ends or the callback breaks.
    ///
    /// Returns the number of frames delivered.
    pub fn run<S, F>(&self, source: &mut S, mut on_frame: F) -> Result<u64>
    where
        S: FrameSource + ?Sized,
        F: FnMut(CapturedFrame) -> ControlFlow<()>,
    {
        let interval = self.frame_interval();
        let mut delivered = 0u64;

        while let Some(frame) = source.next_frame()? {
            let started = Instant::now();
            delivered += 1;

            if on_frame(frame).is_break() {
                debug!("Frame feed stopped by consumer after {} frames", delivered);
                break;
            }

            if let Some(remaining) = interval.checked_sub(started.elapsed()) {
                std::thread::sleep(remaining);
            }
        }

        Ok(delivered)
    }
}
