//! Scripted collaborators for pipeline tests

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::Duration;

use crate::capture::frame::CapturedFrame;
use crate::vision::{OcrError, Orientation, TextRecognizer};

pub const QUALIFYING_TEXT: &str = "419 2ND ST, FORT LAUDERDALE, FL 33301\nAPT 7";

pub fn test_frame() -> CapturedFrame {
    CapturedFrame::new(vec![255; 8 * 8 * 4], 8, 8)
}

/// Recognizer that answers from a per-orientation script and records calls.
/// Orientations without a scripted reply fail.
#[derive(Default)]
pub struct ScriptedRecognizer {
    replies: HashMap<Orientation, String>,
    delays: HashMap<Orientation, Duration>,
    calls: Mutex<Vec<Orientation>>,
}

impl ScriptedRecognizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reply(mut self, orientation: Orientation, text: &str) -> Self {
        self.replies.insert(orientation, text.to_string());
        self
    }

    pub fn fail(mut self, orientation: Orientation) -> Self {
        self.replies.remove(&orientation);
        self
    }

    pub fn delay(mut self, orientation: Orientation, delay: Duration) -> Self {
        self.delays.insert(orientation, delay);
        self
    }

    pub fn calls(&self) -> Vec<Orientation> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl TextRecognizer for ScriptedRecognizer {
    async fn recognize(
        &self,
        _frame: &CapturedFrame,
        orientation: Orientation,
    ) -> Result<String, OcrError> {
        self.calls.lock().push(orientation);

        if let Some(delay) = self.delays.get(&orientation) {
            tokio::time::sleep(*delay).await;
        }

        match self.replies.get(&orientation) {
            Some(text) if text.trim().is_empty() => Err(OcrError::Empty),
            Some(text) => Ok(text.clone()),
            None => Err(OcrError::Engine(format!("no text at {}", orientation))),
        }
    }
}
