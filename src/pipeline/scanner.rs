//! Multi-orientation OCR retry
//!
//! A frame is read under each rotation hypothesis in a fixed order until one
//! reading yields both a qualifying address and a unit number.

use futures_util::stream::{FuturesOrdered, StreamExt};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::analysis::{AddressMatcher, ExtractionResult, MatchResult, UnitExtractor};
use crate::capture::frame::CapturedFrame;
use crate::vision::{OcrError, Orientation, TextRecognizer};

/// Default bound on a single OCR call
pub const DEFAULT_OCR_TIMEOUT: Duration = Duration::from_secs(3);

/// How orientation candidates are tried
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanStrategy {
    /// One OCR call at a time, stopping at the first success
    #[default]
    Sequential,
    /// All candidates at once; the lowest-index success still wins
    Parallel,
}

/// A reading that produced both an address and a unit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanHit {
    pub orientation: Orientation,
    pub text: String,
    pub address: String,
    pub unit: String,
}

/// Drives the OCR collaborator across rotation candidates
pub struct OrientationRetryScanner {
    recognizer: Arc<dyn TextRecognizer>,
    matcher: AddressMatcher,
    extractor: UnitExtractor,
    candidates: [Orientation; 4],
    strategy: ScanStrategy,
    ocr_timeout: Duration,
}

impl OrientationRetryScanner {
    pub fn new(recognizer: Arc<dyn TextRecognizer>, matcher: AddressMatcher) -> Self {
        Self {
            recognizer,
            matcher,
            extractor: UnitExtractor::new(),
            candidates: Orientation::candidates(Orientation::Up),
            strategy: ScanStrategy::default(),
            ocr_timeout: DEFAULT_OCR_TIMEOUT,
        }
    }

    /// Start the candidate cycle at `first` (e.g. the device-derived rotation)
    pub fn with_first_orientation(mut self, first: Orientation) -> Self {
        self.candidates = Orientation::candidates(first);
        self
    }

    pub fn with_strategy(mut self, strategy: ScanStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn with_ocr_timeout(mut self, timeout: Duration) -> Self {
        self.ocr_timeout = timeout;
        self
    }

    pub fn candidates(&self) -> &[Orientation; 4] {
        &self.candidates
    }

    /// Address and unit from one reading; both must come from the same text
    pub fn analyze(&self, text: &str) -> Option<(String, String)> {
        let MatchResult::Matched(address) = self.matcher.match_text(text) else {
            debug!("No qualifying address in reading");
            return None;
        };
        let ExtractionResult::Found(unit) = self.extractor.extract(text) else {
            debug!("Address {:?} found but no unit number", address);
            return None;
        };
        Some((address, unit))
    }

    /// Try every candidate until one reading fully matches
    pub async fn scan(&self, frame: &CapturedFrame) -> Option<ScanHit> {
        match self.strategy {
            ScanStrategy::Sequential => self.scan_sequential(frame).await,
            ScanStrategy::Parallel => self.scan_parallel(frame).await,
        }
    }

    async fn scan_sequential(&self, frame: &CapturedFrame) -> Option<ScanHit> {
        for &orientation in &self.candidates {
            if let Some(hit) = self.attempt(frame, orientation).await {
                return Some(hit);
            }
        }
        debug!("All {} orientations exhausted", self.candidates.len());
        None
    }

    async fn scan_parallel(&self, frame: &CapturedFrame) -> Option<ScanHit> {
        // Results come back in candidate order, so the first success seen is
        // the lowest-index one; dropping the stream abandons the rest.
        let mut attempts: FuturesOrdered<_> = self
            .candidates
            .iter()
            .map(|&orientation| self.attempt(frame, orientation))
            .collect();

        while let Some(outcome) = attempts.next().await {
            if outcome.is_some() {
                return outcome;
            }
        }
        debug!("All {} orientations exhausted", self.candidates.len());
        None
    }

    async fn attempt(&self, frame: &CapturedFrame, orientation: Orientation) -> Option<ScanHit> {
        let reading = tokio::time::timeout(
            self.ocr_timeout,
            self.recognizer.recognize(frame, orientation),
        )
        .await
        .unwrap_or(Err(OcrError::Timeout));

        let text = match reading {
            Ok(text) => text,
            Err(e) => {
                debug!("OCR at {} failed: {}", orientation, e);
                return None;
            }
        };

        let (address, unit) = self.analyze(&text)?;
        debug!("Orientation {} matched {:?} unit {:?}", orientation, address, unit);

        Some(ScanHit {
            orientation,
            text,
            address,
            unit,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::AddressFilter;
    use crate::pipeline::testing::{test_frame, ScriptedRecognizer, QUALIFYING_TEXT};

    fn scanner(recognizer: &Arc<ScriptedRecognizer>) -> OrientationRetryScanner {
        OrientationRetryScanner::new(
            recognizer.clone(),
            AddressMatcher::new(AddressFilter::default()),
        )
    }

    #[tokio::test]
    async fn test_succeeds_on_last_rotation() {
        let recognizer = Arc::new(
            ScriptedRecognizer::new()
                .fail(Orientation::Up)
                .fail(Orientation::Right)
                .reply(Orientation::Down, "   ")
                .reply(Orientation::Left, QUALIFYING_TEXT),
        );

        let hit = scanner(&recognizer).scan(&test_frame()).await.unwrap();

        assert_eq!(hit.orientation, Orientation::Left);
        assert_eq!(hit.unit, "7");
        assert_eq!(recognizer.calls(), Orientation::ALL.to_vec());
    }

    #[tokio::test]
    async fn test_short_circuits_on_first_rotation() {
        let recognizer = Arc::new(
            ScriptedRecognizer::new()
                .reply(Orientation::Up, QUALIFYING_TEXT)
                .reply(Orientation::Right, QUALIFYING_TEXT),
        );

        let hit = scanner(&recognizer).scan(&test_frame()).await.unwrap();

        assert_eq!(hit.orientation, Orientation::Up);
        assert_eq!(hit.address, "419 2ND ST, FORT LAUDERDALE, FL, 33301");
        assert_eq!(recognizer.calls(), vec![Orientation::Up]);
    }

    #[tokio::test]
    async fn test_exhausts_all_rotations() {
        let recognizer = Arc::new(
            ScriptedRecognizer::new()
                .reply(Orientation::Up, "12 Oak Ave, Miami, FL 33101\nAPT 3")
                .reply(Orientation::Right, "419 2nd St, Fort Lauderdale, FL 33301"),
        );

        assert!(scanner(&recognizer).scan(&test_frame()).await.is_none());
        assert_eq!(recognizer.calls().len(), 4);
    }

    #[tokio::test]
    async fn test_address_and_unit_must_share_a_reading() {
        // Address on one rotation, unit on another: never combined
        let recognizer = Arc::new(
            ScriptedRecognizer::new()
                .reply(Orientation::Up, "419 2nd St, Fort Lauderdale, FL 33301")
                .reply(Orientation::Right, "APT 7"),
        );

        assert!(scanner(&recognizer).scan(&test_frame()).await.is_none());
    }

    #[tokio::test]
    async fn test_custom_first_orientation() {
        let recognizer = Arc::new(ScriptedRecognizer::new().reply(Orientation::Up, QUALIFYING_TEXT));
        let scanner = scanner(&recognizer).with_first_orientation(Orientation::Down);

        let hit = scanner.scan(&test_frame()).await.unwrap();

        assert_eq!(hit.orientation, Orientation::Up);
        assert_eq!(
            recognizer.calls(),
            vec![Orientation::Down, Orientation::Left, Orientation::Up]
        );
    }

    #[tokio::test]
    async fn test_timeout_counts_as_failure() {
        let recognizer = Arc::new(
            ScriptedRecognizer::new()
                .reply(Orientation::Up, QUALIFYING_TEXT)
                .delay(Orientation::Up, Duration::from_secs(10))
                .reply(Orientation::Right, QUALIFYING_TEXT),
        );
        let scanner = scanner(&recognizer).with_ocr_timeout(Duration::from_millis(20));

        let hit = scanner.scan(&test_frame()).await.unwrap();
        assert_eq!(hit.orientation, Orientation::Right);
    }

    #[tokio::test]
    async fn test_parallel_lowest_index_wins() {
        let recognizer = Arc::new(
            ScriptedRecognizer::new()
                .fail(Orientation::Up)
                .reply(Orientation::Right, "419 2nd St, Fort Lauderdale, FL 33301\nUNIT 2")
                .delay(Orientation::Right, Duration::from_millis(50))
                .reply(Orientation::Left, "419 2nd St, Fort Lauderdale, FL 33301\nUNIT 4"),
        );
        let scanner = scanner(&recognizer).with_strategy(ScanStrategy::Parallel);

        let hit = scanner.scan(&test_frame()).await.unwrap();

        assert_eq!(hit.orientation, Orientation::Right);
        assert_eq!(hit.unit, "2");
    }

    #[tokio::test]
    async fn test_parallel_exhausts() {
        let recognizer = Arc::new(ScriptedRecognizer::new());
        let scanner = scanner(&recognizer).with_strategy(ScanStrategy::Parallel);

        assert!(scanner.scan(&test_frame()).await.is_none());
        assert_eq!(recognizer.calls().len(), 4);
    }

    #[test]
    fn test_analyze() {
        let recognizer = Arc::new(ScriptedRecognizer::new());
        let scanner = scanner(&recognizer);

        assert_eq!(
            scanner.analyze(QUALIFYING_TEXT),
            Some((
                "419 2ND ST, FORT LAUDERDALE, FL, 33301".to_string(),
                "7".to_string()
            ))
        );
        assert_eq!(scanner.analyze("APT 7"), None);
    }

    #[test]
    fn test_analyze_common_label_layouts() {
        let recognizer = Arc::new(ScriptedRecognizer::new());
        let scanner = scanner(&recognizer);

        assert_eq!(
            scanner.analyze("419 2ND ST\nFORT LAUDERDALE FL 33301\nAPT 7"),
            Some((
                "419 2ND ST, FORT LAUDERDALE, FL, 33301".to_string(),
                "7".to_string()
            ))
        );
        assert_eq!(
            scanner.analyze("419 2nd St, Apt 7, Fort Lauderdale, FL 33301"),
            Some((
                "419 2nd St, Apt 7, Fort Lauderdale, FL, 33301".to_string(),
                "7".to_string()
            ))
        );
        assert_eq!(
            scanner.analyze("419 2nd St\nFort Lauderdale, FL\n33301\nApt 7"),
            Some((
                "419 2nd St, Fort Lauderdale, FL".to_string(),
                "7".to_string()
            ))
        );
    }
}
