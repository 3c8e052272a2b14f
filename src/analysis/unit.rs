//! Apartment/unit number extraction
//!
//! Heuristics are tried line by line, each line against every pattern in
//! priority order. The first plausible token wins.

use lazy_static::lazy_static;
use regex::Regex;
use tracing::debug;

lazy_static! {
    /// `APT 4B`, `UNIT 12`, `#7`
    static ref KEYWORD_FIRST: Regex =
        Regex::new(r"(?i)(?:\bAPT|\bUNIT|#)\.?\s*([0-9A-Z-]+)").unwrap();
    /// `4B APT`, `12 #`
    static ref NUMBER_FIRST: Regex =
        Regex::new(r"(?i)\b(\d+[A-Z]?)\s*(?:APT|UNIT|#)").unwrap();
    /// A lone `7`, `#12` or `4B` on its own line. At most four digits, so a
    /// zip code on its own line is not taken for a unit.
    static ref STANDALONE: Regex = Regex::new(r"(?i)^\s*#?(\d{1,4}[A-Z]?)\s*$").unwrap();
}

/// Outcome of unit extraction
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtractionResult {
    NotFound,
    Found(String),
}

impl ExtractionResult {
    pub fn into_option(self) -> Option<String> {
        match self {
            ExtractionResult::Found(unit) => Some(unit),
            ExtractionResult::NotFound => None,
        }
    }
}

/// Which heuristic produced a unit token
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitPattern {
    KeywordFirst,
    NumberFirst,
    Standalone,
}

impl UnitPattern {
    /// Patterns in priority order
    pub const PRIORITY: [UnitPattern; 3] = [
        UnitPattern::KeywordFirst,
        UnitPattern::NumberFirst,
        UnitPattern::Standalone,
    ];

    fn regex(self) -> &'static Regex {
        match self {
            UnitPattern::KeywordFirst => &*KEYWORD_FIRST,
            UnitPattern::NumberFirst => &*NUMBER_FIRST,
            UnitPattern::Standalone => &*STANDALONE,
        }
    }

    /// First plausible captured token in `line`
    pub fn find(self, line: &str) -> Option<&str> {
        self.regex()
            .captures_iter(line)
            .filter_map(|caps| caps.get(1))
            .map(|m| m.as_str())
            .find(|token| is_plausible_unit(token))
    }
}

/// Pulls an apartment/unit token out of OCR text
#[derive(Debug, Clone, Copy, Default)]
pub struct UnitExtractor;

impl UnitExtractor {
    pub fn new() -> Self {
        Self
    }

    /// Extract the first unit token, scanning lines top to bottom
    pub fn extract(&self, text: &str) -> ExtractionResult {
        for line in text.lines() {
            for pattern in UnitPattern::PRIORITY {
                if let Some(unit) = pattern.find(line) {
                    debug!("Unit {:?} found by {:?} in line {:?}", unit, pattern, line);
                    return ExtractionResult::Found(unit.to_string());
                }
            }
        }
        ExtractionResult::NotFound
    }
}

/// Unit tokens carry a digit, or are short letter codes like `B`.
/// Keeps prose such as "unit info" from being read as a unit.
fn is_plausible_unit(token: &str) -> bool {
    let token = token.trim_matches('-');
    if token.is_empty() {
        return false;
    }
    token.chars().any(|c| c.is_ascii_digit()) || token.chars().count() <= 2
}
