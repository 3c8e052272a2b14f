//! Address detection and filtering
//!
//! [`AddressDetector`] pulls structured street/city/state/zip candidates out
//! of free text. [`AddressMatcher`] checks those candidates against an
//! [`AddressFilter`] and returns the first one that qualifies.

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

lazy_static! {
    /// `<number> <street words>[, APT 7]` then `,` or a line break, then
    /// `<city>[,] <ST> [zip]`. The street part is optional.
    static ref US_ADDRESS: Regex = Regex::new(concat!(
        r"(?im)",
        r"(?:(?P<street>\b\d+[A-Z]?(?:[ \t]+[0-9A-Z.'#-]+)+",
        r"(?:[ \t]*,[ \t]*(?:APT|UNIT|STE|SUITE|#)\b\.?[ \t]*[0-9A-Z-]+)?)",
        r"[ \t]*(?:,[ \t]*\n?|\n)[ \t]*)?",
        r"\b(?P<city>[A-Z][A-Z.' -]*?)(?:[ \t]*,[ \t]*|[ \t]+)",
        r"(?P<state>[A-Z]{2})\b",
        r"(?:[ \t]+(?P<zip>\d{5}(?:-\d{4})?))?",
    ))
    .unwrap();
}

/// Structured address fields; any of them may be missing
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AddressComponents {
    pub street: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub zip: Option<String>,
}

impl AddressComponents {
    /// Non-empty fields joined with ", " in street, city, state, zip order
    pub fn normalized(&self) -> String {
        [&self.street, &self.city, &self.state, &self.zip]
            .into_iter()
            .filter_map(|field| field.as_deref())
            .map(str::trim)
            .filter(|field| !field.is_empty())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Address-detection collaborator
pub trait AddressDetector: Send + Sync {
    /// Candidate component sets in the order they appear in `text`
    fn detect(&self, text: &str) -> Vec<AddressComponents>;
}

/// Regex detector for US-style postal addresses
#[derive(Debug, Clone, Copy, Default)]
pub struct PatternAddressDetector;

impl AddressDetector for PatternAddressDetector {
    fn detect(&self, text: &str) -> Vec<AddressComponents> {
        let text = text.replace("\r\n", "\n");
        let field = |caps: &regex::Captures, name: &str| {
            caps.name(name)
                .map(|m| m.as_str().trim().to_string())
                .filter(|s| !s.is_empty())
        };

        US_ADDRESS
            .captures_iter(&text)
            .map(|caps| AddressComponents {
                street: field(&caps, "street"),
                city: field(&caps, "city"),
                state: field(&caps, "state"),
                zip: field(&caps, "zip"),
            })
            .collect()
    }
}

/// Which addresses count as a match
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct AddressFilter {
    /// Accepted city substrings (case-insensitive)
    pub city_substrings: Vec<String>,
    /// Accepted zip codes (matched literally as substrings)
    pub zip_codes: Vec<String>,
    /// Accepted street substrings (case-insensitive)
    pub street_substrings: Vec<String>,
}

impl Default for AddressFilter {
    fn default() -> Self {
        Self {
            city_substrings: vec!["lauderdale".to_string()],
            zip_codes: vec!["33301".to_string()],
            street_substrings: vec!["419".to_string(), "2nd".to_string()],
        }
    }
}

impl AddressFilter {
    /// City or zip qualifies, and the street qualifies
    pub fn accepts(&self, address: &AddressComponents) -> bool {
        self.city_or_zip_ok(address) && self.street_ok(address)
    }

    fn city_or_zip_ok(&self, address: &AddressComponents) -> bool {
        let city_ok = address
            .city
            .as_deref()
            .is_some_and(|city| contains_any_ignore_case(city, &self.city_substrings));
        let zip_ok = address
            .zip
            .as_deref()
            .is_some_and(|zip| self.zip_codes.iter().any(|code| zip.contains(code.as_str())));
        city_ok || zip_ok
    }

    fn street_ok(&self, address: &AddressComponents) -> bool {
        address
            .street
            .as_deref()
            .is_some_and(|street| contains_any_ignore_case(street, &self.street_substrings))
    }
}

fn contains_any_ignore_case(haystack: &str, needles: &[String]) -> bool {
    let haystack = haystack.to_lowercase();
    needles
        .iter()
        .any(|needle| haystack.contains(&needle.to_lowercase()))
}

/// Outcome of address matching
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchResult {
    NoMatch,
    Matched(String),
}

impl MatchResult {
    pub fn into_option(self) -> Option<String> {
        match self {
            MatchResult::Matched(address) => Some(address),
            MatchResult::NoMatch => None,
        }
    }
}

/// Validates text against an [`AddressFilter`]
pub struct AddressMatcher {
    detector: Box<dyn AddressDetector>,
    filter: AddressFilter,
}

impl AddressMatcher {
    /// Matcher using the bundled pattern detector
    pub fn new(filter: AddressFilter) -> Self {
        Self::with_detector(Box::new(PatternAddressDetector), filter)
    }

    pub fn with_detector(detector: Box<dyn AddressDetector>, filter: AddressFilter) -> Self {
        Self { detector, filter }
    }

    /// First detected candidate that passes the filter, normalized
    pub fn match_text(&self, text: &str) -> MatchResult {
        let candidates = self.detector.detect(text);
        debug!("Address detector returned {} candidates", candidates.len());

        candidates
            .iter()
            .find(|candidate| self.filter.accepts(candidate))
            .map(|candidate| MatchResult::Matched(candidate.normalized()))
            .unwrap_or(MatchResult::NoMatch)
    }
}
