//! Text Analysis Layer
//!
//! Reads recognized text for a qualifying postal address and the
//! apartment/unit number that goes with it.

pub mod address;
pub mod unit;

pub use address::{AddressFilter, AddressMatcher, MatchResult};
pub use unit::{ExtractionResult, UnitExtractor};
