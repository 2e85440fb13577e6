//! Station identifiers and validated station records.

pub mod record;

use std::fmt;

use serde::Deserialize;

pub use record::{validate, RawRecord, RejectReason, StationRecord, Validation};

/// AWDB station triplet, e.g. `1000:OR:SNTL` (id, state, network).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize)]
#[serde(transparent)]
pub struct StationTriplet(String);

impl StationTriplet {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StationTriplet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for StationTriplet {
    fn from(value: String) -> Self {
        StationTriplet(value)
    }
}

impl From<&str> for StationTriplet {
    fn from(value: &str) -> Self {
        StationTriplet(value.to_string())
    }
}

// -- Tests -------------------------------------------------------------------
