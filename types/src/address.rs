//! Bitcoin address of an output owner.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A Bitcoin address string as reported by the chain source.
///
/// The indexer never derives or validates addresses; it only compares them,
/// so the raw string is kept as-is.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BtcAddress(String);

impl BtcAddress {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BtcAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for BtcAddress {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for BtcAddress {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}
