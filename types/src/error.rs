//! Top-level error type shared across crates.

use thiserror::Error;

/// Common error type for the BSQ types layer.
#[derive(Debug, Error)]
pub enum BsqError {
    #[error("invalid hex id: {0}")]
    InvalidHex(String),

    #[error("invalid id length: expected 32 bytes, got {0}")]
    InvalidIdLength(usize),

    #[error("unknown network: {0}")]
    UnknownNetwork(String),

    #[error("amount overflow")]
    AmountOverflow,

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("schedule entry at {height} does not follow the latest entry at {latest}")]
    ScheduleOutOfOrder { height: u32, latest: u32 },
}
