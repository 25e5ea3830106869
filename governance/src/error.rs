use thiserror::Error;

use bsq_types::{Amount, BtcAddress};

use crate::period::Phase;

/// Why an OP_RETURN payload was not accepted.
///
/// Rejections are an expected steady-state outcome: the interpreter logs them
/// and the output is treated as ordinary data.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PayloadError {
    #[error("payload too short: {0} bytes")]
    TooShort(usize),

    #[error("unknown payload type {0:#04x}")]
    UnknownType(u8),

    #[error("no payload version active at height {0}")]
    NoActiveVersion(u32),

    #[error("payload version {found} does not match expected {expected}")]
    VersionMismatch { expected: u8, found: u8 },

    #[error("no fee schedule entry at height {0}")]
    MissingFee(u32),

    #[error("fee mismatch: required {required}, available {available}")]
    FeeMismatch { required: Amount, available: Amount },

    #[error("invalid payload length: expected {expected}, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    #[error("vote count {0} is not even")]
    OddVoteCount(u8),

    #[error("vote pair {0} marks accepted items that were not voted on")]
    AcceptedWithoutVote(usize),

    #[error("payload not allowed in phase {actual:?}, requires {expected:?}")]
    WrongPhase { expected: Phase, actual: Option<Phase> },

    #[error("requested amount must be positive")]
    ZeroRequestedAmount,
}

#[derive(Debug, Error)]
pub enum GovernanceError {
    #[error("payload rejected: {0}")]
    Payload(#[from] PayloadError),

    #[error("no funding request for {0}")]
    NoFundingRequest(BtcAddress),

    #[error("payment of {payment} to {address} exceeds request: {funded} of {requested} already funded")]
    FundingExceeded {
        address: BtcAddress,
        requested: Amount,
        funded: Amount,
        payment: Amount,
    },

    #[error("amount overflow")]
    Overflow,
}
