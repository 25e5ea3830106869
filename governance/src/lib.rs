//! Consensus payloads embedded in OP_RETURN outputs.
//!
//! The interpreter recognises compensation requests and votes by their type
//! byte and hands them to the matching verifier, which checks version, fee,
//! structure and voting-cycle phase against ledger history. Issuance is
//! checked separately for transactions that carry no token input.

pub mod compensation;
pub mod error;
pub mod issuance;
pub mod op_return;
pub mod payload;
pub mod period;
mod rules;
pub mod voting;

#[cfg(test)]
mod test_util;

pub use compensation::{AcceptedCompensationRequest, CompensationRequestVerifier};
pub use error::{GovernanceError, PayloadError};
pub use issuance::{IssuanceOutcome, IssuanceVerifier};
pub use op_return::{OpReturnCandidate, OpReturnInterpreter, PayloadOutcome};
pub use payload::{
    CompensationRequestPayload, PayloadHeader, PayloadType, VotePair, VotePayload,
    OP_RETURN_TYPE_COMPENSATION_REQUEST, OP_RETURN_TYPE_VOTE,
};
pub use period::{DaoPeriod, Phase};
pub use voting::VotingVerifier;
