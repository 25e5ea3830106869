//! OP_RETURN payload dispatch.

use tracing::debug;

use bsq_ledger::{FundingRequest, LedgerView, TxOutput};
use bsq_types::{Amount, ConsensusParams, TxOutputType, TxType};

use crate::compensation::CompensationRequestVerifier;
use crate::error::PayloadError;
use crate::payload::{PayloadHeader, PayloadType};
use crate::voting::VotingVerifier;

/// The metadata output under consideration and its surroundings.
#[derive(Clone, Copy, Debug)]
pub struct OpReturnCandidate<'a> {
    pub data: &'a [u8],
    pub output: &'a TxOutput,
    /// Token value not yet allocated to an output.
    pub available: Amount,
    pub height: u32,
    /// First BTC output seen while token value remained.
    pub issuance_candidate: Option<&'a TxOutput>,
}

/// What an accepted payload changes on its transaction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PayloadOutcome {
    pub tx_type: TxType,
    pub metadata_output_type: TxOutputType,
    /// Output to re-tag as issuance candidate.
    pub issuance_candidate: Option<u32>,
    pub funding_request: Option<FundingRequest>,
}

pub struct OpReturnInterpreter {
    compensation: CompensationRequestVerifier,
    voting: VotingVerifier,
}

impl OpReturnInterpreter {
    pub fn new(params: &ConsensusParams) -> Self {
        Self {
            compensation: CompensationRequestVerifier::new(params),
            voting: VotingVerifier::new(params),
        }
    }

    /// Interpret the payload, logging and swallowing any rejection.
    pub fn maybe_process(
        &self,
        view: &dyn LedgerView,
        candidate: OpReturnCandidate<'_>,
    ) -> Option<PayloadOutcome> {
        match self.interpret(view, candidate) {
            Ok(outcome) => {
                debug!(
                    tx_id = %candidate.output.tx_id,
                    tx_type = outcome.tx_type.as_str(),
                    "accepted OP_RETURN payload"
                );
                Some(outcome)
            }
            Err(e) => {
                debug!(
                    tx_id = %candidate.output.tx_id,
                    height = candidate.height,
                    error = %e,
                    "rejected OP_RETURN payload"
                );
                None
            }
        }
    }

    pub fn interpret(
        &self,
        view: &dyn LedgerView,
        candidate: OpReturnCandidate<'_>,
    ) -> Result<PayloadOutcome, PayloadError> {
        let header = PayloadHeader::parse(candidate.data)?;
        match header.payload_type {
            PayloadType::CompensationRequest => {
                let accepted = self.compensation.verify(
                    view,
                    candidate.data,
                    candidate.available,
                    candidate.height,
                    candidate.output.tx_id,
                    candidate.issuance_candidate,
                )?;
                Ok(PayloadOutcome {
                    tx_type: TxType::CompensationRequest,
                    metadata_output_type: TxOutputType::CompensationRequestMetadataOutput,
                    issuance_candidate: accepted.issuance_candidate_index,
                    funding_request: accepted.funding_request,
                })
            }
            PayloadType::Vote => {
                self.voting.verify(
                    view,
                    candidate.data,
                    candidate.available,
                    candidate.height,
                )?;
                Ok(PayloadOutcome {
                    tx_type: TxType::Vote,
                    metadata_output_type: TxOutputType::VoteMetadataOutput,
                    issuance_candidate: None,
                    funding_request: None,
                })
            }
        }
    }
}
