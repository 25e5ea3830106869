//! Compensation request verification.

use bsq_ledger::{FeeKind, FundingRequest, LedgerView, TxOutput};
use bsq_types::{Amount, ConsensusParams, HeightSchedule, TxId};

use crate::error::PayloadError;
use crate::payload::CompensationRequestPayload;
use crate::period::{DaoPeriod, Phase};
use crate::rules::{check_fee, check_phase, check_version};

/// An accepted compensation request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AcceptedCompensationRequest {
    pub payload: CompensationRequestPayload,
    pub fee: Amount,
    /// Index of the BTC output that receives issuance if the request is funded.
    pub issuance_candidate_index: Option<u32>,
    /// Absent when there is no candidate address to fund.
    pub funding_request: Option<FundingRequest>,
}

pub struct CompensationRequestVerifier {
    versions: HeightSchedule<u8>,
    period: DaoPeriod,
}

impl CompensationRequestVerifier {
    pub fn new(params: &ConsensusParams) -> Self {
        Self {
            versions: params.compensation_request_versions.clone(),
            period: DaoPeriod::new(params.genesis.block_height, params.period),
        }
    }

    pub fn verify(
        &self,
        view: &dyn LedgerView,
        data: &[u8],
        available: Amount,
        height: u32,
        tx_id: TxId,
        issuance_candidate: Option<&TxOutput>,
    ) -> Result<AcceptedCompensationRequest, PayloadError> {
        let payload = CompensationRequestPayload::decode(data)?;
        check_version(&self.versions, height, payload.version)?;
        let fee = check_fee(view, FeeKind::CompensationRequest, height, available)?;
        check_phase(&self.period, height, Phase::CompensationRequest)?;

        if payload.requested_amount.is_zero() {
            return Err(PayloadError::ZeroRequestedAmount);
        }
        let candidate = issuance_candidate.filter(|c| c.address.is_some());
        let funding_request = candidate.and_then(|c| c.address.clone()).map(|address| {
            FundingRequest {
                address,
                requested_amount: payload.requested_amount,
                tx_id,
                block_height: height,
            }
        });

        Ok(AcceptedCompensationRequest {
            funding_request,
            issuance_candidate_index: candidate.map(|c| c.index),
            fee,
            payload,
        })
    }
}
