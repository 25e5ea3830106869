//! Governance records derived from accepted payloads.

use serde::{Deserialize, Serialize};

use bsq_types::{Amount, BtcAddress, TxId};

/// Fee-gated payload families with their own fee schedule.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FeeKind {
    CompensationRequest,
    Voting,
}

impl FeeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CompensationRequest => "compensation_request",
            Self::Voting => "voting",
        }
    }
}

/// An accepted compensation request, capping future issuance to `address`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FundingRequest {
    pub address: BtcAddress,
    pub requested_amount: Amount,
    pub tx_id: TxId,
    pub block_height: u32,
}

/// A payment accepted as issuance against a funding request.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SponsorPayment {
    pub address: BtcAddress,
    pub amount: Amount,
    pub tx_id: TxId,
    pub block_height: u32,
}

impl SponsorPayment {
    /// Deterministic ordering key for running totals.
    pub fn order_key(&self) -> (u32, TxId) {
        (self.block_height, self.tx_id)
    }
}
