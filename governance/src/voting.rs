//! Vote payload verification.

use bsq_ledger::{FeeKind, LedgerView};
use bsq_types::{Amount, ConsensusParams, HeightSchedule};

use crate::error::PayloadError;
use crate::payload::VotePayload;
use crate::period::{DaoPeriod, Phase};
use crate::rules::{check_fee, check_phase, check_version};

pub struct VotingVerifier {
    versions: HeightSchedule<u8>,
    period: DaoPeriod,
}

impl VotingVerifier {
    pub fn new(params: &ConsensusParams) -> Self {
        Self {
            versions: params.voting_versions.clone(),
            period: DaoPeriod::new(params.genesis.block_height, params.period),
        }
    }

    /// Structural checks run first so a malformed payload is reported as
    /// such regardless of fee or timing.
    pub fn verify(
        &self,
        view: &dyn LedgerView,
        data: &[u8],
        available: Amount,
        height: u32,
    ) -> Result<VotePayload, PayloadError> {
        let payload = VotePayload::decode(data)?;
        check_version(&self.versions, height, payload.version)?;
        check_fee(view, FeeKind::Voting, height, available)?;
        check_phase(&self.period, height, Phase::Voting)?;
        Ok(payload)
    }
}
