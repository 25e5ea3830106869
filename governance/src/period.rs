//! Voting cycle phases.
//!
//! From the genesis height on, the chain is split into cycles of four
//! consecutive phases. Compensation requests are only valid during the
//! request phase and votes only during the voting phase.

use serde::{Deserialize, Serialize};

use bsq_types::PeriodParams;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Phase {
    CompensationRequest,
    BreakBeforeVoting,
    Voting,
    BreakAfterVoting,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CompensationRequest => "compensation_request",
            Self::BreakBeforeVoting => "break_before_voting",
            Self::Voting => "voting",
            Self::BreakAfterVoting => "break_after_voting",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DaoPeriod {
    genesis_height: u32,
    params: PeriodParams,
}

impl DaoPeriod {
    pub fn new(genesis_height: u32, params: PeriodParams) -> Self {
        Self {
            genesis_height,
            params,
        }
    }

    /// Zero-based cycle number, `None` before genesis.
    pub fn cycle_index(&self, height: u32) -> Option<u32> {
        let cycle = self.params.cycle_length();
        if cycle == 0 {
            return None;
        }
        height
            .checked_sub(self.genesis_height)
            .map(|offset| offset / cycle)
    }

    /// First block of the cycle containing `height`.
    pub fn cycle_start(&self, height: u32) -> Option<u32> {
        let index = self.cycle_index(height)?;
        Some(self.genesis_height + index * self.params.cycle_length())
    }

    pub fn phase_at(&self, height: u32) -> Option<Phase> {
        let cycle = self.params.cycle_length();
        if cycle == 0 {
            return None;
        }
        let mut offset = height.checked_sub(self.genesis_height)? % cycle;
        let phases = [
            (Phase::CompensationRequest, self.params.compensation_request_blocks),
            (Phase::BreakBeforeVoting, self.params.break_before_voting_blocks),
            (Phase::Voting, self.params.voting_blocks),
            (Phase::BreakAfterVoting, self.params.break_after_voting_blocks),
        ];
        for (phase, len) in phases {
            if offset < len {
                return Some(phase);
            }
            offset -= len;
        }
        None
    }

    pub fn is_in_phase(&self, height: u32, phase: Phase) -> bool {
        self.phase_at(height) == Some(phase)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn regtest() -> DaoPeriod {
        DaoPeriod::new(100, PeriodParams::regtest_defaults())
    }

    #[test]
    fn before_genesis_has_no_phase() {
        assert_eq!(regtest().phase_at(99), None);
        assert_eq!(regtest().cycle_index(0), None);
    }

    #[test]
    fn phase_boundaries() {
        let p = regtest();
        // 20 / 2 / 10 / 2
        assert_eq!(p.phase_at(100), Some(Phase::CompensationRequest));
        assert_eq!(p.phase_at(119), Some(Phase::CompensationRequest));
        assert_eq!(p.phase_at(120), Some(Phase::BreakBeforeVoting));
        assert_eq!(p.phase_at(122), Some(Phase::Voting));
        assert_eq!(p.phase_at(131), Some(Phase::Voting));
        assert_eq!(p.phase_at(132), Some(Phase::BreakAfterVoting));
        assert_eq!(p.phase_at(133), Some(Phase::BreakAfterVoting));
    }

    #[test]
    fn cycles_repeat() {
        let p = regtest();
        assert_eq!(p.phase_at(134), Some(Phase::CompensationRequest));
        assert_eq!(p.cycle_index(134), Some(1));
        assert_eq!(p.cycle_start(150), Some(134));
        assert!(p.is_in_phase(134 + 25, Phase::Voting));
    }

    #[test]
    fn empty_cycle_is_never_in_a_phase() {
        let params = PeriodParams {
            compensation_request_blocks: 0,
            break_before_voting_blocks: 0,
            voting_blocks: 0,
            break_after_voting_blocks: 0,
        };
        assert_eq!(DaoPeriod::new(0, params).phase_at(10), None);
    }
}
