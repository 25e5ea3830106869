//! Consensus parameters: everything two independent indexers must agree on.

use serde::{Deserialize, Serialize};

use crate::amount::Amount;
use crate::network::{GenesisPin, NetworkId};
use crate::schedule::HeightSchedule;

/// Default snapshot grid, in blocks.
pub const SNAPSHOT_GRID: u32 = 100;

/// Worst case is one resolved tx per pass. A 1 MB block holds at most about
/// 5300 minimal transactions.
pub const MAX_INTRA_BLOCK_RECURSIONS: u32 = 5_300;

/// Depth above which the resolver starts logging warnings.
pub const RECURSION_WARN_THRESHOLD: u32 = 1_000;

/// Payload version expected since genesis.
pub const PAYLOAD_VERSION_1: u8 = 0x01;

/// Phase lengths of one voting cycle, in blocks.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeriodParams {
    pub compensation_request_blocks: u32,
    pub break_before_voting_blocks: u32,
    pub voting_blocks: u32,
    pub break_after_voting_blocks: u32,
}

impl PeriodParams {
    pub fn cycle_length(&self) -> u32 {
        self.compensation_request_blocks
            .saturating_add(self.break_before_voting_blocks)
            .saturating_add(self.voting_blocks)
            .saturating_add(self.break_after_voting_blocks)
    }

    /// Roughly ten days of requests and three days of voting.
    pub fn mainnet_defaults() -> Self {
        Self {
            compensation_request_blocks: 1_440,
            break_before_voting_blocks: 10,
            voting_blocks: 432,
            break_after_voting_blocks: 10,
        }
    }

    /// Short phases for local testing.
    pub fn regtest_defaults() -> Self {
        Self {
            compensation_request_blocks: 20,
            break_before_voting_blocks: 2,
            voting_blocks: 10,
            break_after_voting_blocks: 2,
        }
    }
}

/// All consensus-relevant parameters for one network.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsensusParams {
    pub network: NetworkId,
    pub genesis: GenesisPin,
    /// Block interval at which state snapshots are taken.
    pub snapshot_grid: u32,
    /// Hard ceiling on intra-block dependency passes.
    pub max_recursions: u32,
    pub recursion_warn_threshold: u32,
    /// Expected compensation request payload version by activation height.
    pub compensation_request_versions: HeightSchedule<u8>,
    /// Expected vote payload version by activation height.
    pub voting_versions: HeightSchedule<u8>,
    /// Fee recorded at genesis height for compensation requests.
    pub initial_compensation_request_fee: Amount,
    /// Fee recorded at genesis height for votes.
    pub initial_voting_fee: Amount,
    pub period: PeriodParams,
}

impl ConsensusParams {
    pub fn for_network(network: NetworkId) -> Self {
        Self::with_genesis(network, network.genesis())
    }

    /// Parameters for `network` but with an overridden genesis pin.
    pub fn with_genesis(network: NetworkId, genesis: GenesisPin) -> Self {
        let period = match network {
            NetworkId::Mainnet | NetworkId::Testnet => PeriodParams::mainnet_defaults(),
            NetworkId::Regtest => PeriodParams::regtest_defaults(),
        };
        Self {
            network,
            genesis,
            snapshot_grid: SNAPSHOT_GRID,
            max_recursions: MAX_INTRA_BLOCK_RECURSIONS,
            recursion_warn_threshold: RECURSION_WARN_THRESHOLD,
            compensation_request_versions: HeightSchedule::starting_at(
                genesis.block_height,
                PAYLOAD_VERSION_1,
            ),
            voting_versions: HeightSchedule::starting_at(genesis.block_height, PAYLOAD_VERSION_1),
            initial_compensation_request_fee: Amount::new(100),
            initial_voting_fee: Amount::new(200),
            period,
        }
    }
}

impl Default for ConsensusParams {
    fn default() -> Self {
        Self::for_network(NetworkId::Regtest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn versions_start_at_genesis() {
        let params = ConsensusParams::for_network(NetworkId::Mainnet);
        let g = params.genesis.block_height;
        assert_eq!(params.voting_versions.effective_at(g - 1), None);
        assert_eq!(params.voting_versions.effective_at(g), Some(&PAYLOAD_VERSION_1));
    }

    #[test]
    fn regtest_uses_short_cycle() {
        let params = ConsensusParams::default();
        assert_eq!(params.network, NetworkId::Regtest);
        assert_eq!(params.period.cycle_length(), 34);
    }
}
