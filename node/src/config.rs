//! Node configuration with TOML file support.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use bsq_types::params::{MAX_INTRA_BLOCK_RECURSIONS, SNAPSHOT_GRID};
use bsq_types::{ConsensusParams, GenesisPin, NetworkId, TxId};

use crate::logging::LogFormat;
use crate::NodeError;

/// Configuration for a BSQ indexer node.
///
/// Can be loaded from a TOML file via [`NodeConfig::from_toml_file`] or
/// built programmatically (e.g. for tests).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Which Bitcoin network to index.
    #[serde(default = "default_network")]
    pub network: NetworkId,

    /// Data directory for snapshot storage.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Overrides the network's genesis tx id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub genesis_tx_id: Option<TxId>,

    /// Overrides the network's genesis block height.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub genesis_block_height: Option<u32>,

    /// Block interval between snapshots.
    #[serde(default = "default_snapshot_grid")]
    pub snapshot_grid: u32,

    /// Ceiling on intra-block dependency passes.
    #[serde(default = "default_max_recursions")]
    pub max_recursions: u32,

    #[serde(default = "default_true")]
    pub enable_snapshots: bool,

    /// Log format: "human" or "json".
    #[serde(default = "default_log_format")]
    pub log_format: String,

    /// Log level filter: "trace", "debug", "info", "warn", "error".
    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default)]
    pub enable_metrics: bool,

    /// Re-parse blocks served by a full node instead of reading the chain.
    #[serde(default)]
    pub lite_mode: bool,
}

// ── Serde default helpers ──────────────────────────────────────────────

fn default_network() -> NetworkId {
    NetworkId::Regtest
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./bsq_data")
}

fn default_snapshot_grid() -> u32 {
    SNAPSHOT_GRID
}

fn default_max_recursions() -> u32 {
    MAX_INTRA_BLOCK_RECURSIONS
}

fn default_true() -> bool {
    true
}

fn default_log_format() -> String {
    "human".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

// ── Impl ───────────────────────────────────────────────────────────────

impl NodeConfig {
    /// Load configuration from a TOML file.
    pub fn from_toml_file(path: &str) -> Result<Self, NodeError> {
        let content =
            std::fs::read_to_string(path).map_err(|e| NodeError::Config(e.to_string()))?;
        Self::from_toml_str(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml_str(s: &str) -> Result<Self, NodeError> {
        toml::from_str(s).map_err(|e| NodeError::Config(e.to_string()))
    }

    /// Serialize the configuration to a TOML string.
    pub fn to_toml_string(&self) -> Result<String, NodeError> {
        toml::to_string_pretty(self).map_err(|e| NodeError::Config(e.to_string()))
    }

    pub fn log_format(&self) -> Result<LogFormat, NodeError> {
        self.log_format.parse()
    }

    /// The network's genesis pin with any configured override applied.
    pub fn genesis(&self) -> GenesisPin {
        let pinned = self.network.genesis();
        GenesisPin {
            tx_id: self.genesis_tx_id.unwrap_or(pinned.tx_id),
            block_height: self.genesis_block_height.unwrap_or(pinned.block_height),
        }
    }

    /// Consensus parameters for the configured network.
    pub fn consensus_params(&self) -> Result<ConsensusParams, NodeError> {
        if self.snapshot_grid == 0 {
            return Err(NodeError::Config("snapshot_grid must be positive".into()));
        }
        if self.max_recursions == 0 {
            return Err(NodeError::Config("max_recursions must be positive".into()));
        }
        let mut params = ConsensusParams::with_genesis(self.network, self.genesis());
        params.snapshot_grid = self.snapshot_grid;
        params.max_recursions = self.max_recursions;
        params.recursion_warn_threshold = params.recursion_warn_threshold.min(self.max_recursions);
        Ok(params)
    }

    /// Where LMDB snapshot storage lives.
    pub fn snapshot_dir(&self) -> PathBuf {
        self.data_dir.join(self.network.as_str()).join("snapshots")
    }
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            network: default_network(),
            data_dir: default_data_dir(),
            genesis_tx_id: None,
            genesis_block_height: None,
            snapshot_grid: default_snapshot_grid(),
            max_recursions: default_max_recursions(),
            enable_snapshots: default_true(),
            log_format: default_log_format(),
            log_level: default_log_level(),
            enable_metrics: false,
            lite_mode: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_round_trips_through_toml() {
        let config = NodeConfig::default();
        let toml_str = config.to_toml_string().unwrap();
        let parsed = NodeConfig::from_toml_str(&toml_str).expect("should parse");
        assert_eq!(parsed, config);
    }

    #[test]
    fn minimal_toml_uses_defaults() {
        let config = NodeConfig::from_toml_str("").expect("empty toml should use defaults");
        assert_eq!(config.network, NetworkId::Regtest);
        assert_eq!(config.snapshot_grid, 100);
        assert_eq!(config.max_recursions, 5_300);
        assert!(config.enable_snapshots);
        assert_eq!(config.log_format, "human");
    }

    #[test]
    fn partial_toml_overrides() {
        let toml = r#"
            network = "mainnet"
            snapshot_grid = 20
            lite_mode = true
        "#;
        let config = NodeConfig::from_toml_str(toml).expect("should parse");
        assert_eq!(config.network, NetworkId::Mainnet);
        assert_eq!(config.snapshot_grid, 20);
        assert!(config.lite_mode);
        assert_eq!(config.log_level, "info"); // default
    }

    #[test]
    fn genesis_override_reaches_consensus_params() {
        let toml = r#"
            genesis_tx_id = "0101010101010101010101010101010101010101010101010101010101010101"
            genesis_block_height = 7
            max_recursions = 10
        "#;
        let config = NodeConfig::from_toml_str(toml).unwrap();
        let params = config.consensus_params().unwrap();
        assert_eq!(params.genesis.tx_id, TxId::new([1; 32]));
        assert_eq!(params.genesis.block_height, 7);
        assert_eq!(params.max_recursions, 10);
        assert_eq!(params.recursion_warn_threshold, 10);
        assert_eq!(params.compensation_request_versions.effective_at(7), Some(&1));
    }

    #[test]
    fn zero_grid_is_rejected() {
        let config = NodeConfig {
            snapshot_grid: 0,
            ..NodeConfig::default()
        };
        assert!(matches!(config.consensus_params(), Err(NodeError::Config(_))));
    }

    #[test]
    fn missing_file_returns_config_error() {
        let result = NodeConfig::from_toml_file("/nonexistent/path/config.toml");
        assert!(matches!(result, Err(NodeError::Config(_))));
    }
}
