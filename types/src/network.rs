//! Network identifier and per-network genesis pins.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::error::BsqError;
use crate::hash::TxId;

/// Identifies which Bitcoin network the indexer follows.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NetworkId {
    /// Bitcoin main network.
    Mainnet,
    /// Bitcoin public test network.
    Testnet,
    /// Local regression test network.
    Regtest,
}

/// The `(tx id, block height)` pair designating the genesis transaction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GenesisPin {
    pub tx_id: TxId,
    pub block_height: u32,
}

const MAINNET_GENESIS_TX_ID: &str =
    "e5c8313c4144d219b5f6b2dacf1d36f2d43a9039bb2fcd1bd57f8352a9c9809a";
const MAINNET_GENESIS_BLOCK_HEIGHT: u32 = 477_865;

const TESTNET_GENESIS_TX_ID: &str =
    "e360c3c77f43d53cbbf3dc8064c888a10310930a6427770ce4c8ead388edf17c";
const TESTNET_GENESIS_BLOCK_HEIGHT: u32 = 1_119_668;

const REGTEST_GENESIS_TX_ID: &str =
    "389d631bb48bd2f74fcc88c3506e2b03114b18b4e396c3bd2b8bb7d7ff9ee0d6";
const REGTEST_GENESIS_BLOCK_HEIGHT: u32 = 1_441;

impl NetworkId {
    /// Human-readable name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Mainnet => "mainnet",
            Self::Testnet => "testnet",
            Self::Regtest => "regtest",
        }
    }

    /// The hard-coded genesis pin for this network.
    pub fn genesis(&self) -> GenesisPin {
        let (hex, block_height) = match self {
            Self::Mainnet => (MAINNET_GENESIS_TX_ID, MAINNET_GENESIS_BLOCK_HEIGHT),
            Self::Testnet => (TESTNET_GENESIS_TX_ID, TESTNET_GENESIS_BLOCK_HEIGHT),
            Self::Regtest => (REGTEST_GENESIS_TX_ID, REGTEST_GENESIS_BLOCK_HEIGHT),
        };
        // The constants above are 64 hex chars; a failure here is a typo caught by tests.
        let tx_id = TxId::from_hex(hex).unwrap_or(TxId::ZERO);
        GenesisPin {
            tx_id,
            block_height,
        }
    }
}

impl FromStr for NetworkId {
    type Err = BsqError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "mainnet" | "main" | "btc_mainnet" => Ok(Self::Mainnet),
            "testnet" | "test" | "btc_testnet" => Ok(Self::Testnet),
            "regtest" | "btc_regtest" => Ok(Self::Regtest),
            other => Err(BsqError::UnknownNetwork(other.to_string())),
        }
    }
}
