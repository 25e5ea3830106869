//! Fundamental types for the BSQ indexer.
//!
//! This crate defines the core types shared across every other crate in the workspace:
//! transaction and block identifiers, token amounts, network pins, classification
//! tags, height-indexed schedules and the consensus parameters.

pub mod address;
pub mod amount;
pub mod block;
pub mod error;
pub mod hash;
pub mod network;
pub mod params;
pub mod schedule;
pub mod state;
pub mod time;

pub use address::BtcAddress;
pub use amount::Amount;
pub use block::BlockHash;
pub use error::BsqError;
pub use hash::{TxId, TxOutputKey};
pub use network::{GenesisPin, NetworkId};
pub use params::{ConsensusParams, PeriodParams};
pub use schedule::HeightSchedule;
pub use state::{TxOutputType, TxType};
pub use time::Timestamp;
