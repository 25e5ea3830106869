//! Derived BSQ ledger.
//!
//! Holds blocks, classified transactions, the unspent token output index,
//! fee schedules and governance records as a single `ChainState` value,
//! shared through the lock-guarded `LedgerStore`.

pub mod delta;
pub mod error;
pub mod funding;
pub mod model;
pub mod snapshot;
pub mod state;
pub mod store;
pub mod view;

pub use delta::{BlockDelta, BlockView};
pub use error::LedgerError;
pub use funding::{FeeKind, FundingRequest, SponsorPayment};
pub use model::{Block, BlockHeader, ScriptType, SpentInfo, Tx, TxInput, TxOutput};
pub use snapshot::{
    is_snapshot_height, snapshot_height, ChainStateSnapshot, SnapshotManager, SnapshotOutcome,
};
pub use state::{AppendOutcome, ChainState};
pub use store::{AppendReport, LedgerStore};
pub use view::LedgerView;
