use thiserror::Error;

use bsq_types::{BlockHash, TxId, TxOutputKey};

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error(
        "non-connecting block {height} (prev {prev_hash}): chain head is {head_height} ({head_hash})"
    )]
    NonConnectingBlock {
        height: u32,
        prev_hash: BlockHash,
        head_height: u32,
        head_hash: BlockHash,
    },

    #[error("output {0} is not spendable")]
    OutputNotSpendable(TxOutputKey),

    #[error("output {0} is already verified")]
    OutputAlreadyVerified(TxOutputKey),

    #[error("output {0} not found")]
    OutputNotFound(TxOutputKey),

    #[error("transaction {0} is already in the ledger")]
    DuplicateTx(TxId),

    #[error("genesis transaction already set")]
    GenesisAlreadySet,

    #[error("genesis mismatch: expected {expected} at {expected_height}, got {found} at {found_height}")]
    GenesisMismatch {
        expected: TxId,
        expected_height: u32,
        found: TxId,
        found_height: u32,
    },

    #[error("fee entry at {height} is not above chain head {head}")]
    RetroactiveFeeEntry { height: u32, head: u32 },

    #[error("fee schedule: {0}")]
    FeeSchedule(#[from] bsq_types::BsqError),

    #[error("unsupported snapshot version {0}")]
    SnapshotVersion(u32),

    #[error("snapshot at height {height} failed hash verification")]
    SnapshotHashMismatch { height: u32 },

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("ledger lock poisoned")]
    LockPoisoned,

    #[error("storage error: {0}")]
    Storage(#[from] bsq_store::StoreError),
}
