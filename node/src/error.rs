use thiserror::Error;

use crate::chain_source::ChainSourceError;

#[derive(Debug, Error)]
pub enum NodeError {
    #[error("ledger error: {0}")]
    Ledger(#[from] bsq_ledger::LedgerError),

    #[error("store error: {0}")]
    Store(#[from] bsq_store::StoreError),

    #[error("chain source error: {0}")]
    ChainSource(#[from] ChainSourceError),

    #[error(
        "intra-block dependency resolution exceeded {depth} passes at height {height} \
         with {blocked} txs still blocked"
    )]
    RecursionCeilingExceeded {
        height: u32,
        depth: u32,
        blocked: usize,
    },

    #[error("config error: {0}")]
    Config(String),

    #[error("metrics error: {0}")]
    Metrics(#[from] prometheus::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("parse worker has stopped")]
    WorkerStopped,

    #[error("parse job aborted before completing")]
    JobAborted,
}

impl NodeError {
    /// The fork condition: the caller should resync before parsing on.
    pub fn is_non_connecting(&self) -> bool {
        matches!(
            self,
            Self::Ledger(bsq_ledger::LedgerError::NonConnectingBlock { .. })
        )
    }
}
