//! Nullable chain source: in-memory blocks with injectable failures.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use bsq_node::{ChainDump, ChainSourceError, RawBlock, RawChainSource, RawTx};
use bsq_types::TxId;

#[derive(Default)]
struct Chain {
    blocks: BTreeMap<u32, RawBlock>,
    txs: HashMap<TxId, RawTx>,
    failing_heights: BTreeSet<u32>,
}

/// A chain source for tests.
///
/// Blocks can be added while a parser is running, and individual heights
/// can be made to fail with a transport error.
#[derive(Default)]
pub struct NullChainSource {
    chain: Mutex<Chain>,
    block_requests: AtomicUsize,
}

impl NullChainSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_dump(dump: ChainDump) -> Self {
        let source = Self::new();
        source.extend(dump);
        source
    }

    /// Add every block of `dump`, replacing blocks at the same height.
    pub fn extend(&self, dump: ChainDump) {
        let mut chain = self.lock();
        for block in dump.blocks {
            let tx_ids = block.txs.iter().map(|tx| tx.id).collect();
            for tx in block.txs {
                chain.txs.insert(tx.id, tx);
            }
            chain.blocks.insert(
                block.height,
                RawBlock {
                    height: block.height,
                    hash: block.hash,
                    prev_hash: block.prev_hash,
                    tx_ids,
                },
            );
        }
    }

    /// Make `get_block` fail at `height` until [`Self::heal`] is called.
    pub fn fail_at(&self, height: u32) {
        self.lock().failing_heights.insert(height);
    }

    pub fn heal(&self, height: u32) {
        self.lock().failing_heights.remove(&height);
    }

    /// Number of `get_block` calls served or failed so far.
    pub fn block_requests(&self) -> usize {
        self.block_requests.load(Ordering::Relaxed)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Chain> {
        // a panicking test thread must not hide the chain from the others
        self.chain
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl RawChainSource for NullChainSource {
    fn chain_head_height(&self) -> Result<u32, ChainSourceError> {
        self.lock()
            .blocks
            .keys()
            .next_back()
            .copied()
            .ok_or_else(|| ChainSourceError::Transport("chain is empty".into()))
    }

    fn get_block(&self, height: u32) -> Result<RawBlock, ChainSourceError> {
        self.block_requests.fetch_add(1, Ordering::Relaxed);
        let chain = self.lock();
        if chain.failing_heights.contains(&height) {
            return Err(ChainSourceError::Transport(format!(
                "injected failure at height {height}"
            )));
        }
        chain
            .blocks
            .get(&height)
            .cloned()
            .ok_or(ChainSourceError::BlockNotFound(height))
    }

    fn get_raw_transaction(&self, tx_id: &TxId) -> Result<RawTx, ChainSourceError> {
        self.lock()
            .txs
            .get(tx_id)
            .cloned()
            .ok_or(ChainSourceError::TxNotFound(*tx_id))
    }
}
