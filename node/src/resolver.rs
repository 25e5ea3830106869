//! Ordering of transactions that spend each other inside one block.
//!
//! A block's tx list need not be topologically sorted. Each pass classifies
//! the txs that reference no other still-pending tx of the block, in block
//! order, and leaves the rest for the next pass.

use std::collections::HashSet;

use tracing::{error, trace, warn};

use bsq_ledger::{BlockDelta, BlockView, ChainState, Tx};
use bsq_types::{ConsensusParams, TxId};

use crate::classifier::{Classification, TransactionClassifier};
use crate::error::NodeError;

/// Counts from resolving one block.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ResolveStats {
    pub passes: u32,
    pub token_txs: usize,
    pub ignored_txs: usize,
    pub duplicate_txs: usize,
    pub rejected_payloads: usize,
}

pub struct IntraBlockDependencyResolver {
    max_recursions: u32,
    warn_threshold: u32,
}

impl IntraBlockDependencyResolver {
    pub fn new(max_recursions: u32, warn_threshold: u32) -> Self {
        Self {
            max_recursions,
            warn_threshold,
        }
    }

    pub fn from_params(params: &ConsensusParams) -> Self {
        Self::new(params.max_recursions, params.recursion_warn_threshold)
    }

    pub fn max_recursions(&self) -> u32 {
        self.max_recursions
    }

    /// Classify `txs` into `delta`, resolving intra-block dependencies.
    ///
    /// Fails with `RecursionCeilingExceeded` when more than `max_recursions`
    /// passes would be needed, or when no pending tx can make progress.
    pub fn resolve(
        &self,
        classifier: &TransactionClassifier,
        state: &ChainState,
        delta: &mut BlockDelta,
        txs: Vec<Tx>,
    ) -> Result<ResolveStats, NodeError> {
        let height = delta.height();
        let mut stats = ResolveStats::default();
        let mut pending = txs;

        while !pending.is_empty() {
            if stats.passes >= self.max_recursions {
                return Err(self.ceiling_exceeded(height, stats.passes, pending.len()));
            }
            stats.passes += 1;
            if stats.passes > self.warn_threshold {
                warn!(
                    height,
                    depth = stats.passes,
                    pending = pending.len(),
                    "deep intra-block dependency chain"
                );
            }

            let (ready, blocked) = partition(pending);
            if ready.is_empty() {
                // every pending tx waits on another pending tx
                return Err(self.ceiling_exceeded(height, self.max_recursions, blocked.len()));
            }
            trace!(
                height,
                pass = stats.passes,
                ready = ready.len(),
                blocked = blocked.len(),
                "dependency pass"
            );

            for tx in ready {
                let classification = {
                    let view = BlockView::new(state, delta);
                    classifier.classify(tx, &view, height)
                };
                match classification {
                    Classification::Genesis(tx) => {
                        stats.token_txs += 1;
                        delta.record_genesis(tx);
                    }
                    Classification::Token(classified) => {
                        stats.token_txs += 1;
                        if classified.rejected_payload {
                            stats.rejected_payloads += 1;
                        }
                        delta.record(
                            classified.tx,
                            classified.funding_requests,
                            classified.sponsor_payments,
                        );
                    }
                    Classification::Ignored => stats.ignored_txs += 1,
                    Classification::Duplicate => stats.duplicate_txs += 1,
                }
            }
            pending = blocked;
        }

        Ok(stats)
    }

    fn ceiling_exceeded(&self, height: u32, depth: u32, blocked: usize) -> NodeError {
        error!(height, depth, blocked, "intra-block dependency ceiling exceeded");
        NodeError::RecursionCeilingExceeded {
            height,
            depth,
            blocked,
        }
    }
}

/// Stable split into txs free of pending parents and the rest.
fn partition(pending: Vec<Tx>) -> (Vec<Tx>, Vec<Tx>) {
    let pending_ids: HashSet<TxId> = pending.iter().map(|tx| tx.id).collect();
    pending.into_iter().partition(|tx| {
        !tx.inputs.iter().any(|input| {
            let parent = input.previous_output.tx_id;
            parent != tx.id && pending_ids.contains(&parent)
        })
    })
}
