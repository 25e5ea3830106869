//! Block-level parsing: classify under a read guard, commit under a write guard.

use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use tracing::{debug, info};

use bsq_ledger::{
    AppendOutcome, Block, BlockDelta, BlockHeader, LedgerError, LedgerStore, SnapshotOutcome, Tx,
};
use bsq_types::{Amount, BlockHash};

use crate::chain_source::{RawBlock, RawTx};
use crate::classifier::TransactionClassifier;
use crate::error::NodeError;
use crate::event::{EventBus, ParseEvent};
use crate::metrics::ParserMetrics;
use crate::resolver::{IntraBlockDependencyResolver, ResolveStats};

/// A block ready for classification: header plus unannotated txs.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BlockInput {
    pub header: BlockHeader,
    pub txs: Vec<Tx>,
}

impl BlockInput {
    pub fn from_raw(block: RawBlock, txs: Vec<RawTx>) -> Self {
        let txs = txs
            .into_iter()
            .map(|tx| tx.into_tx(block.height, block.hash))
            .collect();
        Self {
            header: BlockHeader {
                height: block.height,
                hash: block.hash,
                prev_hash: block.prev_hash,
            },
            txs,
        }
    }

    /// Re-parse a block served by a full node. Annotations are stripped.
    pub fn from_ledger_block(mut block: Block) -> Self {
        block.reset();
        Self {
            header: block.header(),
            txs: block.txs,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ParsedBlock {
    pub height: u32,
    pub hash: BlockHash,
    pub outcome: AppendOutcome,
    pub stats: ResolveStats,
    pub burnt_fee: Amount,
    pub snapshot: SnapshotOutcome,
}

/// Totals over a run of parsed blocks.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ParseSummary {
    pub first_height: Option<u32>,
    pub last_height: Option<u32>,
    pub blocks: usize,
    pub token_txs: usize,
    pub snapshots_persisted: usize,
}

impl ParseSummary {
    pub fn add(&mut self, parsed: &ParsedBlock) {
        self.first_height.get_or_insert(parsed.height);
        self.last_height = Some(parsed.height);
        self.blocks += 1;
        self.token_txs += parsed.stats.token_txs;
        if parsed.snapshot.persisted.is_some() {
            self.snapshots_persisted += 1;
        }
    }
}

/// Parses blocks into a shared [`LedgerStore`].
///
/// A store must have a single parser: classification runs against the
/// state seen under a read guard and assumes nobody else appends before the
/// commit.
pub struct BlockParser {
    ledger: Arc<LedgerStore>,
    classifier: TransactionClassifier,
    resolver: IntraBlockDependencyResolver,
    events: EventBus,
    metrics: Option<Arc<ParserMetrics>>,
}

impl BlockParser {
    pub fn new(ledger: Arc<LedgerStore>) -> Self {
        let params = ledger.params().clone();
        Self {
            classifier: TransactionClassifier::new(&params),
            resolver: IntraBlockDependencyResolver::from_params(&params),
            events: EventBus::new(),
            metrics: None,
            ledger,
        }
    }

    pub fn with_resolver(mut self, resolver: IntraBlockDependencyResolver) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn with_events(mut self, events: EventBus) -> Self {
        self.events = events;
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<ParserMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn ledger(&self) -> &Arc<LedgerStore> {
        &self.ledger
    }

    /// Classify and commit one block.
    ///
    /// Either the whole block is committed or the ledger is left untouched.
    /// A snapshot failure after the commit is returned as an error once the
    /// block has been announced.
    pub fn parse_block(&self, block: BlockInput) -> Result<ParsedBlock, NodeError> {
        let started = Instant::now();
        let BlockInput { header, txs } = block;
        let height = header.height;

        let (delta, stats) = self.ledger.read(|state| -> Result<_, NodeError> {
            let mut delta = BlockDelta::new(height);
            let stats = self
                .resolver
                .resolve(&self.classifier, state, &mut delta, txs)?;
            Ok((delta, stats))
        })??;
        let burnt_fee = delta.burnt_fee();

        let report = match self.ledger.append_block(header, delta) {
            Ok(report) => report,
            Err(e @ LedgerError::NonConnectingBlock { head_height, .. }) => {
                if let Some(metrics) = &self.metrics {
                    metrics.non_connecting_blocks.inc();
                }
                self.events.emit(&ParseEvent::NonConnecting {
                    height,
                    prev_hash: header.prev_hash,
                    head_height,
                });
                return Err(e.into());
            }
            Err(e) => return Err(e.into()),
        };

        let parsed = ParsedBlock {
            height,
            hash: header.hash,
            outcome: report.outcome,
            stats,
            burnt_fee,
            snapshot: report.snapshot,
        };
        // committed blocks are announced even if their snapshot failed
        match report.outcome {
            AppendOutcome::Appended { tx_count, .. } => {
                info!(
                    height,
                    txs = tx_count,
                    passes = stats.passes,
                    burnt = %burnt_fee,
                    "parsed block"
                );
                self.events.emit(&ParseEvent::BlockParsed {
                    height,
                    hash: header.hash,
                    token_txs: tx_count,
                    burnt_fee,
                });
            }
            AppendOutcome::Duplicate { .. } => debug!(height, "skipped known block"),
        }
        if let Some(captured) = report.snapshot.captured {
            self.events.emit(&ParseEvent::SnapshotCaptured { height: captured });
        }
        if let Some(persisted) = report.snapshot.persisted {
            self.events.emit(&ParseEvent::SnapshotPersisted { height: persisted });
        }
        self.record_metrics(&parsed, started)?;

        match report.snapshot_error {
            Some(e) => Err(e.into()),
            None => Ok(parsed),
        }
    }

    /// Parse blocks in order, stopping at the first failure.
    pub fn parse_blocks(
        &self,
        blocks: impl IntoIterator<Item = BlockInput>,
    ) -> Result<ParseSummary, NodeError> {
        let mut summary = ParseSummary::default();
        for block in blocks {
            let parsed = self.parse_block(block)?;
            summary.add(&parsed);
        }
        Ok(summary)
    }

    fn record_metrics(&self, parsed: &ParsedBlock, started: Instant) -> Result<(), NodeError> {
        let Some(metrics) = &self.metrics else {
            return Ok(());
        };
        if let AppendOutcome::Appended { tx_count, .. } = parsed.outcome {
            metrics.blocks_parsed.inc();
            metrics.token_txs.inc_by(tx_count as u64);
            metrics.rejected_payloads.inc_by(parsed.stats.rejected_payloads as u64);
        }
        if parsed.snapshot.persisted.is_some() {
            metrics.snapshots_persisted.inc();
        }
        metrics
            .chain_head_height
            .set(i64::from(self.ledger.chain_head_height()?));
        metrics
            .unspent_outputs
            .set(self.ledger.unspent_count()? as i64);
        metrics
            .block_parse_time_ms
            .observe(started.elapsed().as_secs_f64() * 1_000.0);
        Ok(())
    }
}
