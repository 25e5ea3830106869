//! Parse orchestration.
//!
//! All parsing runs on one serialized worker: jobs are queued to a tokio
//! task that runs them one at a time on the blocking pool, and each caller
//! gets its result back through a oneshot channel on its own task. The
//! chain source is only called from inside a job, never under a ledger
//! lock. A running job is never cancelled; shutdown only stops the worker
//! from taking the next one.

use std::sync::Arc;

use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use bsq_ledger::Block;

use crate::chain_source::RawChainSource;
use crate::error::NodeError;
use crate::parser::{BlockInput, BlockParser, ParseSummary};

/// Queued jobs beyond the running one.
const JOB_QUEUE_CAPACITY: usize = 16;

type Task = Box<dyn FnOnce() + Send + 'static>;

struct ParseWorker {
    jobs: mpsc::Sender<Task>,
    handle: JoinHandle<()>,
}

impl ParseWorker {
    fn spawn(name: &'static str, mut shutdown: broadcast::Receiver<()>) -> Self {
        let (jobs, mut rx) = mpsc::channel::<Task>(JOB_QUEUE_CAPACITY);
        let handle = tokio::spawn(async move {
            let mut listening = true;
            loop {
                let task = tokio::select! {
                    task = rx.recv() => task,
                    signal = shutdown.recv(), if listening => match signal {
                        Err(broadcast::error::RecvError::Closed) => {
                            listening = false;
                            continue;
                        }
                        _ => {
                            info!(worker = name, "parse worker shutting down");
                            None
                        }
                    },
                };
                let Some(task) = task else { break };
                if let Err(e) = tokio::task::spawn_blocking(task).await {
                    error!(worker = name, error = %e, "parse job panicked");
                }
            }
            debug!(worker = name, "parse worker stopped");
        });
        Self { jobs, handle }
    }

    async fn submit<R, F>(&self, job: F) -> Result<R, NodeError>
    where
        F: FnOnce() -> Result<R, NodeError> + Send + 'static,
        R: Send + 'static,
    {
        let (reply, result) = oneshot::channel();
        let task: Task = Box::new(move || {
            let _ = reply.send(job());
        });
        self.jobs
            .send(task)
            .await
            .map_err(|_| NodeError::WorkerStopped)?;
        result.await.map_err(|_| NodeError::JobAborted)?
    }

    /// Stop accepting jobs and wait for the queued ones to finish.
    async fn stop(self) {
        drop(self.jobs);
        if let Err(e) = self.handle.await {
            error!(error = %e, "parse worker task failed");
        }
    }
}

/// Parses blocks fetched from a [`RawChainSource`].
pub struct FullNodeParser {
    parser: Arc<BlockParser>,
    source: Arc<dyn RawChainSource>,
    worker: ParseWorker,
}

impl FullNodeParser {
    pub fn spawn(
        parser: Arc<BlockParser>,
        source: Arc<dyn RawChainSource>,
        shutdown: broadcast::Receiver<()>,
    ) -> Self {
        Self {
            parser,
            source,
            worker: ParseWorker::spawn("full", shutdown),
        }
    }

    pub fn parser(&self) -> &Arc<BlockParser> {
        &self.parser
    }

    pub async fn chain_head_height(&self) -> Result<u32, NodeError> {
        let source = Arc::clone(&self.source);
        self.worker
            .submit(move || Ok(source.chain_head_height()?))
            .await
    }

    /// Fetch and parse the blocks `from..=to`.
    ///
    /// Blocks before a failing one stay committed; the failing block
    /// leaves the ledger untouched.
    pub async fn parse_blocks(&self, from: u32, to: u32) -> Result<ParseSummary, NodeError> {
        let parser = Arc::clone(&self.parser);
        let source = Arc::clone(&self.source);
        self.worker
            .submit(move || parse_range(&parser, source.as_ref(), from, to))
            .await
    }

    /// Parse from the ledger's next height up to the source's chain head.
    pub async fn parse_to_head(&self) -> Result<ParseSummary, NodeError> {
        let parser = Arc::clone(&self.parser);
        let source = Arc::clone(&self.source);
        self.worker
            .submit(move || {
                let from = parser.ledger().next_block_height()?;
                let head = source.chain_head_height()?;
                if from > head {
                    debug!(from, head, "ledger is at chain head");
                    return Ok(ParseSummary::default());
                }
                parse_range(&parser, source.as_ref(), from, head)
            })
            .await
    }

    /// Roll the ledger back to the latest snapshot; returns the resume height.
    pub async fn resync(&self) -> Result<u32, NodeError> {
        let parser = Arc::clone(&self.parser);
        self.worker
            .submit(move || Ok(parser.ledger().resync()?))
            .await
    }

    pub async fn shutdown(self) {
        self.worker.stop().await;
    }
}

fn parse_range(
    parser: &BlockParser,
    source: &dyn RawChainSource,
    from: u32,
    to: u32,
) -> Result<ParseSummary, NodeError> {
    let mut summary = ParseSummary::default();
    for height in from..=to {
        let (block, txs) = source.get_block_with_txs(height)?;
        let parsed = parser.parse_block(BlockInput::from_raw(block, txs))?;
        summary.add(&parsed);
    }
    if summary.blocks > 0 {
        info!(
            from,
            to,
            token_txs = summary.token_txs,
            "parsed block range"
        );
    }
    Ok(summary)
}

/// Re-parses blocks served by a full node.
pub struct LiteNodeParser {
    parser: Arc<BlockParser>,
    worker: ParseWorker,
}

impl LiteNodeParser {
    pub fn spawn(parser: Arc<BlockParser>, shutdown: broadcast::Receiver<()>) -> Self {
        Self {
            parser,
            worker: ParseWorker::spawn("lite", shutdown),
        }
    }

    pub fn parser(&self) -> &Arc<BlockParser> {
        &self.parser
    }

    pub async fn chain_head_height(&self) -> Result<u32, NodeError> {
        let parser = Arc::clone(&self.parser);
        self.worker
            .submit(move || Ok(parser.ledger().chain_head_height()?))
            .await
    }

    /// Parse blocks received from a full node; annotations are discarded
    /// and recomputed locally.
    pub async fn parse_blocks(&self, blocks: Vec<Block>) -> Result<ParseSummary, NodeError> {
        let parser = Arc::clone(&self.parser);
        self.worker
            .submit(move || {
                parser.parse_blocks(blocks.into_iter().map(BlockInput::from_ledger_block))
            })
            .await
    }

    pub async fn resync(&self) -> Result<u32, NodeError> {
        let parser = Arc::clone(&self.parser);
        self.worker
            .submit(move || Ok(parser.ledger().resync()?))
            .await
    }

    pub async fn shutdown(self) {
        self.worker.stop().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain_source::{ChainDump, DumpBlock, JsonChainSource, RawTx, RawTxOutput};
    use crate::shutdown::ShutdownController;
    use bsq_ledger::{LedgerStore, ScriptType};
    use bsq_types::{
        Amount, BlockHash, ConsensusParams, GenesisPin, NetworkId, Timestamp, TxId, TxOutputKey,
    };

    const GENESIS_HEIGHT: u32 = 5;

    fn params() -> ConsensusParams {
        ConsensusParams::with_genesis(
            NetworkId::Regtest,
            GenesisPin {
                tx_id: TxId::new([0xaa; 32]),
                block_height: GENESIS_HEIGHT,
            },
        )
    }

    fn hash(height: u32) -> BlockHash {
        let mut bytes = [0xbb; 32];
        bytes[..4].copy_from_slice(&height.to_be_bytes());
        BlockHash::new(bytes)
    }

    fn raw_tx(id: u8, input: Option<TxOutputKey>, value: u64) -> RawTx {
        RawTx {
            id: TxId::new([id; 32]),
            inputs: input.into_iter().collect(),
            outputs: vec![RawTxOutput {
                value: Amount::new(value),
                script_type: ScriptType::PubKeyHash,
                address: None,
                op_return: None,
            }],
            time: Timestamp::new(0),
        }
    }

    /// Genesis at 5, a transfer at 6, empty blocks up to `head`.
    fn dump(head: u32) -> ChainDump {
        let blocks = (GENESIS_HEIGHT..=head)
            .map(|height| DumpBlock {
                height,
                hash: hash(height),
                prev_hash: hash(height - 1),
                txs: match height {
                    GENESIS_HEIGHT => vec![raw_tx(0xaa, None, 1_000)],
                    6 => vec![raw_tx(
                        1,
                        Some(TxOutputKey::new(TxId::new([0xaa; 32]), 0)),
                        900,
                    )],
                    _ => Vec::new(),
                },
            })
            .collect();
        ChainDump { blocks }
    }

    fn full_parser(head: u32, shutdown: &ShutdownController) -> FullNodeParser {
        let parser = Arc::new(BlockParser::new(Arc::new(LedgerStore::new(params()))));
        let source = Arc::new(JsonChainSource::from_dump(dump(head)));
        FullNodeParser::spawn(parser, source, shutdown.subscribe())
    }

    #[tokio::test]
    async fn parses_to_chain_head() {
        let shutdown = ShutdownController::new();
        let full = full_parser(9, &shutdown);
        assert_eq!(full.chain_head_height().await.unwrap(), 9);

        let summary = full.parse_to_head().await.unwrap();
        assert_eq!(summary.first_height, Some(GENESIS_HEIGHT));
        assert_eq!(summary.last_height, Some(9));
        assert_eq!(summary.blocks, 5);
        assert_eq!(summary.token_txs, 2);

        let ledger = Arc::clone(full.parser().ledger());
        assert_eq!(ledger.chain_head_height().unwrap(), 9);
        assert_eq!(ledger.total_burnt_fee().unwrap(), Amount::new(100));

        // nothing left to do
        assert_eq!(full.parse_to_head().await.unwrap(), ParseSummary::default());
        full.shutdown().await;
    }

    #[tokio::test]
    async fn missing_block_aborts_job_without_partial_commit() {
        let shutdown = ShutdownController::new();
        let full = full_parser(6, &shutdown);
        let err = full.parse_blocks(GENESIS_HEIGHT, 8).await.unwrap_err();
        assert!(matches!(err, NodeError::ChainSource(_)));
        assert_eq!(full.parser().ledger().chain_head_height().unwrap(), 6);
    }

    #[tokio::test]
    async fn resync_without_snapshots_restarts_at_genesis() {
        let shutdown = ShutdownController::new();
        let full = full_parser(7, &shutdown);
        full.parse_to_head().await.unwrap();
        assert_eq!(full.resync().await.unwrap(), GENESIS_HEIGHT);
        assert_eq!(full.parser().ledger().chain_head_height().unwrap(), 0);
    }

    #[tokio::test]
    async fn stopped_worker_rejects_jobs() {
        let shutdown = ShutdownController::new();
        let full = full_parser(6, &shutdown);
        shutdown.shutdown();
        // the worker drains its receiver once the signal lands
        let mut result = full.chain_head_height().await;
        for _ in 0..50 {
            if result.is_err() {
                break;
            }
            tokio::task::yield_now().await;
            result = full.chain_head_height().await;
        }
        assert!(matches!(
            result,
            Err(NodeError::WorkerStopped) | Err(NodeError::JobAborted)
        ));
    }

    #[tokio::test]
    async fn lite_node_reparses_served_blocks() {
        let shutdown = ShutdownController::new();
        let full = full_parser(8, &shutdown);
        full.parse_to_head().await.unwrap();
        let served = full.parser().ledger().blocks_from(GENESIS_HEIGHT).unwrap();
        let full_state = full.parser().ledger().clone_state().unwrap();

        let lite_parser = Arc::new(BlockParser::new(Arc::new(LedgerStore::new(params()))));
        let lite = LiteNodeParser::spawn(lite_parser, shutdown.subscribe());
        let summary = lite.parse_blocks(served).await.unwrap();
        assert_eq!(summary.blocks, 4);
        assert_eq!(lite.chain_head_height().await.unwrap(), 8);
        assert_eq!(lite.parser().ledger().clone_state().unwrap(), full_state);
        lite.shutdown().await;
    }
}
