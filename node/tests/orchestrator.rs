//! Full-node and lite-node orchestration against a nullable chain source.

use std::sync::Arc;

use bsq_ledger::LedgerStore;
use bsq_node::{
    BlockParser, ChainSourceError, FullNodeParser, LiteNodeParser, NodeError, ShutdownController,
};
use bsq_nullables::{block_hash, tx_id, ChainBuilder, NullChainSource, NullSnapshotStore, TxBuilder};
use bsq_types::{Amount, BlockHash, ConsensusParams, GenesisPin, NetworkId};

const H0: u32 = 40;

fn params() -> ConsensusParams {
    let mut params = ConsensusParams::with_genesis(
        NetworkId::Regtest,
        GenesisPin {
            tx_id: tx_id(0xaa),
            block_height: H0,
        },
    );
    params.snapshot_grid = 10;
    params
}

/// Genesis at 40, one spend at 41, empty blocks up to `tip`.
fn chain(tip: u32) -> ChainBuilder {
    ChainBuilder::starting_at(H0)
        .block(vec![TxBuilder::with_id_byte(0xaa).output(1_000).output(500).build()])
        .block(vec![TxBuilder::with_id_byte(1)
            .input(tx_id(0xaa), 0)
            .output(990)
            .build()])
        .empty_blocks(tip - H0 - 1)
}

fn full(source: Arc<NullChainSource>, shutdown: &ShutdownController) -> FullNodeParser {
    let ledger = Arc::new(LedgerStore::open(params(), Arc::new(NullSnapshotStore::new())).unwrap());
    FullNodeParser::spawn(Arc::new(BlockParser::new(ledger)), source, shutdown.subscribe())
}

#[tokio::test]
async fn follows_a_growing_chain() {
    let shutdown = ShutdownController::new();
    let source = Arc::new(NullChainSource::from_dump(chain(50).build()));
    let node = full(Arc::clone(&source), &shutdown);

    let first = node.parse_to_head().await.unwrap();
    assert_eq!((first.first_height, first.last_height), (Some(H0), Some(50)));
    assert_eq!(first.blocks, 11);

    // three more blocks arrive
    source.extend(chain(53).build());
    let second = node.parse_to_head().await.unwrap();
    assert_eq!((second.first_height, second.last_height), (Some(51), Some(53)));

    let ledger = Arc::clone(node.parser().ledger());
    assert_eq!(ledger.chain_head_height().unwrap(), 53);
    assert_eq!(ledger.total_burnt_fee().unwrap(), Amount::new(10));
    node.shutdown().await;
}

#[tokio::test]
async fn transport_failure_aborts_job_and_parsing_resumes_after_heal() {
    let shutdown = ShutdownController::new();
    let source = Arc::new(NullChainSource::from_dump(chain(48).build()));
    let node = full(Arc::clone(&source), &shutdown);

    source.fail_at(45);
    let err = node.parse_to_head().await.unwrap_err();
    assert!(matches!(
        err,
        NodeError::ChainSource(ChainSourceError::Transport(_))
    ));
    assert_eq!(node.parser().ledger().chain_head_height().unwrap(), 44);

    source.heal(45);
    let resumed = node.parse_to_head().await.unwrap();
    assert_eq!(resumed.first_height, Some(45));
    assert_eq!(node.parser().ledger().chain_head_height().unwrap(), 48);
}

#[tokio::test]
async fn fork_is_reported_and_resync_rolls_back() {
    let shutdown = ShutdownController::new();
    let source = Arc::new(NullChainSource::from_dump(chain(62).build()));
    let node = full(Arc::clone(&source), &shutdown);
    node.parse_to_head().await.unwrap();
    // grid 10 from 40: the first candidate is 60
    node.parser().ledger().flush_snapshot().unwrap();

    let mut fork = ChainBuilder::starting_at(63).empty_blocks(1).build();
    fork.blocks[0].prev_hash = BlockHash::new([0xf0; 32]);
    source.extend(fork);

    let err = node.parse_to_head().await.unwrap_err();
    assert!(err.is_non_connecting());
    assert_eq!(node.parser().ledger().chain_head_height().unwrap(), 62);

    assert_eq!(node.resync().await.unwrap(), 61);
    assert_eq!(node.parser().ledger().chain_head_height().unwrap(), 60);
    assert_eq!(
        node.parser().ledger().read(|s| s.chain_head().map(|b| b.hash)).unwrap(),
        Some(block_hash(60))
    );
}

#[tokio::test]
async fn lite_node_mirrors_full_node() {
    let shutdown = ShutdownController::new();
    let source = Arc::new(NullChainSource::from_dump(chain(45).build()));
    let node = full(source, &shutdown);
    node.parse_to_head().await.unwrap();
    let served = node.parser().ledger().blocks_from(H0).unwrap();

    let lite_ledger = Arc::new(LedgerStore::new(params()));
    let lite = LiteNodeParser::spawn(Arc::new(BlockParser::new(lite_ledger)), shutdown.subscribe());
    let summary = lite.parse_blocks(served).await.unwrap();
    assert_eq!(summary.blocks, 6);
    assert_eq!(
        lite.parser().ledger().clone_state().unwrap(),
        node.parser().ledger().clone_state().unwrap()
    );
    assert_eq!(lite.resync().await.unwrap(), H0);

    shutdown.shutdown();
    node.shutdown().await;
    lite.shutdown().await;
}
