//! Snapshot persistence and resynchronisation through real and nullable
//! snapshot stores.

use std::sync::{Arc, Mutex};

use bsq_ledger::{ChainStateSnapshot, LedgerStore};
use bsq_node::{BlockInput, BlockParser, EventBus, ParseEvent};
use bsq_nullables::{tx_id, ChainBuilder, NullSnapshotStore, TxBuilder};
use bsq_store::SnapshotStore;
use bsq_store_lmdb::LmdbEnvironment;
use bsq_types::{ConsensusParams, GenesisPin, NetworkId};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

const H0: u32 = 10;
const GRID: u32 = 5;

/// Grid 5 from genesis 10: snapshots at 20, 25, 30, ...
fn params() -> ConsensusParams {
    let mut params = ConsensusParams::with_genesis(
        NetworkId::Regtest,
        GenesisPin {
            tx_id: tx_id(0xaa),
            block_height: H0,
        },
    );
    params.snapshot_grid = GRID;
    params
}

/// Genesis at 10, a spend every third block, tip at 31.
fn chain() -> Vec<BlockInput> {
    let mut builder =
        ChainBuilder::starting_at(H0).block(vec![TxBuilder::with_id_byte(0xaa).output(10_000).build()]);
    let mut prev = 0xaa;
    for height in H0 + 1..=31 {
        if height % 3 == 0 {
            let id = height as u8;
            builder = builder.block(vec![TxBuilder::with_id_byte(id)
                .input(tx_id(prev), 0)
                .output(10_000 - u64::from(height))
                .build()]);
            prev = id;
        } else {
            builder = builder.empty_blocks(1);
        }
    }
    builder.build_inputs()
}

fn up_to(blocks: &[BlockInput], height: u32) -> Vec<BlockInput> {
    blocks
        .iter()
        .filter(|b| b.header.height <= height)
        .cloned()
        .collect()
}

fn from(blocks: &[BlockInput], height: u32) -> Vec<BlockInput> {
    blocks
        .iter()
        .filter(|b| b.header.height >= height)
        .cloned()
        .collect()
}

fn reference_state() -> bsq_ledger::ChainState {
    let parser = BlockParser::new(Arc::new(LedgerStore::new(params())));
    parser.parse_blocks(chain()).unwrap();
    parser.ledger().clone_state().unwrap()
}

// ---------------------------------------------------------------------------
// LMDB
// ---------------------------------------------------------------------------

#[test]
fn restart_resumes_from_latest_persisted_snapshot() {
    let dir = tempfile::tempdir().expect("temp dir");
    let blocks = chain();

    {
        let env = LmdbEnvironment::open(dir.path(), 4, 64 * 1024 * 1024).expect("open env");
        let store: Arc<dyn SnapshotStore> = Arc::new(env.snapshot_store());
        let ledger = Arc::new(LedgerStore::open(params(), store).unwrap());
        assert_eq!(ledger.next_block_height().unwrap(), H0);

        let summary = BlockParser::new(ledger)
            .parse_blocks(up_to(&blocks, 27))
            .unwrap();
        // candidate 20 was persisted when 25 was captured
        assert_eq!(summary.snapshots_persisted, 1);
    }

    let env = LmdbEnvironment::open(dir.path(), 4, 64 * 1024 * 1024).expect("reopen env");
    let store = env.snapshot_store();
    assert_eq!(store.snapshot_heights().unwrap(), vec![20]);

    let ledger = Arc::new(LedgerStore::open(params(), Arc::new(store)).unwrap());
    assert_eq!(ledger.chain_head_height().unwrap(), 20);
    let resume = ledger.next_block_height().unwrap();
    assert_eq!(resume, 21);

    let parser = BlockParser::new(ledger);
    parser.parse_blocks(from(&blocks, resume)).unwrap();
    assert_eq!(parser.ledger().clone_state().unwrap(), reference_state());
}

#[test]
fn persisted_bytes_restore_the_captured_state() {
    let dir = tempfile::tempdir().expect("temp dir");
    let env = LmdbEnvironment::open(dir.path(), 4, 64 * 1024 * 1024).expect("open env");
    let store = Arc::new(env.snapshot_store());
    let ledger = Arc::new(LedgerStore::open(params(), store.clone()).unwrap());
    let parser = BlockParser::new(Arc::clone(&ledger));

    parser.parse_blocks(up_to(&chain(), 20)).unwrap();
    let at_twenty = ledger.clone_state().unwrap();
    assert_eq!(ledger.flush_snapshot().unwrap(), Some(20));

    let bytes = store.get_snapshot(20).unwrap().expect("snapshot at 20");
    let restored = ChainStateSnapshot::from_bytes(&bytes).unwrap();
    assert_eq!(restored.height, 20);
    assert_eq!(restored.into_state(), at_twenty);
}

// ---------------------------------------------------------------------------
// Nullable store
// ---------------------------------------------------------------------------

#[test]
fn snapshot_events_follow_the_grid() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let mut events = EventBus::new();
    events.subscribe(move |e| {
        if !matches!(e, ParseEvent::BlockParsed { .. }) {
            sink.lock().unwrap().push(e.clone());
        }
    });

    let store = Arc::new(NullSnapshotStore::new());
    let ledger = Arc::new(LedgerStore::open(params(), store.clone()).unwrap());
    BlockParser::new(ledger)
        .with_events(events)
        .parse_blocks(chain())
        .unwrap();

    let seen = seen.lock().unwrap();
    assert_eq!(
        *seen,
        vec![
            ParseEvent::SnapshotCaptured { height: 20 },
            ParseEvent::SnapshotCaptured { height: 25 },
            ParseEvent::SnapshotPersisted { height: 20 },
            ParseEvent::SnapshotCaptured { height: 30 },
            ParseEvent::SnapshotPersisted { height: 25 },
        ]
    );
    assert_eq!(store.snapshot_heights().unwrap(), vec![20, 25]);
}

#[test]
fn resync_rolls_back_to_snapshot() {
    let store = Arc::new(NullSnapshotStore::new());
    let ledger = Arc::new(LedgerStore::open(params(), store).unwrap());
    let parser = BlockParser::new(Arc::clone(&ledger));
    parser.parse_blocks(chain()).unwrap();
    assert_eq!(ledger.chain_head_height().unwrap(), 31);

    assert_eq!(ledger.resync().unwrap(), 26);
    assert_eq!(ledger.chain_head_height().unwrap(), 25);

    parser.parse_blocks(from(&chain(), 26)).unwrap();
    assert_eq!(ledger.clone_state().unwrap(), reference_state());
}

#[test]
fn corrupted_snapshot_fails_resync() {
    let store = Arc::new(NullSnapshotStore::new());
    let ledger = Arc::new(LedgerStore::open(params(), store.clone()).unwrap());
    BlockParser::new(Arc::clone(&ledger))
        .parse_blocks(up_to(&chain(), 25))
        .unwrap();

    store.corrupt(20).unwrap();
    assert!(ledger.resync().is_err());
}

#[test]
fn failed_snapshot_write_still_announces_the_block() {
    let parsed = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&parsed);
    let mut events = EventBus::new();
    events.subscribe(move |e| {
        if let ParseEvent::BlockParsed { height, .. } = e {
            sink.lock().unwrap().push(*height);
        }
    });

    let store = Arc::new(NullSnapshotStore::new());
    let ledger = Arc::new(LedgerStore::open(params(), store.clone()).unwrap());
    let parser = BlockParser::new(Arc::clone(&ledger)).with_events(events);
    let blocks = chain();

    parser.parse_blocks(up_to(&blocks, 24)).unwrap();
    store.fail_writes(true);
    let err = parser
        .parse_blocks(from(&blocks, 25).into_iter().take(1))
        .unwrap_err();
    assert!(matches!(err, bsq_node::NodeError::Ledger(_)));
    // committed and announced; only persistence failed
    assert_eq!(ledger.chain_head_height().unwrap(), 25);
    assert_eq!(parsed.lock().unwrap().last(), Some(&25));
    assert!(store.is_empty());

    // the candidate at 20 survived and is written once the store recovers
    store.fail_writes(false);
    assert_eq!(ledger.flush_snapshot().unwrap(), Some(20));
    assert_eq!(store.snapshot_heights().unwrap(), vec![20]);
}
