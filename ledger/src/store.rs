//! The shared, lock-guarded ledger.
//!
//! `LedgerStore` owns the live `ChainState` behind an `RwLock`. The parser
//! classifies a block under a read guard and then commits the buffered
//! result under a short write guard; readers are never blocked by
//! classification. Snapshot persistence happens after the write guard is
//! released.

use std::sync::{Arc, Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::{debug, error, info, trace, warn};

use bsq_store::SnapshotStore;
use bsq_types::{Amount, ConsensusParams, TxId, TxOutputKey, TxType};

use crate::delta::BlockDelta;
use crate::funding::FeeKind;
use crate::model::{Block, BlockHeader, SpentInfo, Tx, TxOutput};
use crate::snapshot::{SnapshotManager, SnapshotOutcome};
use crate::state::{AppendOutcome, ChainState};
use crate::view::LedgerView;
use crate::LedgerError;

/// Result of `LedgerStore::append_block`.
///
/// The block is committed whenever a report is returned. A snapshot that
/// could not be captured or persisted is carried in `snapshot_error`; the
/// previous candidate stays held for a later flush.
#[derive(Debug)]
pub struct AppendReport {
    pub outcome: AppendOutcome,
    pub snapshot: SnapshotOutcome,
    pub snapshot_error: Option<LedgerError>,
}

pub struct LedgerStore {
    params: ConsensusParams,
    state: RwLock<ChainState>,
    snapshots: Mutex<SnapshotManager>,
}

impl LedgerStore {
    pub fn new(params: ConsensusParams) -> Self {
        let manager = SnapshotManager::new(params.genesis.block_height, params.snapshot_grid);
        Self::with_snapshot_manager(params, manager)
    }

    pub fn with_snapshot_manager(params: ConsensusParams, manager: SnapshotManager) -> Self {
        let state = ChainState::new(&params);
        Self {
            params,
            state: RwLock::new(state),
            snapshots: Mutex::new(manager),
        }
    }

    /// A store persisting snapshots to `store`, starting from the latest
    /// snapshot found there.
    pub fn open(
        params: ConsensusParams,
        store: Arc<dyn SnapshotStore>,
    ) -> Result<Self, LedgerError> {
        let manager = SnapshotManager::new(params.genesis.block_height, params.snapshot_grid)
            .with_store(store);
        let ledger = Self::with_snapshot_manager(params, manager);
        ledger.resync()?;
        Ok(ledger)
    }

    pub fn params(&self) -> &ConsensusParams {
        &self.params
    }

    fn read_guard(&self) -> Result<RwLockReadGuard<'_, ChainState>, LedgerError> {
        self.state.read().map_err(|_| LedgerError::LockPoisoned)
    }

    fn write_guard(&self) -> Result<RwLockWriteGuard<'_, ChainState>, LedgerError> {
        self.state.write().map_err(|_| LedgerError::LockPoisoned)
    }

    /// Run `f` against the state under a shared read section.
    pub fn read<R>(&self, f: impl FnOnce(&ChainState) -> R) -> Result<R, LedgerError> {
        let guard = self.read_guard()?;
        Ok(f(&guard))
    }

    /// A value copy of the current state.
    pub fn clone_state(&self) -> Result<ChainState, LedgerError> {
        self.read(ChainState::clone)
    }

    // ── Writes ──────────────────────────────────────────────────────────

    /// Commit a classified block and evaluate the snapshot rule.
    ///
    /// The only way the chain head advances. A block that does not connect
    /// fails with `LedgerError::NonConnectingBlock` and leaves the state as
    /// it was.
    pub fn append_block(
        &self,
        header: BlockHeader,
        delta: BlockDelta,
    ) -> Result<AppendReport, LedgerError> {
        let outcome = {
            let mut state = self.write_guard()?;
            match state.apply_block(header, delta) {
                Ok(outcome) => outcome,
                Err(e @ LedgerError::NonConnectingBlock { .. }) => {
                    warn!(
                        height = header.height,
                        prev_hash = %header.prev_hash,
                        head = state.chain_head_height(),
                        "block does not connect to chain head"
                    );
                    return Err(e);
                }
                Err(e) => return Err(e),
            }
        };

        let (snapshot, snapshot_error) = match outcome {
            AppendOutcome::Appended { height, .. } => match self.capture_snapshot(height) {
                Ok(snapshot) => (snapshot, None),
                Err(e) => {
                    error!(height, error = %e, "snapshot failed after block commit");
                    (SnapshotOutcome::default(), Some(e))
                }
            },
            AppendOutcome::Duplicate { height } => {
                trace!(height, "block already in chain");
                (SnapshotOutcome::default(), None)
            }
        };

        Ok(AppendReport {
            outcome,
            snapshot,
            snapshot_error,
        })
    }

    /// Capture a candidate at `height` if it is a grid height. The copy is
    /// taken under a read guard; the parser is the only writer.
    fn capture_snapshot(&self, height: u32) -> Result<SnapshotOutcome, LedgerError> {
        let due = {
            let manager = self.manager()?;
            manager.is_snapshot_height(height) && manager.candidate_height() != Some(height)
        };
        if !due {
            return Ok(SnapshotOutcome::default());
        }
        let copy = self.read_guard()?.clone();
        self.manager()?.capture(copy)
    }

    pub fn mark_output_verified(&self, key: &TxOutputKey) -> Result<(), LedgerError> {
        self.write_guard()?.mark_output_verified(key)
    }

    pub fn mark_output_spent(
        &self,
        key: &TxOutputKey,
        info: SpentInfo,
    ) -> Result<TxOutput, LedgerError> {
        self.write_guard()?.mark_output_spent(key, info)
    }

    pub fn record_fee_schedule_entry(
        &self,
        kind: FeeKind,
        height: u32,
        fee: Amount,
    ) -> Result<(), LedgerError> {
        self.write_guard()?
            .record_fee_schedule_entry(kind, height, fee)?;
        info!(kind = kind.as_str(), height, %fee, "recorded fee schedule entry");
        Ok(())
    }

    pub fn set_genesis_tx(&self, tx: Tx) -> Result<(), LedgerError> {
        self.write_guard()?.set_genesis_tx(tx)
    }

    /// Replace the live state with the latest persisted snapshot, or with an
    /// empty state if none exists. Returns the height parsing resumes from.
    pub fn resync(&self) -> Result<u32, LedgerError> {
        let restored = {
            let mut manager = self.manager()?;
            let restored = manager.restore_latest()?;
            manager.discard_candidate();
            restored
        };
        let fresh = restored.is_none();
        let state = restored.unwrap_or_else(|| ChainState::new(&self.params));
        let resume = next_height(&state);
        *self.write_guard()? = state;

        if fresh {
            debug!(resume, "no persisted snapshot, starting from genesis");
        } else {
            info!(resume, "resynchronised from snapshot");
        }
        Ok(resume)
    }

    /// Persist the current snapshot candidate now.
    pub fn flush_snapshot(&self) -> Result<Option<u32>, LedgerError> {
        self.manager()?.flush()
    }

    fn manager(&self) -> Result<std::sync::MutexGuard<'_, SnapshotManager>, LedgerError> {
        self.snapshots.lock().map_err(|_| LedgerError::LockPoisoned)
    }

    // ── Reads ───────────────────────────────────────────────────────────

    pub fn is_output_spendable(&self, key: &TxOutputKey) -> Result<bool, LedgerError> {
        self.read(|s| s.is_output_spendable(key))
    }

    pub fn get_tx(&self, tx_id: &TxId) -> Result<Option<Tx>, LedgerError> {
        self.read(|s| s.find_tx(tx_id).cloned())
    }

    pub fn tx_type(&self, tx_id: &TxId) -> Result<Option<TxType>, LedgerError> {
        self.read(|s| s.tx_type(tx_id))
    }

    pub fn has_burnt_fee(&self, tx_id: &TxId) -> Result<bool, LedgerError> {
        self.read(|s| s.has_burnt_fee(tx_id))
    }

    pub fn chain_head_height(&self) -> Result<u32, LedgerError> {
        self.read(ChainState::chain_head_height)
    }

    /// Height of the next block to parse.
    pub fn next_block_height(&self) -> Result<u32, LedgerError> {
        self.read(next_height)
    }

    pub fn effective_fee(&self, kind: FeeKind, height: u32) -> Result<Option<Amount>, LedgerError> {
        self.read(|s| s.effective_fee(kind, height))
    }

    pub fn contains_tx(&self, tx_id: &TxId) -> Result<bool, LedgerError> {
        self.read(|s| s.contains_tx(tx_id))
    }

    pub fn unspent_count(&self) -> Result<usize, LedgerError> {
        self.read(ChainState::unspent_count)
    }

    pub fn total_burnt_fee(&self) -> Result<Amount, LedgerError> {
        self.read(ChainState::total_burnt_fee)
    }

    pub fn blocks_from(&self, height: u32) -> Result<Vec<Block>, LedgerError> {
        self.read(|s| s.blocks_from(height))
    }
}

fn next_height(state: &ChainState) -> u32 {
    match state.chain_head() {
        Some(head) => head.height.saturating_add(1),
        None => state.genesis_block_height(),
    }
}
