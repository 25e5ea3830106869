//! Chain state snapshots.
//!
//! A snapshot is a value copy of the `ChainState` taken at a grid height,
//! wrapped in a versioned envelope whose Blake2b hash covers the encoded
//! state. The manager holds one in-memory candidate and persists the previous
//! candidate only when a new grid height is reached, so the persisted
//! snapshot always lags the tip by at least one grid interval.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use bsq_store::SnapshotStore;

use crate::state::ChainState;
use crate::LedgerError;

pub const SNAPSHOT_VERSION: u32 = 1;

/// The height of the latest snapshot that may be taken when the chain is at
/// `height`. Keeps at least one grid interval between snapshot and tip, and
/// never goes below `genesis + 2 * grid`.
pub fn snapshot_height(genesis_height: u32, height: u32, grid: u32) -> u32 {
    if grid == 0 {
        return height;
    }
    let lead_in = genesis_height.saturating_add(grid.saturating_mul(3));
    (lead_in.max(height) / grid)
        .saturating_mul(grid)
        .saturating_sub(grid)
}

pub fn is_snapshot_height(genesis_height: u32, height: u32, grid: u32) -> bool {
    grid != 0
        && height % grid == 0
        && height >= snapshot_height(genesis_height, height, grid)
}

/// Serialized envelope around a `ChainState`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainStateSnapshot {
    pub version: u32,
    /// Chain head height of the captured state.
    pub height: u32,
    /// Blake2b-256 of the bincode-encoded state and height.
    pub hash: [u8; 32],
    pub state: ChainState,
}

impl ChainStateSnapshot {
    pub fn create(state: ChainState) -> Result<Self, LedgerError> {
        let height = state.chain_head_height();
        let hash = compute_hash(&state, height)?;
        Ok(Self {
            version: SNAPSHOT_VERSION,
            height,
            hash,
            state,
        })
    }

    pub fn verify(&self) -> Result<bool, LedgerError> {
        Ok(self.hash == compute_hash(&self.state, self.height)?)
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, LedgerError> {
        bincode::serialize(self).map_err(|e| LedgerError::Serialization(e.to_string()))
    }

    /// Decode and verify an envelope.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, LedgerError> {
        let snapshot: Self =
            bincode::deserialize(bytes).map_err(|e| LedgerError::Serialization(e.to_string()))?;
        if snapshot.version != SNAPSHOT_VERSION {
            return Err(LedgerError::SnapshotVersion(snapshot.version));
        }
        if !snapshot.verify()? {
            return Err(LedgerError::SnapshotHashMismatch {
                height: snapshot.height,
            });
        }
        Ok(snapshot)
    }

    pub fn into_state(self) -> ChainState {
        self.state
    }
}

fn compute_hash(state: &ChainState, height: u32) -> Result<[u8; 32], LedgerError> {
    use blake2::digest::consts::U32;
    use blake2::{Blake2b, Digest};

    let encoded = bincode::serialize(state).map_err(|e| LedgerError::Serialization(e.to_string()))?;
    let mut hasher = Blake2b::<U32>::new();
    hasher.update(&encoded);
    hasher.update(height.to_le_bytes());
    let result = hasher.finalize();
    let mut out = [0u8; 32];
    out.copy_from_slice(&result);
    Ok(out)
}

/// What a capture did.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SnapshotOutcome {
    pub captured: Option<u32>,
    pub persisted: Option<u32>,
}

pub struct SnapshotManager {
    grid: u32,
    genesis_height: u32,
    enabled: bool,
    candidate: Option<ChainStateSnapshot>,
    store: Option<Arc<dyn SnapshotStore>>,
}

impl SnapshotManager {
    pub fn new(genesis_height: u32, grid: u32) -> Self {
        Self {
            grid,
            genesis_height,
            enabled: true,
            candidate: None,
            store: None,
        }
    }

    pub fn with_store(mut self, store: Arc<dyn SnapshotStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn is_snapshot_height(&self, height: u32) -> bool {
        self.enabled && is_snapshot_height(self.genesis_height, height, self.grid)
    }

    pub fn candidate_height(&self) -> Option<u32> {
        self.candidate.as_ref().map(|c| c.height)
    }

    pub fn candidate(&self) -> Option<&ChainStateSnapshot> {
        self.candidate.as_ref()
    }

    /// Replace the candidate with `state`, persisting the previous one.
    ///
    /// A state at the height the candidate already holds is ignored.
    pub fn capture(&mut self, state: ChainState) -> Result<SnapshotOutcome, LedgerError> {
        let height = state.chain_head_height();
        if self.candidate_height() == Some(height) {
            debug!(height, "snapshot candidate already captured");
            return Ok(SnapshotOutcome::default());
        }

        // a failed write keeps the previous candidate for a later flush
        let persisted = match &self.candidate {
            Some(previous) => self.persist(previous)?,
            None => None,
        };
        self.candidate = Some(ChainStateSnapshot::create(state)?);
        debug!(height, "captured snapshot candidate");

        Ok(SnapshotOutcome {
            captured: Some(height),
            persisted,
        })
    }

    /// Persist the held candidate immediately.
    pub fn flush(&mut self) -> Result<Option<u32>, LedgerError> {
        let persisted = match &self.candidate {
            Some(candidate) => self.persist(candidate)?,
            None => return Ok(None),
        };
        self.candidate = None;
        Ok(persisted)
    }

    fn persist(&self, snapshot: &ChainStateSnapshot) -> Result<Option<u32>, LedgerError> {
        let Some(store) = &self.store else {
            return Ok(None);
        };
        let bytes = snapshot.to_bytes()?;
        store.put_snapshot(snapshot.height, &bytes)?;
        info!(
            height = snapshot.height,
            size = bytes.len(),
            "persisted chain state snapshot"
        );
        Ok(Some(snapshot.height))
    }

    /// Load the most recent persisted snapshot.
    pub fn restore_latest(&self) -> Result<Option<ChainState>, LedgerError> {
        let Some(store) = &self.store else {
            return Ok(None);
        };
        match store.latest_snapshot()? {
            Some((height, bytes)) => {
                let snapshot = ChainStateSnapshot::from_bytes(&bytes)?;
                info!(height, "restored chain state snapshot");
                Ok(Some(snapshot.into_state()))
            }
            None => Ok(None),
        }
    }

    /// Drop the in-memory candidate without persisting it.
    pub fn discard_candidate(&mut self) {
        self.candidate = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bsq_types::ConsensusParams;

    #[test]
    fn snapshot_height_matches_grid_rule() {
        // genesis 1441, grid 100: lead-in 1741
        assert_eq!(snapshot_height(1441, 0, 100), 1600);
        assert_eq!(snapshot_height(1441, 1800, 100), 1700);
        assert_eq!(snapshot_height(1441, 2055, 100), 1900);
    }

    #[test]
    fn only_grid_heights_past_lead_in_qualify() {
        assert!(!is_snapshot_height(1441, 1500, 100));
        assert!(is_snapshot_height(1441, 1600, 100));
        assert!(!is_snapshot_height(1441, 1650, 100));
        assert!(is_snapshot_height(1441, 1700, 100));
        assert!(is_snapshot_height(1441, 5000, 100));
        assert!(!is_snapshot_height(1441, 5001, 100));
    }

    #[test]
    fn envelope_roundtrip_and_tamper_detection() {
        let state = ChainState::new(&ConsensusParams::default());
        let snap = ChainStateSnapshot::create(state.clone()).unwrap();
        assert!(snap.verify().unwrap());

        let bytes = snap.to_bytes().unwrap();
        let restored = ChainStateSnapshot::from_bytes(&bytes).unwrap();
        assert_eq!(restored.state, state);

        let mut tampered = snap.clone();
        tampered.height = 9_999;
        let err = ChainStateSnapshot::from_bytes(&tampered.to_bytes().unwrap()).unwrap_err();
        assert!(matches!(err, LedgerError::SnapshotHashMismatch { height: 9_999 }));

        let mut future = snap;
        future.version = 2;
        let err = ChainStateSnapshot::from_bytes(&future.to_bytes().unwrap()).unwrap_err();
        assert!(matches!(err, LedgerError::SnapshotVersion(2)));
    }

    #[test]
    fn garbage_bytes_are_rejected() {
        assert!(matches!(
            ChainStateSnapshot::from_bytes(&[1, 2, 3]),
            Err(LedgerError::Serialization(_))
        ));
    }

    struct FailingStore;

    impl SnapshotStore for FailingStore {
        fn put_snapshot(&self, _height: u32, _bytes: &[u8]) -> Result<(), bsq_store::StoreError> {
            Err(bsq_store::StoreError::Backend("disk full".into()))
        }
        fn get_snapshot(&self, _height: u32) -> Result<Option<Vec<u8>>, bsq_store::StoreError> {
            Ok(None)
        }
        fn latest_snapshot(&self) -> Result<Option<(u32, Vec<u8>)>, bsq_store::StoreError> {
            Ok(None)
        }
        fn delete_snapshot(&self, _height: u32) -> Result<(), bsq_store::StoreError> {
            Ok(())
        }
        fn snapshot_heights(&self) -> Result<Vec<u32>, bsq_store::StoreError> {
            Ok(Vec::new())
        }
    }

    fn state_up_to(tip: u32) -> ChainState {
        let mut state = ChainState::new(&ConsensusParams::default());
        for height in 10..=tip {
            let header = crate::BlockHeader {
                height,
                hash: bsq_types::BlockHash::new([height as u8; 32]),
                prev_hash: bsq_types::BlockHash::new([height as u8 - 1; 32]),
            };
            state
                .apply_block(header, crate::BlockDelta::new(height))
                .unwrap();
        }
        state
    }

    #[test]
    fn failed_persist_keeps_previous_candidate() {
        let mut manager = SnapshotManager::new(0, 5).with_store(Arc::new(FailingStore));
        manager.capture(state_up_to(20)).unwrap();
        assert!(manager.capture(state_up_to(25)).is_err());
        assert_eq!(manager.candidate_height(), Some(20));
        assert!(manager.flush().is_err());
        assert_eq!(manager.candidate_height(), Some(20));
        manager.discard_candidate();
        assert_eq!(manager.flush().unwrap(), None);
    }

    #[test]
    fn disabled_manager_never_reports_snapshot_heights() {
        let manager = SnapshotManager::new(1441, 100).disabled();
        assert!(!manager.is_snapshot_height(1600));
    }
}
