//! Durable snapshot storage.

use crate::StoreError;

/// Persists serialized ledger snapshots keyed by chain-head height.
///
/// Implementations must make a `put_snapshot` either fully visible or not
/// visible at all; a torn write must never be returned by `latest_snapshot`.
pub trait SnapshotStore: Send + Sync {
    /// Store the snapshot bytes captured at `height`, replacing any previous
    /// snapshot at the same height.
    fn put_snapshot(&self, height: u32, bytes: &[u8]) -> Result<(), StoreError>;

    /// Fetch the snapshot captured at exactly `height`.
    fn get_snapshot(&self, height: u32) -> Result<Option<Vec<u8>>, StoreError>;

    /// The snapshot with the greatest height, if any.
    fn latest_snapshot(&self) -> Result<Option<(u32, Vec<u8>)>, StoreError>;

    /// Remove the snapshot at `height`. Missing heights are not an error.
    fn delete_snapshot(&self, height: u32) -> Result<(), StoreError>;

    /// All stored heights in ascending order.
    fn snapshot_heights(&self) -> Result<Vec<u32>, StoreError>;

    /// Keep only the newest `keep` snapshots.
    fn prune_snapshots(&self, keep: usize) -> Result<usize, StoreError> {
        let heights = self.snapshot_heights()?;
        let excess = heights.len().saturating_sub(keep);
        for height in heights.iter().take(excess) {
            self.delete_snapshot(*height)?;
        }
        Ok(excess)
    }
}
