//! Nullable snapshot store: thread-safe in-memory storage for testing.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

use bsq_store::{SnapshotStore, StoreError};

/// An in-memory [`SnapshotStore`].
#[derive(Default)]
pub struct NullSnapshotStore {
    snapshots: Mutex<BTreeMap<u32, Vec<u8>>>,
    fail_writes: AtomicBool,
}

impl NullSnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every following `put_snapshot` fail.
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::Relaxed);
    }

    pub fn len(&self) -> usize {
        self.snapshots.lock().map_or(0, |s| s.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Flip one byte of the snapshot at `height`.
    pub fn corrupt(&self, height: u32) -> Result<(), StoreError> {
        let mut snapshots = self.guard()?;
        let bytes = snapshots
            .get_mut(&height)
            .ok_or_else(|| StoreError::NotFound(format!("snapshot {height}")))?;
        if let Some(last) = bytes.last_mut() {
            *last ^= 0xff;
        }
        Ok(())
    }

    fn guard(&self) -> Result<MutexGuard<'_, BTreeMap<u32, Vec<u8>>>, StoreError> {
        self.snapshots
            .lock()
            .map_err(|_| StoreError::Backend("snapshot map poisoned".into()))
    }
}

impl SnapshotStore for NullSnapshotStore {
    fn put_snapshot(&self, height: u32, bytes: &[u8]) -> Result<(), StoreError> {
        if self.fail_writes.load(Ordering::Relaxed) {
            return Err(StoreError::Backend("injected write failure".into()));
        }
        self.guard()?.insert(height, bytes.to_vec());
        Ok(())
    }

    fn get_snapshot(&self, height: u32) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(self.guard()?.get(&height).cloned())
    }

    fn latest_snapshot(&self) -> Result<Option<(u32, Vec<u8>)>, StoreError> {
        Ok(self
            .guard()?
            .iter()
            .next_back()
            .map(|(h, b)| (*h, b.clone())))
    }

    fn delete_snapshot(&self, height: u32) -> Result<(), StoreError> {
        self.guard()?.remove(&height);
        Ok(())
    }

    fn snapshot_heights(&self) -> Result<Vec<u32>, StoreError> {
        Ok(self.guard()?.keys().copied().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn latest_is_highest_height() {
        let store = NullSnapshotStore::new();
        store.put_snapshot(200, b"b").unwrap();
        store.put_snapshot(100, b"a").unwrap();
        assert_eq!(store.latest_snapshot().unwrap(), Some((200, b"b".to_vec())));
        assert_eq!(store.prune_snapshots(1).unwrap(), 1);
        assert_eq!(store.snapshot_heights().unwrap(), vec![200]);
    }

    #[test]
    fn injected_write_failure() {
        let store = NullSnapshotStore::new();
        store.fail_writes(true);
        assert!(store.put_snapshot(1, b"x").is_err());
        assert!(store.is_empty());
    }

    #[test]
    fn corrupting_a_missing_height_is_not_found() {
        let store = NullSnapshotStore::new();
        store.put_snapshot(5, &[1, 2, 3]).unwrap();
        store.corrupt(5).unwrap();
        assert_eq!(store.get_snapshot(5).unwrap(), Some(vec![1, 2, 0xfc]));
        assert!(store.corrupt(6).unwrap_err().is_not_found());
    }
}
