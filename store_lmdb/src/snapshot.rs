//! LMDB implementation of SnapshotStore.

use std::sync::Arc;

use heed::types::Bytes;
use heed::{Database, Env};

use bsq_store::{SnapshotStore, StoreError};

use crate::LmdbError;

/// Heights are stored big-endian so LMDB key order equals numeric order.
fn height_key(height: u32) -> [u8; 4] {
    height.to_be_bytes()
}

fn decode_height(key: &[u8]) -> Result<u32, LmdbError> {
    if key.len() != 4 {
        return Err(LmdbError::Serialization(
            "invalid snapshot key length".into(),
        ));
    }
    let mut buf = [0u8; 4];
    buf.copy_from_slice(key);
    Ok(u32::from_be_bytes(buf))
}

pub struct LmdbSnapshotStore {
    pub(crate) env: Arc<Env>,
    pub(crate) snapshots_db: Database<Bytes, Bytes>,
}

impl SnapshotStore for LmdbSnapshotStore {
    fn put_snapshot(&self, height: u32, bytes: &[u8]) -> Result<(), StoreError> {
        let mut wtxn = self.env.write_txn().map_err(LmdbError::from)?;
        self.snapshots_db
            .put(&mut wtxn, &height_key(height), bytes)
            .map_err(LmdbError::from)?;
        wtxn.commit().map_err(LmdbError::from)?;
        Ok(())
    }

    fn get_snapshot(&self, height: u32) -> Result<Option<Vec<u8>>, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        let value = self
            .snapshots_db
            .get(&rtxn, &height_key(height))
            .map_err(LmdbError::from)?;
        Ok(value.map(|bytes| bytes.to_vec()))
    }

    fn latest_snapshot(&self) -> Result<Option<(u32, Vec<u8>)>, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        match self.snapshots_db.last(&rtxn).map_err(LmdbError::from)? {
            Some((key, value)) => Ok(Some((decode_height(key)?, value.to_vec()))),
            None => Ok(None),
        }
    }

    fn delete_snapshot(&self, height: u32) -> Result<(), StoreError> {
        let mut wtxn = self.env.write_txn().map_err(LmdbError::from)?;
        self.snapshots_db
            .delete(&mut wtxn, &height_key(height))
            .map_err(LmdbError::from)?;
        wtxn.commit().map_err(LmdbError::from)?;
        Ok(())
    }

    fn snapshot_heights(&self) -> Result<Vec<u32>, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        let iter = self.snapshots_db.iter(&rtxn).map_err(LmdbError::from)?;
        let mut heights = Vec::new();
        for entry in iter {
            let (key, _) = entry.map_err(LmdbError::from)?;
            heights.push(decode_height(key)?);
        }
        Ok(heights)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::LmdbEnvironment;

    fn open_test_env() -> (tempfile::TempDir, LmdbEnvironment) {
        let dir = tempfile::tempdir().unwrap();
        let env = LmdbEnvironment::open(dir.path(), 4, 1 << 20).unwrap();
        (dir, env)
    }

    #[test]
    fn empty_store_has_no_latest() {
        let (_dir, env) = open_test_env();
        let store = env.snapshot_store();
        assert!(store.latest_snapshot().unwrap().is_none());
        assert!(store.snapshot_heights().unwrap().is_empty());
    }

    #[test]
    fn latest_is_highest_height() {
        let (_dir, env) = open_test_env();
        let store = env.snapshot_store();
        store.put_snapshot(300, b"three").unwrap();
        store.put_snapshot(1_000, b"ten").unwrap();
        store.put_snapshot(200, b"two").unwrap();

        let (height, bytes) = store.latest_snapshot().unwrap().unwrap();
        assert_eq!(height, 1_000);
        assert_eq!(bytes, b"ten");
        assert_eq!(store.snapshot_heights().unwrap(), vec![200, 300, 1_000]);
    }

    #[test]
    fn put_same_height_replaces() {
        let (_dir, env) = open_test_env();
        let store = env.snapshot_store();
        store.put_snapshot(100, b"old").unwrap();
        store.put_snapshot(100, b"new").unwrap();
        assert_eq!(store.get_snapshot(100).unwrap().unwrap(), b"new");
    }

    #[test]
    fn prune_keeps_newest() {
        let (_dir, env) = open_test_env();
        let store = env.snapshot_store();
        for h in [100, 200, 300, 400] {
            store.put_snapshot(h, &[h as u8]).unwrap();
        }
        let removed = store.prune_snapshots(2).unwrap();
        assert_eq!(removed, 2);
        assert_eq!(store.snapshot_heights().unwrap(), vec![300, 400]);
    }

    #[test]
    fn snapshots_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let env = LmdbEnvironment::open(dir.path(), 4, 1 << 20).unwrap();
            env.snapshot_store().put_snapshot(500, b"persisted").unwrap();
        }
        let env = LmdbEnvironment::open(dir.path(), 4, 1 << 20).unwrap();
        let (height, bytes) = env.snapshot_store().latest_snapshot().unwrap().unwrap();
        assert_eq!(height, 500);
        assert_eq!(bytes, b"persisted");
    }
}
