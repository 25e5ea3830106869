//! LMDB environment setup.

use std::path::Path;
use std::sync::Arc;

use heed::types::Bytes;
use heed::{Database, Env, EnvOpenOptions};

use crate::snapshot::LmdbSnapshotStore;
use crate::LmdbError;

/// Name of the database holding serialized snapshots keyed by height.
pub(crate) const SNAPSHOTS_DB: &str = "snapshots";
/// Name of the database holding environment metadata (schema version).
pub(crate) const META_DB: &str = "meta";

const SCHEMA_VERSION_KEY: &[u8] = b"schema_version";
pub const SCHEMA_VERSION: u32 = 1;

/// Wraps the LMDB environment and all database handles.
pub struct LmdbEnvironment {
    env: Arc<Env>,
    pub(crate) snapshots_db: Database<Bytes, Bytes>,
    pub(crate) meta_db: Database<Bytes, Bytes>,
}

impl LmdbEnvironment {
    /// Open or create an LMDB environment at the given path.
    pub fn open(path: &Path, max_dbs: u32, map_size: usize) -> Result<Self, LmdbError> {
        std::fs::create_dir_all(path)?;
        // SAFETY: the environment is opened once per directory per process;
        // callers own the directory exclusively.
        let env = unsafe {
            EnvOpenOptions::new()
                .map_size(map_size)
                .max_dbs(max_dbs)
                .open(path)?
        };

        let mut wtxn = env.write_txn()?;
        let snapshots_db: Database<Bytes, Bytes> =
            env.create_database(&mut wtxn, Some(SNAPSHOTS_DB))?;
        let meta_db: Database<Bytes, Bytes> = env.create_database(&mut wtxn, Some(META_DB))?;

        match meta_db.get(&wtxn, SCHEMA_VERSION_KEY)? {
            Some(bytes) if bytes != SCHEMA_VERSION.to_be_bytes() => {
                return Err(LmdbError::Serialization(format!(
                    "unsupported schema version bytes {:?}",
                    bytes
                )));
            }
            Some(_) => {}
            None => {
                meta_db.put(&mut wtxn, SCHEMA_VERSION_KEY, &SCHEMA_VERSION.to_be_bytes())?;
            }
        }
        wtxn.commit()?;

        tracing::debug!(path = %path.display(), "opened LMDB environment");

        Ok(Self {
            env: Arc::new(env),
            snapshots_db,
            meta_db,
        })
    }

    pub fn env(&self) -> &Arc<Env> {
        &self.env
    }

    /// A snapshot store sharing this environment.
    pub fn snapshot_store(&self) -> LmdbSnapshotStore {
        LmdbSnapshotStore {
            env: Arc::clone(&self.env),
            snapshots_db: self.snapshots_db,
        }
    }

    /// The schema version recorded in the meta database.
    pub fn schema_version(&self) -> Result<Option<u32>, LmdbError> {
        let rtxn = self.env.read_txn()?;
        match self.meta_db.get(&rtxn, SCHEMA_VERSION_KEY)? {
            Some(bytes) if bytes.len() == 4 => {
                let mut buf = [0u8; 4];
                buf.copy_from_slice(bytes);
                Ok(Some(u32::from_be_bytes(buf)))
            }
            Some(_) => Err(LmdbError::Serialization(
                "invalid schema version length".into(),
            )),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_records_schema_version() {
        let dir = tempfile::tempdir().unwrap();
        let env = LmdbEnvironment::open(dir.path(), 4, 1 << 20).unwrap();
        assert_eq!(env.schema_version().unwrap(), Some(SCHEMA_VERSION));
    }

    #[test]
    fn reopen_keeps_schema_version() {
        let dir = tempfile::tempdir().unwrap();
        {
            let _env = LmdbEnvironment::open(dir.path(), 4, 1 << 20).unwrap();
        }
        let env = LmdbEnvironment::open(dir.path(), 4, 1 << 20).unwrap();
        assert_eq!(env.schema_version().unwrap(), Some(SCHEMA_VERSION));
    }
}
