//! LMDB storage backend for the BSQ indexer.
//!
//! Implements the storage traits from `bsq-store` using the `heed` LMDB bindings.
//! Each logical store maps to one LMDB database within a single environment.

pub mod environment;
pub mod error;
pub mod snapshot;

pub use environment::LmdbEnvironment;
pub use error::LmdbError;
pub use snapshot::LmdbSnapshotStore;
