//! Abstract storage traits for the BSQ indexer.
//!
//! Every durable backend (LMDB, in-memory for testing) implements these
//! traits. The ledger only ever hands opaque, already-serialized snapshot
//! envelopes to the store; the store never interprets them.

pub mod error;
pub mod snapshot;

pub use error::StoreError;
pub use snapshot::SnapshotStore;
