//! Nullable infrastructure for deterministic testing.
//!
//! The parser's external dependencies (the raw chain and snapshot storage)
//! sit behind traits. This crate provides test-friendly implementations
//! that:
//! - Return deterministic values
//! - Can be controlled programmatically, including injected failures
//! - Never touch the filesystem or network
//!
//! Usage: swap real implementations for nullables in tests.

pub mod builder;
pub mod chain_source;
pub mod snapshot_store;

pub use builder::{block_hash, block_input, tx_id, ChainBuilder, TxBuilder};
pub use chain_source::NullChainSource;
pub use snapshot_store::NullSnapshotStore;
