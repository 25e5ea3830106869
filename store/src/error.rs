use thiserror::Error;

/// Failures surfaced by a [`SnapshotStore`](crate::SnapshotStore) backend.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("snapshot not found: {0}")]
    NotFound(String),

    #[error("snapshot backend error: {0}")]
    Backend(String),

    /// A stored key or value could not be decoded.
    #[error("snapshot encoding error: {0}")]
    Serialization(String),
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}
