//! Error types for the replica API.

use notesync_core::{ItemError, ItemId};
use notesync_proto::SyncError;
use notesync_store::StoreError;
use thiserror::Error;

/// Errors that can occur during replica operations.
#[derive(Debug, Error)]
pub enum ReplicaError {
    /// Sync protocol error.
    #[error("sync error: {0}")]
    Sync(#[from] SyncError),

    /// Storage error.
    #[error("storage error: {0}")]
    Store(#[from] StoreError),

    /// Item-level invariant error.
    #[error("item error: {0}")]
    Item(#[from] ItemError),

    /// Item not found in this replica.
    #[error("item not found: {0}")]
    ItemNotFound(ItemId),
}

/// Result type for replica operations.
pub type Result<T> = std::result::Result<T, ReplicaError>;
