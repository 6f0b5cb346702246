//! Error types for the store module.

use thiserror::Error;

use notesync_core::{ItemError, ItemId, PartId};

/// Errors that can occur during store operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Item lookup failed.
    #[error("item not found: {0}")]
    ItemNotFound(ItemId),

    /// Part lookup failed.
    #[error("part {part_id} not found in item {item_id}")]
    PartNotFound { item_id: ItemId, part_id: PartId },

    /// An item-level invariant rejected the write (stale marker, unframed or
    /// mismatched part).
    #[error(transparent)]
    Item(#[from] ItemError),

    /// Data in storage failed to decode or validate.
    #[error("invalid data: {0}")]
    InvalidData(String),
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
