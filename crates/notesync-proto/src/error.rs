//! Error types for the sync protocol.
//!
//! Data-level disagreement between peers is always surfaced, never silently
//! corrected: a "fixed" mismatch would mask data loss.

use std::collections::BTreeSet;

use thiserror::Error;

use notesync_core::{ItemError, ItemId, PartId};
use notesync_store::StoreError;

use crate::messages::SyncErrorCode;
use crate::session::SessionState;

/// Errors that can occur during sync operations.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Transition attempted from the wrong state. A caller bug or a lost or
    /// duplicated message; never retried automatically.
    #[error("protocol violation: expected state {expected:?}, actual state {actual:?}")]
    ProtocolViolation {
        expected: SessionState,
        actual: SessionState,
    },

    /// A cycle is already in flight for this (item, peer) pair. Transient;
    /// safe to retry once the current cycle completes.
    #[error("session busy in state {state:?}")]
    SessionBusy { state: SessionState },

    /// The item id is already registered.
    #[error("duplicate item: {0}")]
    DuplicateItem(ItemId),

    /// The responded need set disagreed with the one this session computed.
    #[error("need set mismatch: expected {expected:?}, got {got:?}")]
    NeedSetMismatch {
        expected: BTreeSet<PartId>,
        got: BTreeSet<PartId>,
    },

    /// An upload was missing part ids from the pending need set.
    #[error("incomplete upload: missing {missing:?}")]
    IncompleteUpload { missing: BTreeSet<PartId> },

    /// An upload carried a part id that was never requested.
    #[error("unsolicited part: {part_id}")]
    UnsolicitedPart { part_id: PartId },

    /// Item lookup failed.
    #[error("item not found: {0}")]
    ItemNotFound(ItemId),

    /// Store operation failed (stale write, missing part, invariant breach).
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Message validation failed.
    #[error("invalid message: {0}")]
    InvalidMessage(String),

    /// Transport-level error.
    #[error("transport error: {0}")]
    Transport(String),

    /// The counter-peer reported an error.
    #[error("peer error ({code:?}): {message}")]
    Peer {
        code: SyncErrorCode,
        message: String,
    },

    /// Timeout waiting for the counter-peer.
    #[error("timeout: {0}")]
    Timeout(String),

    /// The cycle was cancelled by the caller.
    #[error("sync cancelled")]
    Cancelled,
}

impl SyncError {
    /// The wire code reported to the counter-peer for this error.
    pub fn code(&self) -> SyncErrorCode {
        match self {
            SyncError::ProtocolViolation { .. } => SyncErrorCode::ProtocolViolation,
            SyncError::SessionBusy { .. } => SyncErrorCode::Busy,
            SyncError::DuplicateItem(_) => SyncErrorCode::DuplicateItem,
            SyncError::NeedSetMismatch { .. } => SyncErrorCode::NeedSetMismatch,
            SyncError::IncompleteUpload { .. } => SyncErrorCode::IncompleteUpload,
            SyncError::UnsolicitedPart { .. } => SyncErrorCode::UnsolicitedPart,
            SyncError::ItemNotFound(_) => SyncErrorCode::NotFound,
            SyncError::Store(StoreError::ItemNotFound(_))
            | SyncError::Store(StoreError::PartNotFound { .. }) => SyncErrorCode::NotFound,
            SyncError::Store(StoreError::Item(ItemError::StaleWrite { .. })) => {
                SyncErrorCode::StaleWrite
            }
            SyncError::Store(_) => SyncErrorCode::Internal,
            SyncError::InvalidMessage(_) => SyncErrorCode::InvalidMessage,
            SyncError::Peer { code, .. } => *code,
            SyncError::Transport(_) | SyncError::Timeout(_) | SyncError::Cancelled => {
                SyncErrorCode::Unknown
            }
        }
    }
}

/// Result type for sync operations.
pub type Result<T> = std::result::Result<T, SyncError>;
