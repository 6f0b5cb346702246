//! Error types for the notesync core.

use thiserror::Error;

use crate::part::VersionMark;
use crate::types::PartId;

/// Errors raised by item-level frame and part operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ItemError {
    /// An incoming part's marker is older than the one already recorded.
    #[error("stale write for part {part_id}: stored {stored}, incoming {incoming}")]
    StaleWrite {
        part_id: PartId,
        stored: VersionMark,
        incoming: VersionMark,
    },

    /// A part arrived without a covering frame entry.
    #[error("part {part_id} has no covering frame entry")]
    UnframedPart { part_id: PartId },

    /// A part's marker disagrees with the frame entry covering it.
    #[error("marker mismatch for part {part_id}: frame records {frame}, part carries {part}")]
    MarkMismatch {
        part_id: PartId,
        frame: VersionMark,
        part: VersionMark,
    },
}
