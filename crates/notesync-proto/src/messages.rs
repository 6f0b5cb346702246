//! Sync protocol message types.
//!
//! These are the logical messages the protocol exchanges; a transport layer
//! carries them between peers, supplying the sender's peer id in its
//! envelope.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use notesync_core::{Frame, ItemId, Part, PartId};

/// Unique identifier for a peer (the server or a client).
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PeerId(pub [u8; 32]);

impl PeerId {
    /// Create from raw bytes.
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Get the raw bytes.
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Generate a random peer ID.
    pub fn random() -> Self {
        use rand::Rng;
        Self(rand::thread_rng().gen())
    }
}

impl fmt::Debug for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PeerId({})", &hex::encode(self.0)[..16])
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", &hex::encode(self.0)[..16])
    }
}

/// Current protocol version.
pub const PROTOCOL_VERSION: u8 = 0;

/// Message size limits.
pub mod limits {
    /// Max part ids in a need set or download request.
    pub const MAX_NEED_SET: usize = 1000;
    /// Max parts carried by one message.
    pub const MAX_PARTS_PER_MESSAGE: usize = 100;
    /// Max entries in a frame or frame delta.
    pub const MAX_FRAME_ENTRIES: usize = 10_000;
    /// Max content bytes for a single part.
    pub const MAX_PART_BYTES: usize = 1 << 20;
}

/// Sync protocol messages.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum SyncMessage {
    /// Register a freshly authored item with the counter-peer.
    CreateNote {
        /// The new item's id.
        item_id: ItemId,
        /// Its initial frame.
        frame: Frame,
        /// Its initial parts.
        parts: BTreeMap<PartId, Part>,
    },

    /// Acknowledge item registration.
    CreateNoteAck {
        /// The registered item.
        item_id: ItemId,
    },

    /// Report the sender's servable frame and ask what the receiver needs.
    NeedsQuery {
        /// The item being negotiated.
        item_id: ItemId,
        /// The sender's frame, restricted to parts it can serve.
        frame: Frame,
    },

    /// The need set the receiver computed from the reported frame.
    NeedsResponse {
        /// The item being negotiated.
        item_id: ItemId,
        /// Part ids the responder still needs from the reporter.
        need_set: BTreeSet<PartId>,
    },

    /// Deliver exactly the parts the receiver said it needs.
    PartsUpload {
        /// The item being synced.
        item_id: ItemId,
        /// Frame entries covering the uploaded parts.
        frame_delta: Frame,
        /// The parts being sent.
        parts: BTreeMap<PartId, Part>,
    },

    /// Request content for specific parts.
    DownloadQuery {
        /// The item to fetch from.
        item_id: ItemId,
        /// Which parts are requested.
        part_ids: BTreeSet<PartId>,
    },

    /// Requested content plus the sender's full frame.
    DownloadResponse {
        /// The item fetched from.
        item_id: ItemId,
        /// The sender's current frame for the item.
        frame: Frame,
        /// The requested parts.
        parts: BTreeMap<PartId, Part>,
    },

    /// Error condition.
    Error {
        /// The item whose cycle failed.
        item_id: ItemId,
        /// Error code for programmatic handling.
        code: SyncErrorCode,
        /// Human-readable description.
        message: String,
    },
}

impl SyncMessage {
    /// The item this message concerns. Every message carries one; the
    /// coordinator routes by `(item_id, peer_id)`.
    pub fn item_id(&self) -> ItemId {
        match self {
            SyncMessage::CreateNote { item_id, .. }
            | SyncMessage::CreateNoteAck { item_id }
            | SyncMessage::NeedsQuery { item_id, .. }
            | SyncMessage::NeedsResponse { item_id, .. }
            | SyncMessage::PartsUpload { item_id, .. }
            | SyncMessage::DownloadQuery { item_id, .. }
            | SyncMessage::DownloadResponse { item_id, .. }
            | SyncMessage::Error { item_id, .. } => *item_id,
        }
    }

    /// Short name for logs and error text.
    pub fn kind(&self) -> &'static str {
        match self {
            SyncMessage::CreateNote { .. } => "CreateNote",
            SyncMessage::CreateNoteAck { .. } => "CreateNoteAck",
            SyncMessage::NeedsQuery { .. } => "NeedsQuery",
            SyncMessage::NeedsResponse { .. } => "NeedsResponse",
            SyncMessage::PartsUpload { .. } => "PartsUpload",
            SyncMessage::DownloadQuery { .. } => "DownloadQuery",
            SyncMessage::DownloadResponse { .. } => "DownloadResponse",
            SyncMessage::Error { .. } => "Error",
        }
    }

    /// Check that this message respects size limits.
    pub fn validate_limits(&self) -> Result<(), &'static str> {
        fn check_frame(frame: &Frame) -> Result<(), &'static str> {
            if frame.len() > limits::MAX_FRAME_ENTRIES {
                return Err("too many frame entries");
            }
            Ok(())
        }
        fn check_parts(parts: &BTreeMap<PartId, Part>) -> Result<(), &'static str> {
            if parts.len() > limits::MAX_PARTS_PER_MESSAGE {
                return Err("too many parts");
            }
            if parts.values().any(|p| p.len() > limits::MAX_PART_BYTES) {
                return Err("part too large");
            }
            Ok(())
        }

        match self {
            SyncMessage::CreateNote { frame, parts, .. } => {
                check_frame(frame)?;
                check_parts(parts)?;
            }
            SyncMessage::CreateNoteAck { .. } => {}
            SyncMessage::NeedsQuery { frame, .. } => check_frame(frame)?,
            SyncMessage::NeedsResponse { need_set, .. } => {
                if need_set.len() > limits::MAX_NEED_SET {
                    return Err("need set too large");
                }
            }
            SyncMessage::PartsUpload {
                frame_delta, parts, ..
            } => {
                check_frame(frame_delta)?;
                check_parts(parts)?;
            }
            SyncMessage::DownloadQuery { part_ids, .. } => {
                if part_ids.len() > limits::MAX_NEED_SET {
                    return Err("download request too large");
                }
            }
            SyncMessage::DownloadResponse { frame, parts, .. } => {
                check_frame(frame)?;
                check_parts(parts)?;
            }
            SyncMessage::Error { .. } => {}
        }
        Ok(())
    }
}

/// Error codes for the sync protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u16)]
pub enum SyncErrorCode {
    /// Unknown/unspecified error.
    Unknown = 0,
    /// Transition attempted from the wrong state.
    ProtocolViolation = 1,
    /// Item id already registered.
    DuplicateItem = 2,
    /// Need set disagreed with the expected set.
    NeedSetMismatch = 3,
    /// Upload was missing expected parts.
    IncompleteUpload = 4,
    /// Upload carried a part that was not requested.
    UnsolicitedPart = 5,
    /// A write would downgrade a recorded marker.
    StaleWrite = 6,
    /// A cycle is already in flight for the pair.
    Busy = 7,
    /// Item or part lookup failed.
    NotFound = 8,
    /// Malformed or oversized message.
    InvalidMessage = 9,
    /// Internal error on the peer.
    Internal = 10,
}
