//! # Notesync Proto
//!
//! The differential synchronization protocol: per-(item, peer) sessions, the
//! coordinator that routes events to them, the logical messages, and the
//! transport seam.
//!
//! ## Overview
//!
//! One authoritative server and many clients each hold partial replicas of
//! composite items. Peers exchange frames (part id -> version marker) to
//! decide what the other side still needs, then transfer exactly those
//! parts. Every `(item, peer)` pair gets its own state machine, so
//! overlapping activity from many clients can never interleave into one
//! shared step counter.
//!
//! ## Key Properties
//!
//! - **Typed transitions**: illegal protocol steps are `Result` errors, not
//!   panics
//! - **Exact-set enforcement**: uploads must match the negotiated need set
//!   precisely
//! - **Monotone knowledge**: frame merges only add or advance, never regress
//! - **At most one cycle** per (item, peer) pair at a time
//!
//! ## Message Flow
//!
//! ```text
//! Client                              Server
//!   |-------- CreateNote ------------->|
//!   |<------- CreateNoteAck -----------|
//!   |-------- NeedsQuery ------------->|
//!   |<------- NeedsResponse -----------|
//!   |-------- PartsUpload ------------>|
//!   |-------- DownloadQuery ---------->|
//!   |<------- DownloadResponse --------|
//! ```

pub mod codec;
pub mod convergence;
pub mod coordinator;
pub mod error;
pub mod messages;
pub mod session;
pub mod transport;

pub use codec::{decode_message, encode_message};
pub use convergence::{
    item_digest, verify_all_items, verify_between, verify_convergence, ConvergenceResult,
};
pub use coordinator::{HandleOutcome, SessionKey, SyncCoordinator, SyncEvent, SyncIntent};
pub use error::{Result, SyncError};
pub use messages::{limits, PeerId, SyncErrorCode, SyncMessage, PROTOCOL_VERSION};
pub use session::{SessionState, SyncSession};
pub use transport::{memory::MemoryNetwork, memory::MemoryTransport, Transport};
