//! # Notesync
//!
//! The unified API for notesync - differential synchronization of composite
//! items between one authoritative server and many partial client replicas.
//!
//! ## Overview
//!
//! Each item decomposes into addressable parts plus a frame: a digest
//! mapping part id to version marker. Peers diff frames to decide what the
//! other side still needs, then transfer exactly those parts. The protocol
//! never merges concurrent edits to the same part; parts are opaque,
//! server-authoritative content.
//!
//! ## Key Concepts
//!
//! - **Part**: immutable under a given marker. A change is a new version.
//! - **Frame**: knowledge, not possession. A peer may know a part exists
//!   before it holds the content.
//! - **Tombstone**: deletion is an advanced marker, never a removed key.
//! - **Session**: each (item, peer) pair gets its own state machine.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use notesync::{Replica, ReplicaConfig};
//! use notesync::proto::{MemoryNetwork, PeerId};
//! use notesync::store::MemoryStore;
//!
//! async fn example() {
//!     let server_id = PeerId::random();
//!     let client = Replica::new(
//!         PeerId::random(),
//!         MemoryStore::new(),
//!         ReplicaConfig::default(),
//!     );
//!
//!     // Author an item locally
//!     let item = client.author_item(
//!         "meeting-notes",
//!         vec![("title", "Weekly sync".into()), ("body", "- agenda".into())],
//!     );
//!
//!     // Mirror it to the server, then push and pull over a transport
//!     // let transport = ...;
//!     // client.create_on(&transport, server_id, item).await.unwrap();
//!     // client.push(&transport, server_id, item_id).await.unwrap();
//! }
//! ```
//!
//! ## Re-exports
//!
//! This crate re-exports the component crates for convenience:
//!
//! - `notesync::core` - data model (Item, Part, Frame, markers, diffing)
//! - `notesync::store` - storage abstraction and the in-memory store
//! - `notesync::proto` - sessions, coordinator, messages, transport

pub mod error;
pub mod replica;

// Re-export component crates
pub use notesync_core as core;
pub use notesync_proto as proto;
pub use notesync_store as store;

// Re-export main types for convenience
pub use error::{ReplicaError, Result};
pub use replica::{Replica, ReplicaConfig, ServeReport, SyncReport};

// Re-export commonly used core types
pub use notesync_core::{
    missing_parts, Frame, Item, ItemId, MergeSummary, Part, PartId, VersionMark,
};
