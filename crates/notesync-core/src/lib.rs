//! # Notesync Core
//!
//! Pure data model for the notesync protocol: items, parts, frames, and the
//! frame diffing that decides what a peer still needs.
//!
//! This crate contains no I/O, no storage, no networking. It is pure
//! computation over the synchronization data model.
//!
//! ## Key Types
//!
//! - [`Item`] - a synchronizable document: a frame plus the held parts
//! - [`Part`] - an opaque, versioned content fragment
//! - [`Frame`] - digest mapping part id to version marker
//! - [`VersionMark`] - monotonically comparable version marker
//! - [`missing_parts`] - the pure diff deciding what a peer lacks
//!
//! ## Canonicalization
//!
//! Frames are encoded as deterministic CBOR for convergence digests. See the
//! [`canonical`] module.

pub mod canonical;
pub mod error;
pub mod frame;
pub mod item;
pub mod part;
pub mod types;

pub use canonical::{canonical_frame_bytes, frame_digest};
pub use error::ItemError;
pub use frame::{missing_parts, Frame, MergeSummary};
pub use item::Item;
pub use part::{Part, VersionMark};
pub use types::{Digest, ItemId, PartId};
