//! # Notesync Store
//!
//! Storage abstraction for notesync. Provides a trait-based interface for
//! item and part persistence with an in-memory implementation.
//!
//! ## Overview
//!
//! The store module abstracts item storage behind the [`Store`] trait,
//! keeping the protocol storage-agnostic. [`MemoryStore`] backs tests and
//! simulations; durable backends are external collaborators behind the same
//! seam.
//!
//! ## Key Types
//!
//! - [`Store`] - the async trait for all storage operations
//! - [`MemoryStore`] - in-memory storage with per-item exclusive sections
//! - [`CreateResult`] - result of registering an item
//! - [`PutOutcome`] - result of writing a part
//!
//! ## Design Notes
//!
//! - **Idempotent puts**: writing a part at its recorded marker returns
//!   `AlreadyCurrent`
//! - **No silent downgrades**: older markers fail with a stale-write error
//! - **Atomic updates**: `apply_update` is all-or-nothing per item
//! - **Per-item locking**: unrelated items' syncs proceed in parallel

pub mod error;
pub mod memory;
pub mod traits;

pub use error::{Result, StoreError};
pub use memory::MemoryStore;
pub use traits::{CreateResult, PutOutcome, Store};
