//! Store trait: the abstract interface for item and part persistence.
//!
//! This trait keeps the protocol storage-agnostic. The in-memory
//! implementation backs tests and simulations; persistent backends plug in
//! behind the same seam.

use std::collections::{BTreeMap, BTreeSet};

use async_trait::async_trait;
use notesync_core::{Frame, Item, ItemId, MergeSummary, Part, PartId};

use crate::error::Result;

/// Result of creating an item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateResult {
    /// The item was registered.
    Created,
    /// An item with this id already exists; nothing was changed.
    AlreadyExists,
}

/// Result of writing a part.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PutOutcome {
    /// The part was written and the frame advanced.
    Stored,
    /// The store already holds this marker (idempotent - not an error).
    AlreadyCurrent,
}

/// The Store trait: async interface for item and part persistence.
///
/// # Design Notes
///
/// - **Idempotent puts**: writing a part at its already-recorded marker
///   returns `AlreadyCurrent`.
/// - **No silent downgrades**: a part older than the recorded marker fails
///   with a stale-write error rather than being dropped.
/// - **Atomic updates**: `apply_update` validates the whole batch inside the
///   item's exclusive section before mutating anything.
/// - **Lookups never default**: a missing part or item is an error for the
///   caller to handle, not an empty result.
#[async_trait]
pub trait Store: Send + Sync {
    // ─────────────────────────────────────────────────────────────────────────
    // Item Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Register a new item.
    ///
    /// Returns `AlreadyExists` without touching the stored item when the id
    /// collides.
    async fn create_item(&self, item: &Item) -> Result<CreateResult>;

    /// Fetch a snapshot of an item.
    async fn get_item(&self, item_id: &ItemId) -> Result<Option<Item>>;

    /// Whether the store knows the item.
    async fn contains_item(&self, item_id: &ItemId) -> Result<bool>;

    /// The item's current frame.
    async fn get_frame(&self, item_id: &ItemId) -> Result<Option<Frame>>;

    /// Merge a frame delta and write parts, atomically per item.
    ///
    /// The batch is validated before anything is applied; on failure the
    /// stored item is untouched.
    async fn apply_update(
        &self,
        item_id: &ItemId,
        frame_delta: &Frame,
        parts: BTreeMap<PartId, Part>,
    ) -> Result<MergeSummary>;

    /// Remove an item entirely.
    ///
    /// Used to roll back a registration whose mirroring to the counter-peer
    /// failed. Returns whether the item existed.
    async fn remove_item(&self, item_id: &ItemId) -> Result<bool>;

    /// List all known item ids.
    async fn list_items(&self) -> Result<Vec<ItemId>>;

    // ─────────────────────────────────────────────────────────────────────────
    // Part Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Fetch one part's content. Fails with `PartNotFound` when the content
    /// is not held.
    async fn get_part(&self, item_id: &ItemId, part_id: &PartId) -> Result<Part>;

    /// Fetch a batch of parts. Any missing id fails the whole call.
    async fn get_parts(
        &self,
        item_id: &ItemId,
        part_ids: &BTreeSet<PartId>,
    ) -> Result<BTreeMap<PartId, Part>>;

    /// Write one part.
    ///
    /// Idempotent at the recorded marker; fails with a stale-write error when
    /// the incoming marker is older.
    async fn put_part(&self, item_id: &ItemId, part_id: PartId, part: Part) -> Result<PutOutcome>;

    /// Whether the part's content is held.
    async fn contains_part(&self, item_id: &ItemId, part_id: &PartId) -> Result<bool>;

    /// The ids of all held parts of an item.
    async fn part_ids(&self, item_id: &ItemId) -> Result<BTreeSet<PartId>>;
}
