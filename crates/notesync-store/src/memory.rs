//! In-memory implementation of the Store trait.
//!
//! Backs tests and protocol simulations. Each item sits behind its own lock
//! so syncs of unrelated items proceed in parallel; the outer map lock is
//! held only long enough to resolve the item handle.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Arc, Mutex, RwLock};

use async_trait::async_trait;
use notesync_core::{Frame, Item, ItemId, MergeSummary, Part, PartId};

use crate::error::{Result, StoreError};
use crate::traits::{CreateResult, PutOutcome, Store};

/// In-memory store implementation.
///
/// All data is lost when the store is dropped.
pub struct MemoryStore {
    items: RwLock<HashMap<ItemId, Arc<Mutex<Item>>>>,
}

impl MemoryStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self {
            items: RwLock::new(HashMap::new()),
        }
    }

    fn handle(&self, item_id: &ItemId) -> Result<Arc<Mutex<Item>>> {
        self.items
            .read()
            .unwrap()
            .get(item_id)
            .cloned()
            .ok_or(StoreError::ItemNotFound(*item_id))
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn create_item(&self, item: &Item) -> Result<CreateResult> {
        let mut items = self.items.write().unwrap();
        if items.contains_key(&item.item_id()) {
            return Ok(CreateResult::AlreadyExists);
        }
        items.insert(item.item_id(), Arc::new(Mutex::new(item.clone())));
        Ok(CreateResult::Created)
    }

    async fn get_item(&self, item_id: &ItemId) -> Result<Option<Item>> {
        let handle = self.items.read().unwrap().get(item_id).cloned();
        Ok(handle.map(|h| h.lock().unwrap().clone()))
    }

    async fn contains_item(&self, item_id: &ItemId) -> Result<bool> {
        Ok(self.items.read().unwrap().contains_key(item_id))
    }

    async fn get_frame(&self, item_id: &ItemId) -> Result<Option<Frame>> {
        let handle = self.items.read().unwrap().get(item_id).cloned();
        Ok(handle.map(|h| h.lock().unwrap().frame().clone()))
    }

    async fn apply_update(
        &self,
        item_id: &ItemId,
        frame_delta: &Frame,
        parts: BTreeMap<PartId, Part>,
    ) -> Result<MergeSummary> {
        let handle = self.handle(item_id)?;
        let mut item = handle.lock().unwrap();
        Ok(item.apply_update(frame_delta, parts)?)
    }

    async fn remove_item(&self, item_id: &ItemId) -> Result<bool> {
        Ok(self.items.write().unwrap().remove(item_id).is_some())
    }

    async fn list_items(&self) -> Result<Vec<ItemId>> {
        Ok(self.items.read().unwrap().keys().copied().collect())
    }

    async fn get_part(&self, item_id: &ItemId, part_id: &PartId) -> Result<Part> {
        let handle = self.handle(item_id)?;
        let item = handle.lock().unwrap();
        item.part(part_id)
            .cloned()
            .ok_or(StoreError::PartNotFound {
                item_id: *item_id,
                part_id: *part_id,
            })
    }

    async fn get_parts(
        &self,
        item_id: &ItemId,
        part_ids: &BTreeSet<PartId>,
    ) -> Result<BTreeMap<PartId, Part>> {
        let handle = self.handle(item_id)?;
        let item = handle.lock().unwrap();

        let mut parts = BTreeMap::new();
        for part_id in part_ids {
            let part = item.part(part_id).cloned().ok_or(StoreError::PartNotFound {
                item_id: *item_id,
                part_id: *part_id,
            })?;
            parts.insert(*part_id, part);
        }
        Ok(parts)
    }

    async fn put_part(&self, item_id: &ItemId, part_id: PartId, part: Part) -> Result<PutOutcome> {
        let handle = self.handle(item_id)?;
        let mut item = handle.lock().unwrap();

        let outcome = if item.frame().get(&part_id) == Some(part.mark) {
            PutOutcome::AlreadyCurrent
        } else {
            PutOutcome::Stored
        };
        item.put_part(part_id, part)?;
        Ok(outcome)
    }

    async fn contains_part(&self, item_id: &ItemId, part_id: &PartId) -> Result<bool> {
        let handle = self.handle(item_id)?;
        let item = handle.lock().unwrap();
        Ok(item.contains_part(part_id))
    }

    async fn part_ids(&self, item_id: &ItemId) -> Result<BTreeSet<PartId>> {
        let handle = self.handle(item_id)?;
        let item = handle.lock().unwrap();
        Ok(item.held_parts())
    }
}
