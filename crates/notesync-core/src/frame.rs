//! Frames: an item's digest mapping part ids to version markers.
//!
//! A frame is how peers compare knowledge about an item without transferring
//! part content. Diffing two frames yields the need set; merging a frame is
//! strictly monotone.

use serde::{Deserialize, Serialize};
use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, BTreeSet};

use crate::part::VersionMark;
use crate::types::PartId;

/// Ordered mapping from part id to version marker.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Frame {
    entries: BTreeMap<PartId, VersionMark>,
}

impl Frame {
    /// An empty frame.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a frame from entries.
    pub fn from_entries(entries: impl IntoIterator<Item = (PartId, VersionMark)>) -> Self {
        Self {
            entries: entries.into_iter().collect(),
        }
    }

    /// The marker recorded for a part, if any.
    pub fn get(&self, part_id: &PartId) -> Option<VersionMark> {
        self.entries.get(part_id).copied()
    }

    /// Record a marker for a part.
    ///
    /// This is a plain map write; the monotone path for remote input is
    /// [`Frame::merge`].
    pub fn insert(&mut self, part_id: PartId, mark: VersionMark) -> Option<VersionMark> {
        self.entries.insert(part_id, mark)
    }

    /// Whether the frame records the part.
    pub fn contains(&self, part_id: &PartId) -> bool {
        self.entries.contains_key(part_id)
    }

    /// Number of recorded parts.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the frame is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The set of part ids this frame records.
    pub fn part_ids(&self) -> BTreeSet<PartId> {
        self.entries.keys().copied().collect()
    }

    /// Iterate over `(part_id, mark)` entries in id order.
    pub fn iter(&self) -> impl Iterator<Item = (&PartId, &VersionMark)> {
        self.entries.iter()
    }

    /// Merge another frame into this one, monotonically.
    ///
    /// Keys may only be added and markers only advanced; an incoming marker
    /// that is not strictly newer than the recorded one is ignored. Nothing
    /// is ever deleted.
    pub fn merge(&mut self, delta: &Frame) -> MergeSummary {
        let mut summary = MergeSummary::default();
        for (part_id, incoming) in &delta.entries {
            match self.entries.entry(*part_id) {
                Entry::Vacant(slot) => {
                    slot.insert(*incoming);
                    summary.added += 1;
                }
                Entry::Occupied(mut slot) => {
                    if incoming.is_newer_than(slot.get()) {
                        slot.insert(*incoming);
                        summary.advanced += 1;
                    } else {
                        summary.ignored += 1;
                    }
                }
            }
        }
        summary
    }

    /// The sub-frame covering exactly the given part ids.
    ///
    /// Ids the frame does not record are skipped.
    pub fn restricted_to(&self, ids: &BTreeSet<PartId>) -> Frame {
        Frame {
            entries: ids
                .iter()
                .filter_map(|id| self.entries.get(id).map(|mark| (*id, *mark)))
                .collect(),
        }
    }
}

impl FromIterator<(PartId, VersionMark)> for Frame {
    fn from_iter<T: IntoIterator<Item = (PartId, VersionMark)>>(iter: T) -> Self {
        Self::from_entries(iter)
    }
}

/// Outcome counts of a monotone frame merge.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct MergeSummary {
    /// Entries that were new to this frame.
    pub added: usize,
    /// Entries whose marker advanced.
    pub advanced: usize,
    /// Entries that were not newer and were ignored.
    pub ignored: usize,
}

impl MergeSummary {
    /// How many entries changed.
    pub fn changed(&self) -> usize {
        self.added + self.advanced
    }
}

/// Every part id in `remote` whose marker is strictly newer than (or absent
/// from) `local`.
///
/// Equal markers mean already-synced. Ids present only in `local` are never
/// returned: the protocol never asks a peer to delete, only to pull absent or
/// newer content.
pub fn missing_parts(local: &Frame, remote: &Frame) -> BTreeSet<PartId> {
    remote
        .entries
        .iter()
        .filter(|(part_id, mark)| match local.entries.get(*part_id) {
            None => true,
            Some(have) => mark.is_newer_than(have),
        })
        .map(|(part_id, _)| *part_id)
        .collect()
}
