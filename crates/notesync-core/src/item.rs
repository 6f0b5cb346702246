//! Items: a frame plus the parts this peer actually holds.
//!
//! Invariant: every held part has a frame entry whose marker equals the
//! stored part's marker. A peer may know a part exists (via the frame)
//! before it holds the content, never the other way around.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::error::ItemError;
use crate::frame::{Frame, MergeSummary};
use crate::part::Part;
use crate::types::{ItemId, PartId};

/// A synchronizable document: an id, its frame, and the held parts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    item_id: ItemId,
    frame: Frame,
    parts: BTreeMap<PartId, Part>,
}

impl Item {
    /// An empty item.
    pub fn new(item_id: ItemId) -> Self {
        Self {
            item_id,
            frame: Frame::new(),
            parts: BTreeMap::new(),
        }
    }

    /// Build an item holding the given parts, with the frame derived from
    /// their markers.
    pub fn from_parts(item_id: ItemId, parts: BTreeMap<PartId, Part>) -> Self {
        let frame = Frame::from_entries(parts.iter().map(|(id, part)| (*id, part.mark)));
        Self {
            item_id,
            frame,
            parts,
        }
    }

    /// Rebuild an item from an explicit frame and parts map, checking the
    /// frame-superset invariant.
    pub fn from_frame(
        item_id: ItemId,
        frame: Frame,
        parts: BTreeMap<PartId, Part>,
    ) -> Result<Self, ItemError> {
        for (part_id, part) in &parts {
            match frame.get(part_id) {
                None => return Err(ItemError::UnframedPart { part_id: *part_id }),
                Some(mark) if mark != part.mark => {
                    return Err(ItemError::MarkMismatch {
                        part_id: *part_id,
                        frame: mark,
                        part: part.mark,
                    })
                }
                Some(_) => {}
            }
        }
        Ok(Self {
            item_id,
            frame,
            parts,
        })
    }

    /// The item id.
    pub fn item_id(&self) -> ItemId {
        self.item_id
    }

    /// The current frame.
    pub fn frame(&self) -> &Frame {
        &self.frame
    }

    /// A held part, if this peer has its content.
    pub fn part(&self, part_id: &PartId) -> Option<&Part> {
        self.parts.get(part_id)
    }

    /// Whether this peer holds the part's content.
    pub fn contains_part(&self, part_id: &PartId) -> bool {
        self.parts.contains_key(part_id)
    }

    /// The ids of parts whose content this peer holds.
    pub fn held_parts(&self) -> BTreeSet<PartId> {
        self.parts.keys().copied().collect()
    }

    /// Iterate over held parts in id order.
    pub fn parts(&self) -> impl Iterator<Item = (&PartId, &Part)> {
        self.parts.iter()
    }

    /// Number of held parts.
    pub fn part_count(&self) -> usize {
        self.parts.len()
    }

    /// Ids the frame records but whose content is not held.
    ///
    /// This is what the owning peer still needs to download.
    pub fn unheld_parts(&self) -> BTreeSet<PartId> {
        self.frame
            .iter()
            .filter(|(part_id, _)| !self.parts.contains_key(*part_id))
            .map(|(part_id, _)| *part_id)
            .collect()
    }

    /// Write a single part, advancing the frame when the marker is newer.
    ///
    /// Equal markers are an idempotent overwrite; an older marker fails
    /// `StaleWrite` and changes nothing.
    pub fn put_part(&mut self, part_id: PartId, part: Part) -> Result<(), ItemError> {
        if let Some(stored) = self.frame.get(&part_id) {
            if stored.is_newer_than(&part.mark) {
                return Err(ItemError::StaleWrite {
                    part_id,
                    stored,
                    incoming: part.mark,
                });
            }
        }
        self.frame.insert(part_id, part.mark);
        self.parts.insert(part_id, part);
        Ok(())
    }

    /// Apply a sync update: merge the frame delta and write the parts.
    ///
    /// The whole batch is validated before anything is mutated, so a failure
    /// leaves the item exactly as it was.
    pub fn apply_update(
        &mut self,
        frame_delta: &Frame,
        parts: BTreeMap<PartId, Part>,
    ) -> Result<MergeSummary, ItemError> {
        for (part_id, part) in &parts {
            match frame_delta.get(part_id) {
                None => return Err(ItemError::UnframedPart { part_id: *part_id }),
                Some(mark) if mark != part.mark => {
                    return Err(ItemError::MarkMismatch {
                        part_id: *part_id,
                        frame: mark,
                        part: part.mark,
                    })
                }
                Some(_) => {}
            }
            if let Some(stored) = self.frame.get(part_id) {
                if stored.is_newer_than(&part.mark) {
                    return Err(ItemError::StaleWrite {
                        part_id: *part_id,
                        stored,
                        incoming: part.mark,
                    });
                }
            }
        }

        let summary = self.frame.merge(frame_delta);
        for (part_id, part) in parts {
            self.parts.insert(part_id, part);
        }
        Ok(summary)
    }

    /// Check the frame-superset invariant, for tests and diagnostics.
    pub fn check_invariant(&self) -> Result<(), ItemError> {
        for (part_id, part) in &self.parts {
            match self.frame.get(part_id) {
                None => return Err(ItemError::UnframedPart { part_id: *part_id }),
                Some(mark) if mark != part.mark => {
                    return Err(ItemError::MarkMismatch {
                        part_id: *part_id,
                        frame: mark,
                        part: part.mark,
                    })
                }
                Some(_) => {}
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::part::VersionMark;

    fn pid(b: u8) -> PartId {
        PartId::from_bytes([b; 32])
    }

    fn part(counter: u64, content: &'static [u8]) -> Part {
        Part::new(VersionMark::new(counter), content)
    }

    #[test]
    fn test_from_parts_builds_matching_frame() {
        let item = Item::from_parts(
            ItemId::from_bytes([1; 32]),
            BTreeMap::from([(pid(1), part(1, b"a")), (pid(2), part(3, b"b"))]),
        );

        assert_eq!(item.frame().get(&pid(1)), Some(VersionMark::new(1)));
        assert_eq!(item.frame().get(&pid(2)), Some(VersionMark::new(3)));
        assert!(item.check_invariant().is_ok());
    }

    #[test]
    fn test_from_frame_rejects_unframed_part() {
        let frame = Frame::from_entries([(pid(1), VersionMark::new(1))]);
        let parts = BTreeMap::from([(pid(2), part(1, b"x"))]);

        let err = Item::from_frame(ItemId::ZERO, frame, parts).unwrap_err();
        assert_eq!(err, ItemError::UnframedPart { part_id: pid(2) });
    }

    #[test]
    fn test_from_frame_rejects_mark_mismatch() {
        let frame = Frame::from_entries([(pid(1), VersionMark::new(2))]);
        let parts = BTreeMap::from([(pid(1), part(1, b"x"))]);

        assert!(matches!(
            Item::from_frame(ItemId::ZERO, frame, parts),
            Err(ItemError::MarkMismatch { .. })
        ));
    }

    #[test]
    fn test_put_part_rejects_stale_write() {
        let mut item = Item::from_parts(
            ItemId::ZERO,
            BTreeMap::from([(pid(1), part(2, b"new"))]),
        );

        let err = item.put_part(pid(1), part(1, b"old")).unwrap_err();
        assert!(matches!(err, ItemError::StaleWrite { .. }));
        assert_eq!(item.part(&pid(1)).unwrap().content.as_ref(), b"new");
    }

    #[test]
    fn test_put_part_equal_mark_is_idempotent() {
        let mut item = Item::from_parts(
            ItemId::ZERO,
            BTreeMap::from([(pid(1), part(2, b"same"))]),
        );

        item.put_part(pid(1), part(2, b"same")).unwrap();
        assert_eq!(item.part_count(), 1);
    }

    #[test]
    fn test_put_part_advances_frame() {
        let mut item = Item::new(ItemId::ZERO);
        item.put_part(pid(1), part(1, b"a")).unwrap();
        item.put_part(pid(1), part(2, b"b")).unwrap();

        assert_eq!(item.frame().get(&pid(1)), Some(VersionMark::new(2)));
        assert!(item.check_invariant().is_ok());
    }

    #[test]
    fn test_unheld_parts() {
        let mut item = Item::from_parts(
            ItemId::ZERO,
            BTreeMap::from([(pid(1), part(1, b"a"))]),
        );
        // Learn about pid(2) via a frame-only merge, without content.
        item.apply_update(
            &Frame::from_entries([(pid(2), VersionMark::new(1))]),
            BTreeMap::new(),
        )
        .unwrap();

        assert_eq!(item.unheld_parts(), BTreeSet::from([pid(2)]));
        assert!(item.check_invariant().is_ok());
    }

    #[test]
    fn test_apply_update_is_all_or_nothing() {
        let mut item = Item::from_parts(
            ItemId::ZERO,
            BTreeMap::from([(pid(1), part(3, b"held"))]),
        );
        let before = item.clone();

        // One good part and one stale part in the same batch.
        let delta = Frame::from_entries([
            (pid(1), VersionMark::new(1)),
            (pid(2), VersionMark::new(1)),
        ]);
        let parts = BTreeMap::from([
            (pid(1), part(1, b"stale")),
            (pid(2), part(1, b"fresh")),
        ]);

        let err = item.apply_update(&delta, parts).unwrap_err();
        assert!(matches!(err, ItemError::StaleWrite { .. }));
        assert_eq!(item, before);
    }

    #[test]
    fn test_apply_update_merges_and_writes() {
        let mut item = Item::from_parts(
            ItemId::ZERO,
            BTreeMap::from([(pid(1), part(1, b"a"))]),
        );

        let delta = Frame::from_entries([(pid(2), VersionMark::new(1))]);
        let parts = BTreeMap::from([(pid(2), part(1, b"b"))]);
        let summary = item.apply_update(&delta, parts).unwrap();

        assert_eq!(summary.added, 1);
        assert!(item.contains_part(&pid(2)));
        assert!(item.check_invariant().is_ok());
    }
}
