//! Proptest generators for property-based testing.
//!
//! Frames are generated over a small pooled id space so two generated frames
//! overlap often enough to exercise the interesting diff and merge cases.

use proptest::prelude::*;

use notesync_core::{Frame, ItemId, PartId, VersionMark};

/// Generate a random PartId over the full id space.
pub fn part_id() -> impl Strategy<Value = PartId> {
    any::<[u8; 32]>().prop_map(PartId::from_bytes)
}

/// Generate a random ItemId.
pub fn item_id() -> impl Strategy<Value = ItemId> {
    any::<[u8; 32]>().prop_map(ItemId::from_bytes)
}

/// Generate a version marker with a bounded counter.
pub fn version_mark() -> impl Strategy<Value = VersionMark> {
    (1u64..=100, any::<bool>()).prop_map(|(counter, tombstone)| VersionMark { counter, tombstone })
}

/// Generate a PartId from a small pool, so frames share ids.
pub fn pooled_part_id() -> impl Strategy<Value = PartId> {
    (0u8..16).prop_map(|b| PartId::from_bytes([b; 32]))
}

/// Generate a frame of up to `max_parts` pooled entries.
pub fn frame(max_parts: usize) -> impl Strategy<Value = Frame> {
    prop::collection::btree_map(pooled_part_id(), version_mark(), 0..=max_parts)
        .prop_map(Frame::from_entries)
}

/// Generate a pair of overlapping frames.
pub fn frame_pair() -> impl Strategy<Value = (Frame, Frame)> {
    (frame(12), frame(12))
}

#[cfg(test)]
mod tests {
    use super::*;
    use notesync_core::{frame_digest, missing_parts};
    use std::collections::BTreeMap;

    proptest! {
        #[test]
        fn prop_diff_matches_naive_model((local, remote) in frame_pair()) {
            let missing = missing_parts(&local, &remote);

            // Exactly the remote entries strictly newer than (or absent
            // from) the local frame, and nothing that is not in remote.
            for (id, mark) in remote.iter() {
                let expected = match local.get(id) {
                    None => true,
                    Some(have) => mark.is_newer_than(&have),
                };
                prop_assert_eq!(missing.contains(id), expected);
            }
            for id in &missing {
                prop_assert!(remote.contains(id));
            }
        }

        #[test]
        fn prop_diff_of_equal_frames_is_empty(f in frame(12)) {
            prop_assert!(missing_parts(&f, &f).is_empty());
        }

        #[test]
        fn prop_merge_is_monotone((local, delta) in frame_pair()) {
            let before = local.clone();
            let mut merged = local;
            merged.merge(&delta);

            // No recorded marker ever moves backwards, and every delta
            // marker is reached or exceeded.
            for (id, mark) in before.iter() {
                let after = merged.get(id).unwrap();
                prop_assert!(!mark.is_newer_than(&after));
            }
            for (id, mark) in delta.iter() {
                let after = merged.get(id).unwrap();
                prop_assert!(!mark.is_newer_than(&after));
            }
        }

        #[test]
        fn prop_merge_leaves_nothing_missing((local, remote) in frame_pair()) {
            let mut merged = local;
            merged.merge(&remote);
            prop_assert!(missing_parts(&merged, &remote).is_empty());
        }

        #[test]
        fn prop_merge_sequences_never_regress(deltas in prop::collection::vec(frame(8), 1..6)) {
            let mut acc = Frame::new();
            let mut high: BTreeMap<PartId, VersionMark> = BTreeMap::new();

            for delta in &deltas {
                acc.merge(delta);
                for (id, mark) in delta.iter() {
                    let entry = high.entry(*id).or_insert(*mark);
                    if mark.is_newer_than(entry) {
                        *entry = *mark;
                    }
                }
            }

            // The accumulator holds exactly the highest marker ever merged
            // for every id.
            for (id, mark) in &high {
                prop_assert_eq!(acc.get(id), Some(*mark));
            }
            prop_assert_eq!(acc.len(), high.len());
        }

        #[test]
        fn prop_frame_digest_deterministic(f in frame(12)) {
            prop_assert_eq!(frame_digest(&f), frame_digest(&f));
        }
    }
}
