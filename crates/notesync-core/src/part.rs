//! Parts: opaque, versioned content fragments of an item.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::types::Digest;

/// Monotonically comparable version marker for a part.
///
/// Ordering is lexicographic over `(counter, tombstone)`: a tombstone at the
/// same counter orders after the live write it supersedes. Deletion is a new
/// marker, never a removed key.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct VersionMark {
    /// Write counter, starting at 1.
    pub counter: u64,
    /// Whether this marker tombstones the part.
    pub tombstone: bool,
}

impl VersionMark {
    /// A live marker at the given counter.
    pub const fn new(counter: u64) -> Self {
        Self {
            counter,
            tombstone: false,
        }
    }

    /// The marker for a part's first write.
    pub const fn initial() -> Self {
        Self::new(1)
    }

    /// The marker for the next live write after this one.
    pub const fn next(&self) -> Self {
        Self::new(self.counter + 1)
    }

    /// The marker that tombstones the part after this write.
    pub const fn entomb(&self) -> Self {
        Self {
            counter: self.counter + 1,
            tombstone: true,
        }
    }

    /// Strict comparison used by frame diffing. Equal markers are in sync.
    pub fn is_newer_than(&self, other: &VersionMark) -> bool {
        self > other
    }

    /// Whether this marker tombstones its part.
    pub const fn is_tombstone(&self) -> bool {
        self.tombstone
    }
}

impl fmt::Display for VersionMark {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.tombstone {
            write!(f, "v{}-tomb", self.counter)
        } else {
            write!(f, "v{}", self.counter)
        }
    }
}

/// An opaque content fragment, immutable once written under a given marker.
///
/// A new version of a part is a new logical write with an advanced marker,
/// not a mutation in place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Part {
    /// The version marker this content was written under.
    pub mark: VersionMark,
    /// The opaque content.
    pub content: Bytes,
}

impl Part {
    /// Create a part from content and its marker.
    pub fn new(mark: VersionMark, content: impl Into<Bytes>) -> Self {
        Self {
            mark,
            content: content.into(),
        }
    }

    /// A tombstone part: empty content under a tombstone marker.
    pub fn tombstone(mark: VersionMark) -> Self {
        Self {
            mark,
            content: Bytes::new(),
        }
    }

    /// Content digest, used by convergence diagnostics.
    pub fn digest(&self) -> Digest {
        Digest::hash(&self.content)
    }

    /// Whether this part is a tombstone.
    pub fn is_tombstone(&self) -> bool {
        self.mark.is_tombstone()
    }

    /// Content length in bytes.
    pub fn len(&self) -> usize {
        self.content.len()
    }

    /// Whether the content is empty.
    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mark_ordering() {
        let v1 = VersionMark::new(1);
        let v2 = VersionMark::new(2);
        assert!(v2.is_newer_than(&v1));
        assert!(!v1.is_newer_than(&v2));
        assert!(!v1.is_newer_than(&v1));
    }

    #[test]
    fn test_tombstone_orders_after_live() {
        let live = VersionMark::new(3);
        let tomb = VersionMark {
            counter: 3,
            tombstone: true,
        };
        assert!(tomb.is_newer_than(&live));
        assert!(!live.is_newer_than(&tomb));
    }

    #[test]
    fn test_entomb_supersedes() {
        let mark = VersionMark::new(5);
        let tomb = mark.entomb();
        assert!(tomb.is_tombstone());
        assert!(tomb.is_newer_than(&mark));
        // A later live write supersedes the tombstone in turn.
        let revived = tomb.next();
        assert!(!revived.is_tombstone());
        assert!(revived.is_newer_than(&tomb));
    }

    #[test]
    fn test_mark_display() {
        assert_eq!(VersionMark::new(3).to_string(), "v3");
        assert_eq!(VersionMark::new(2).entomb().to_string(), "v3-tomb");
    }

    #[test]
    fn test_part_digest_tracks_content() {
        let a = Part::new(VersionMark::initial(), &b"alpha"[..]);
        let b = Part::new(VersionMark::initial(), &b"beta"[..]);
        assert_ne!(a.digest(), b.digest());
        assert_eq!(a.digest(), Part::new(VersionMark::new(9), &b"alpha"[..]).digest());
    }

    #[test]
    fn test_tombstone_part_is_empty() {
        let tomb = Part::tombstone(VersionMark::initial().entomb());
        assert!(tomb.is_tombstone());
        assert!(tomb.is_empty());
    }
}
