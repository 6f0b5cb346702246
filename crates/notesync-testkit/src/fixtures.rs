//! Test fixtures and helpers.
//!
//! Common setup code for integration tests and multi-peer simulations.

use bytes::Bytes;

use notesync::{Replica, ReplicaConfig};
use notesync_core::{Item, ItemId, Part, PartId, VersionMark};
use notesync_proto::PeerId;
use notesync_store::MemoryStore;

/// A test fixture with a peer identity and a memory-backed replica.
pub struct TestFixture {
    pub peer_id: PeerId,
    pub replica: Replica<MemoryStore>,
}

impl TestFixture {
    /// Create a fixture with a random peer identity.
    pub fn new() -> Self {
        Self::with_peer(PeerId::random())
    }

    /// Create a fixture with a deterministic identity from a seed.
    pub fn with_seed(seed: [u8; 32]) -> Self {
        Self::with_peer(PeerId::from_bytes(seed))
    }

    fn with_peer(peer_id: PeerId) -> Self {
        Self {
            peer_id,
            replica: Replica::new(peer_id, MemoryStore::new(), ReplicaConfig::default()),
        }
    }

    /// The item id this fixture's peer gives a name.
    pub fn item_id(&self, name: &str) -> ItemId {
        ItemId::derive(self.peer_id.as_bytes(), name)
    }

    /// Derive a part id within one of this fixture's items.
    pub fn part_id(&self, item_id: &ItemId, part_name: &str) -> PartId {
        PartId::derive(item_id, part_name)
    }

    /// Author an item from named string parts, all at their first version.
    pub fn make_item(&self, name: &str, parts: &[(&str, &str)]) -> Item {
        self.replica.author_item(
            name,
            parts
                .iter()
                .map(|(part_name, content)| {
                    (*part_name, Bytes::copy_from_slice(content.as_bytes()))
                })
                .collect(),
        )
    }

    /// A standalone part at the given version counter.
    pub fn make_part(counter: u64, content: &str) -> Part {
        Part::new(
            VersionMark::new(counter),
            Bytes::copy_from_slice(content.as_bytes()),
        )
    }
}

impl Default for TestFixture {
    fn default() -> Self {
        Self::new()
    }
}

/// Create multiple fixtures with distinct deterministic identities, for
/// multi-client scenarios.
pub fn multi_peer_fixtures(count: usize) -> Vec<TestFixture> {
    (0..count)
        .map(|i| {
            let mut seed = [0u8; 32];
            seed[0] = i as u8;
            TestFixture::with_seed(seed)
        })
        .collect()
}
