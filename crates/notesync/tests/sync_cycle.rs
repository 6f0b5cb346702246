//! Full sync cycles between replicas over the in-memory transport.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio::task::JoinHandle;

use notesync::core::{Item, Part, PartId, VersionMark};
use notesync::proto::{
    verify_between, MemoryNetwork, MemoryTransport, PeerId, SessionState, SyncError, SyncErrorCode,
};
use notesync::store::{MemoryStore, Store};
use notesync::{Replica, ReplicaConfig, ReplicaError, ServeReport};

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

fn client_config() -> ReplicaConfig {
    ReplicaConfig {
        message_timeout: Duration::from_secs(2),
        validate_limits: true,
    }
}

fn server_config() -> ReplicaConfig {
    ReplicaConfig {
        message_timeout: Duration::from_millis(800),
        validate_limits: true,
    }
}

async fn spawn_server(
    network: &Arc<MemoryNetwork>,
    server_id: PeerId,
) -> (
    Arc<Replica<MemoryStore>>,
    JoinHandle<notesync::Result<ServeReport>>,
) {
    let server = Arc::new(Replica::new(server_id, MemoryStore::new(), server_config()));
    let transport = network.create_transport(server_id).await;
    let handle = tokio::spawn({
        let server = Arc::clone(&server);
        async move { server.serve(&transport).await }
    });
    (server, handle)
}

fn client(network_id: u8) -> (PeerId, Replica<MemoryStore>) {
    let peer_id = PeerId::from_bytes([network_id; 32]);
    (
        peer_id,
        Replica::new(peer_id, MemoryStore::new(), client_config()),
    )
}

async fn transport_for(network: &Arc<MemoryNetwork>, peer_id: PeerId) -> MemoryTransport {
    network.create_transport(peer_id).await
}

#[tokio::test]
async fn test_create_push_pull_converges() {
    init_tracing();
    let network = MemoryNetwork::new();
    let server_id = PeerId::from_bytes([0x5e; 32]);
    let (server, server_task) = spawn_server(&network, server_id).await;

    // Alice authors an item and mirrors it to the server.
    let (alice_id, alice) = client(0xa1);
    let alice_transport = transport_for(&network, alice_id).await;

    let item = alice.author_item(
        "meeting-notes",
        vec![
            ("title", Bytes::from_static(b"Weekly sync")),
            ("body", Bytes::from_static(b"- agenda")),
        ],
    );
    let item_id = item.item_id();
    alice
        .create_on(&alice_transport, server_id, item)
        .await
        .unwrap();

    // Alice edits the body and adds a part, then pushes.
    let body_id = alice.part_id(&item_id, "body");
    let tags_id = alice.part_id(&item_id, "tags");
    alice
        .edit_part(&item_id, body_id, Bytes::from_static(b"- agenda\n- notes"))
        .await
        .unwrap();
    alice
        .edit_part(&item_id, tags_id, Bytes::from_static(b"work"))
        .await
        .unwrap();

    let report = alice.push(&alice_transport, server_id, item_id).await.unwrap();
    assert_eq!(report.sent_parts, 2);

    let result = verify_between(server.store(), alice.store(), &item_id)
        .await
        .unwrap();
    assert!(result.is_converged(), "server should match alice: {result:?}");

    // Bob hears about the item id out of band, registers an empty replica,
    // and pulls: the first round fetches the frame, the second the content.
    let (bob_id, bob) = client(0xb0);
    let bob_transport = transport_for(&network, bob_id).await;
    bob.store().create_item(&Item::new(item_id)).await.unwrap();

    let report = bob
        .pull(&bob_transport, server_id, item_id, None)
        .await
        .unwrap();
    assert_eq!(report.received_parts, 3);
    assert!(bob.locally_missing(&item_id).await.unwrap().is_empty());

    let result = verify_between(bob.store(), alice.store(), &item_id)
        .await
        .unwrap();
    assert!(result.is_converged(), "bob should match alice: {result:?}");

    drop(alice_transport);
    drop(bob_transport);
    let report = server_task.await.unwrap().unwrap();
    assert!(report.handled >= 5);
    assert_eq!(report.errors, 0);
}

#[tokio::test]
async fn test_duplicate_create_is_atomic() {
    init_tracing();
    let network = MemoryNetwork::new();
    let server_id = PeerId::from_bytes([0x5e; 32]);
    let (server, server_task) = spawn_server(&network, server_id).await;

    let (alice_id, alice) = client(0xa1);
    let alice_transport = transport_for(&network, alice_id).await;
    let item = alice.author_item("note", vec![("title", Bytes::from_static(b"mine"))]);
    let item_id = item.item_id();
    alice
        .create_on(&alice_transport, server_id, item)
        .await
        .unwrap();

    // Mallory races the same item id with different content.
    let (mallory_id, mallory) = client(0x33);
    let mallory_transport = transport_for(&network, mallory_id).await;
    let dupe = Item::from_parts(
        item_id,
        BTreeMap::from([(
            PartId::derive(&item_id, "payload"),
            Part::new(VersionMark::initial(), Bytes::from_static(b"not mine")),
        )]),
    );

    let err = mallory
        .create_on(&mallory_transport, server_id, dupe)
        .await
        .unwrap_err();
    match err {
        ReplicaError::Sync(SyncError::Peer { code, .. }) => {
            assert_eq!(code, SyncErrorCode::DuplicateItem);
        }
        other => panic!("expected relayed DuplicateItem, got {other:?}"),
    }

    // Neither container changed: mallory rolled back, the server kept the
    // original, and mallory's session is clean for the next cycle.
    assert!(!mallory.store().contains_item(&item_id).await.unwrap());
    let stored = server.store().get_item(&item_id).await.unwrap().unwrap();
    assert!(stored.contains_part(&alice.part_id(&item_id, "title")));
    assert_eq!(stored.part_count(), 1);
    assert_eq!(
        mallory
            .coordinator()
            .session_state(item_id, server_id)
            .await,
        SessionState::Idle
    );

    drop(alice_transport);
    drop(mallory_transport);
    let report = server_task.await.unwrap().unwrap();
    assert_eq!(report.errors, 1);
}

#[tokio::test]
async fn test_tombstone_propagates() {
    init_tracing();
    let network = MemoryNetwork::new();
    let server_id = PeerId::from_bytes([0x5e; 32]);
    let (_server, server_task) = spawn_server(&network, server_id).await;

    let (alice_id, alice) = client(0xa1);
    let alice_transport = transport_for(&network, alice_id).await;
    let item = alice.author_item(
        "note",
        vec![
            ("title", Bytes::from_static(b"keep")),
            ("scratch", Bytes::from_static(b"drop")),
        ],
    );
    let item_id = item.item_id();
    alice
        .create_on(&alice_transport, server_id, item)
        .await
        .unwrap();

    let scratch_id = alice.part_id(&item_id, "scratch");
    let mark = alice.tombstone_part(&item_id, scratch_id).await.unwrap();
    assert!(mark.is_tombstone());

    let report = alice.push(&alice_transport, server_id, item_id).await.unwrap();
    assert_eq!(report.sent_parts, 1);

    // Bob pulls and sees the deletion as an explicit tombstone, not a
    // missing key.
    let (bob_id, bob) = client(0xb0);
    let bob_transport = transport_for(&network, bob_id).await;
    bob.store().create_item(&Item::new(item_id)).await.unwrap();
    bob.pull(&bob_transport, server_id, item_id, None)
        .await
        .unwrap();

    let frame = bob.frame(&item_id).await.unwrap();
    assert!(frame.get(&scratch_id).unwrap().is_tombstone());
    let part = bob.store().get_part(&item_id, &scratch_id).await.unwrap();
    assert!(part.is_tombstone());
    assert!(part.is_empty());

    drop(alice_transport);
    drop(bob_transport);
    server_task.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_pull_with_explicit_ids() {
    init_tracing();
    let network = MemoryNetwork::new();
    let server_id = PeerId::from_bytes([0x5e; 32]);
    let (_server, server_task) = spawn_server(&network, server_id).await;

    let (alice_id, alice) = client(0xa1);
    let alice_transport = transport_for(&network, alice_id).await;
    let item = alice.author_item(
        "note",
        vec![
            ("title", Bytes::from_static(b"t")),
            ("body", Bytes::from_static(b"b")),
        ],
    );
    let item_id = item.item_id();
    alice
        .create_on(&alice_transport, server_id, item)
        .await
        .unwrap();

    let title_id = alice.part_id(&item_id, "title");
    let body_id = alice.part_id(&item_id, "body");

    let (bob_id, bob) = client(0xb0);
    let bob_transport = transport_for(&network, bob_id).await;
    bob.store().create_item(&Item::new(item_id)).await.unwrap();

    let report = bob
        .pull(
            &bob_transport,
            server_id,
            item_id,
            Some(BTreeSet::from([title_id])),
        )
        .await
        .unwrap();
    assert_eq!(report.received_parts, 1);

    // The response frame taught bob about the body without transferring it.
    assert!(bob.store().contains_part(&item_id, &title_id).await.unwrap());
    assert_eq!(
        bob.locally_missing(&item_id).await.unwrap(),
        BTreeSet::from([body_id])
    );

    drop(alice_transport);
    drop(bob_transport);
    server_task.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_timeout_resets_session() {
    init_tracing();
    let network = MemoryNetwork::new();
    let server_id = PeerId::from_bytes([0x5e; 32]);
    // The server's transport exists but nothing serves it.
    let _server_transport = network.create_transport(server_id).await;

    let alice_id = PeerId::from_bytes([0xa1; 32]);
    let alice = Replica::new(
        alice_id,
        MemoryStore::new(),
        ReplicaConfig {
            message_timeout: Duration::from_millis(50),
            validate_limits: true,
        },
    );
    let alice_transport = transport_for(&network, alice_id).await;

    let item = alice.author_item("note", vec![("title", Bytes::from_static(b"t"))]);
    let item_id = item.item_id();

    let err = alice
        .create_on(&alice_transport, server_id, item)
        .await
        .unwrap_err();
    assert!(matches!(err, ReplicaError::Sync(SyncError::Timeout(_))));

    // The failed cycle reset to idle so a later attempt starts cleanly.
    assert_eq!(
        alice.coordinator().session_state(item_id, server_id).await,
        SessionState::Idle
    );
}
