//! Transport abstraction for the sync protocol.
//!
//! The transport is an external collaborator: it carries logical
//! [`SyncMessage`]s between peers and supplies the sender's peer id. How the
//! bytes travel is irrelevant to the protocol core.

use async_trait::async_trait;

use crate::error::SyncError;
use crate::messages::{PeerId, SyncMessage};

/// Result type for transport operations.
pub type Result<T> = std::result::Result<T, SyncError>;

/// Transport trait for sending and receiving sync messages.
///
/// Implementations must be thread-safe (Send + Sync).
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send a message to a specific peer.
    async fn send(&self, peer: &PeerId, message: SyncMessage) -> Result<()>;

    /// Receive the next message from any peer.
    ///
    /// Returns the sender's peer id and the message. Blocks until a message
    /// is available or an error occurs.
    async fn recv(&self) -> Result<(PeerId, SyncMessage)>;

    /// Receive with timeout.
    ///
    /// Returns None if the timeout expires before a message arrives.
    async fn recv_timeout(
        &self,
        timeout: std::time::Duration,
    ) -> Result<Option<(PeerId, SyncMessage)>>;

    /// The local peer's identity.
    fn local_peer_id(&self) -> PeerId;

    /// List currently reachable peers.
    async fn connected_peers(&self) -> Result<Vec<PeerId>>;

    /// Whether a specific peer is reachable.
    async fn is_connected(&self, peer: &PeerId) -> bool;
}

/// A simple in-memory transport for tests and simulations.
///
/// Uses channels to simulate message passing between peers.
pub mod memory {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Arc;
    use tokio::sync::{mpsc, RwLock};

    /// Message envelope for internal routing.
    #[derive(Debug, Clone)]
    struct Envelope {
        from: PeerId,
        message: SyncMessage,
    }

    /// Shared state for the memory transport network.
    pub struct MemoryNetwork {
        /// Sender channels for each peer.
        senders: RwLock<HashMap<PeerId, mpsc::Sender<Envelope>>>,
    }

    impl MemoryNetwork {
        /// Create a new memory network.
        pub fn new() -> Arc<Self> {
            Arc::new(Self {
                senders: RwLock::new(HashMap::new()),
            })
        }

        /// Create a transport connected to this network.
        pub async fn create_transport(self: &Arc<Self>, peer_id: PeerId) -> MemoryTransport {
            let (tx, rx) = mpsc::channel(1000);

            self.senders.write().await.insert(peer_id, tx);

            MemoryTransport {
                peer_id,
                network: Arc::clone(self),
                receiver: RwLock::new(rx),
            }
        }
    }

    impl Default for MemoryNetwork {
        fn default() -> Self {
            Self {
                senders: RwLock::new(HashMap::new()),
            }
        }
    }

    /// In-memory transport implementation.
    pub struct MemoryTransport {
        peer_id: PeerId,
        network: Arc<MemoryNetwork>,
        receiver: RwLock<mpsc::Receiver<Envelope>>,
    }

    #[async_trait]
    impl Transport for MemoryTransport {
        async fn send(&self, peer: &PeerId, message: SyncMessage) -> Result<()> {
            let senders = self.network.senders.read().await;
            let sender = senders
                .get(peer)
                .ok_or_else(|| SyncError::Transport("peer not found".into()))?;
            let envelope = Envelope {
                from: self.peer_id,
                message,
            };
            sender
                .send(envelope)
                .await
                .map_err(|_| SyncError::Transport("peer disconnected".into()))
        }

        async fn recv(&self) -> Result<(PeerId, SyncMessage)> {
            let mut rx = self.receiver.write().await;
            match rx.recv().await {
                Some(envelope) => Ok((envelope.from, envelope.message)),
                None => Err(SyncError::Transport("channel closed".into())),
            }
        }

        async fn recv_timeout(
            &self,
            timeout: std::time::Duration,
        ) -> Result<Option<(PeerId, SyncMessage)>> {
            let mut rx = self.receiver.write().await;
            match tokio::time::timeout(timeout, rx.recv()).await {
                Ok(Some(envelope)) => Ok(Some((envelope.from, envelope.message))),
                Ok(None) => Err(SyncError::Transport("channel closed".into())),
                Err(_) => Ok(None), // Timeout
            }
        }

        fn local_peer_id(&self) -> PeerId {
            self.peer_id
        }

        async fn connected_peers(&self) -> Result<Vec<PeerId>> {
            let senders = self.network.senders.read().await;
            Ok(senders
                .keys()
                .filter(|id| *id != &self.peer_id)
                .copied()
                .collect())
        }

        async fn is_connected(&self, peer: &PeerId) -> bool {
            let senders = self.network.senders.read().await;
            senders.contains_key(peer)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::memory::MemoryNetwork;
    use super::*;
    use notesync_core::ItemId;
    use std::time::Duration;

    #[tokio::test]
    async fn test_memory_transport_send_recv() {
        let network = MemoryNetwork::new();

        let client = PeerId::from_bytes([0xc1; 32]);
        let server = PeerId::from_bytes([0x5e; 32]);

        let transport_client = network.create_transport(client).await;
        let transport_server = network.create_transport(server).await;

        let item_id = ItemId::from_bytes([1; 32]);
        transport_client
            .send(&server, SyncMessage::CreateNoteAck { item_id })
            .await
            .unwrap();

        let (from, received) = transport_server.recv().await.unwrap();
        assert_eq!(from, client);
        assert_eq!(received.item_id(), item_id);
    }

    #[tokio::test]
    async fn test_memory_transport_timeout() {
        let network = MemoryNetwork::new();
        let peer = PeerId::from_bytes([0xaa; 32]);
        let transport = network.create_transport(peer).await;

        let result = transport
            .recv_timeout(Duration::from_millis(10))
            .await
            .unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_memory_transport_unknown_peer() {
        let network = MemoryNetwork::new();
        let peer = PeerId::from_bytes([0xaa; 32]);
        let transport = network.create_transport(peer).await;

        let err = transport
            .send(
                &PeerId::from_bytes([0xbb; 32]),
                SyncMessage::CreateNoteAck {
                    item_id: ItemId::ZERO,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::Transport(_)));
    }

    #[tokio::test]
    async fn test_memory_transport_connected_peers() {
        let network = MemoryNetwork::new();
        let a = PeerId::from_bytes([0xaa; 32]);
        let b = PeerId::from_bytes([0xbb; 32]);

        let transport_a = network.create_transport(a).await;
        let _transport_b = network.create_transport(b).await;

        assert!(transport_a.is_connected(&b).await);
        assert_eq!(transport_a.connected_peers().await.unwrap(), vec![b]);
    }
}
