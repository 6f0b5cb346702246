//! The Replica: unified API over a store and the sync protocol.
//!
//! A replica authors items locally, drives full sync cycles against the
//! server over a transport, and serves the counter-peer role for incoming
//! messages.

use std::collections::BTreeSet;
use std::sync::Arc;

use bytes::Bytes;

use notesync_core::{Frame, Item, ItemId, Part, PartId, VersionMark};
use notesync_proto::{
    PeerId, SessionState, SyncCoordinator, SyncError, SyncMessage, Transport,
};
use notesync_store::{Store, StoreError};

use crate::error::{ReplicaError, Result};

/// Configuration for a replica.
#[derive(Debug, Clone)]
pub struct ReplicaConfig {
    /// Timeout for waiting on counter-peer messages.
    pub message_timeout: std::time::Duration,
    /// Whether to check message size limits before handling.
    pub validate_limits: bool,
}

impl Default for ReplicaConfig {
    fn default() -> Self {
        Self {
            message_timeout: std::time::Duration::from_secs(30),
            validate_limits: true,
        }
    }
}

/// Result of one driven sync cycle.
#[derive(Debug, Default, Clone)]
pub struct SyncReport {
    /// Parts sent to the counter-peer.
    pub sent_parts: usize,
    /// Parts received from the counter-peer.
    pub received_parts: usize,
    /// Messages exchanged.
    pub messages: usize,
}

/// Result of a serve loop.
#[derive(Debug, Default, Clone)]
pub struct ServeReport {
    /// Messages handled before going idle.
    pub handled: usize,
    /// Error replies sent.
    pub errors: usize,
}

/// A peer replica: an identity, an item store, and the protocol machinery.
pub struct Replica<S> {
    peer_id: PeerId,
    store: Arc<S>,
    coordinator: SyncCoordinator<S>,
    config: ReplicaConfig,
}

impl<S: Store> Replica<S> {
    /// Create a replica over a store.
    pub fn new(peer_id: PeerId, store: S, config: ReplicaConfig) -> Self {
        let store = Arc::new(store);
        Self {
            peer_id,
            coordinator: SyncCoordinator::new(Arc::clone(&store)),
            store,
            config,
        }
    }

    /// This replica's identity.
    pub fn peer_id(&self) -> PeerId {
        self.peer_id
    }

    /// The underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// The protocol coordinator.
    pub fn coordinator(&self) -> &SyncCoordinator<S> {
        &self.coordinator
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Authoring
    // ─────────────────────────────────────────────────────────────────────────

    /// Build a new item from named parts, all at their first version.
    ///
    /// The item is not stored yet; registration happens through
    /// [`Replica::create_on`] so that both containers change or neither
    /// does.
    pub fn author_item(&self, name: &str, parts: Vec<(&str, Bytes)>) -> Item {
        let item_id = ItemId::derive(self.peer_id.as_bytes(), name);
        let parts = parts
            .into_iter()
            .map(|(part_name, content)| {
                (
                    PartId::derive(&item_id, part_name),
                    Part::new(VersionMark::initial(), content),
                )
            })
            .collect();
        Item::from_parts(item_id, parts)
    }

    /// The id a part of one of this replica's items would have.
    pub fn part_id(&self, item_id: &ItemId, part_name: &str) -> PartId {
        PartId::derive(item_id, part_name)
    }

    /// Write a new version of a part locally.
    pub async fn edit_part(
        &self,
        item_id: &ItemId,
        part_id: PartId,
        content: impl Into<Bytes>,
    ) -> Result<VersionMark> {
        let frame = self
            .store
            .get_frame(item_id)
            .await?
            .ok_or(ReplicaError::ItemNotFound(*item_id))?;
        let mark = frame
            .get(&part_id)
            .map(|m| m.next())
            .unwrap_or_else(VersionMark::initial);
        self.store
            .put_part(item_id, part_id, Part::new(mark, content))
            .await?;
        Ok(mark)
    }

    /// Tombstone a part locally: its next version is an explicit deletion
    /// marker, never a removed key.
    pub async fn tombstone_part(&self, item_id: &ItemId, part_id: PartId) -> Result<VersionMark> {
        let frame = self
            .store
            .get_frame(item_id)
            .await?
            .ok_or(ReplicaError::ItemNotFound(*item_id))?;
        let current = frame.get(&part_id).ok_or(StoreError::PartNotFound {
            item_id: *item_id,
            part_id,
        })?;
        let mark = current.entomb();
        self.store
            .put_part(item_id, part_id, Part::tombstone(mark))
            .await?;
        Ok(mark)
    }

    /// An item's current frame.
    pub async fn frame(&self, item_id: &ItemId) -> Result<Frame> {
        self.store
            .get_frame(item_id)
            .await?
            .ok_or(ReplicaError::ItemNotFound(*item_id))
    }

    /// Part ids the frame records but whose content this replica lacks.
    pub async fn locally_missing(&self, item_id: &ItemId) -> Result<BTreeSet<PartId>> {
        let item = self
            .store
            .get_item(item_id)
            .await?
            .ok_or(ReplicaError::ItemNotFound(*item_id))?;
        Ok(item.unheld_parts())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Client role: driving cycles
    // ─────────────────────────────────────────────────────────────────────────

    /// Register an item here and mirror it to the server, atomically: a
    /// duplicate on either side fails the cycle and leaves both containers
    /// unchanged.
    pub async fn create_on<T: Transport>(
        &self,
        transport: &T,
        server: PeerId,
        item: Item,
    ) -> Result<SyncReport> {
        let item_id = item.item_id();
        let outcome = self.coordinator.request_create(server, item).await?;
        let mut report = SyncReport::default();
        self.drive(transport, server, item_id, outcome, &mut report)
            .await?;
        Ok(report)
    }

    /// Run one needs/upload cycle: ask the server what it needs out of our
    /// servable frame, then upload exactly that.
    pub async fn push<T: Transport>(
        &self,
        transport: &T,
        server: PeerId,
        item_id: ItemId,
    ) -> Result<SyncReport> {
        let outcome = self.coordinator.request_needs(server, item_id).await?;
        let mut report = SyncReport::default();
        self.drive(transport, server, item_id, outcome, &mut report)
            .await?;
        Ok(report)
    }

    /// Pull part content from the server.
    ///
    /// With explicit `part_ids`, runs a single download cycle. Without, it
    /// fetches whatever the local frame knows is missing; when the server's
    /// response reveals parts this replica had never heard of, a second
    /// round fetches those too.
    pub async fn pull<T: Transport>(
        &self,
        transport: &T,
        server: PeerId,
        item_id: ItemId,
        part_ids: Option<BTreeSet<PartId>>,
    ) -> Result<SyncReport> {
        let mut report = SyncReport::default();
        let explicit = part_ids.is_some();

        for _round in 0..2 {
            let wanted = match &part_ids {
                Some(ids) => ids.clone(),
                None => self.locally_missing(&item_id).await?,
            };
            let outcome = self
                .coordinator
                .request_download(server, item_id, wanted)
                .await?;
            self.drive(transport, server, item_id, outcome, &mut report)
                .await?;

            if explicit || self.locally_missing(&item_id).await?.is_empty() {
                break;
            }
        }
        Ok(report)
    }

    /// Send outgoing messages and feed responses back into the coordinator
    /// until the session returns to idle.
    async fn drive<T: Transport>(
        &self,
        transport: &T,
        server: PeerId,
        item_id: ItemId,
        mut outcome: notesync_proto::HandleOutcome,
        report: &mut SyncReport,
    ) -> Result<()> {
        loop {
            if let Some(message) = outcome.reply.take() {
                if let SyncMessage::PartsUpload { ref parts, .. } = message {
                    report.sent_parts += parts.len();
                }
                report.messages += 1;
                transport.send(&server, message).await?;
            }
            if outcome.state == SessionState::Idle {
                return Ok(());
            }

            let received = transport.recv_timeout(self.config.message_timeout).await?;
            let (from, response) = match received {
                Some(pair) => pair,
                None => {
                    // Reset so the next attempt starts cleanly.
                    self.coordinator.abort(item_id, server).await;
                    return Err(SyncError::Timeout(format!(
                        "waiting for response about item {item_id}"
                    ))
                    .into());
                }
            };
            if from != server || response.item_id() != item_id {
                // Not part of this cycle; leave it for whoever drives it.
                continue;
            }
            report.messages += 1;
            if let SyncMessage::DownloadResponse { ref parts, .. } = response {
                report.received_parts += parts.len();
            }
            outcome = self.coordinator.receive(from, response).await?;
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Server role: reacting to messages
    // ─────────────────────────────────────────────────────────────────────────

    /// Handle one incoming message, producing the reply to send back.
    ///
    /// Failures become `Error` replies so the counter-peer sees the specific
    /// cause; a relayed peer error is terminal and produces no reply.
    pub async fn handle_message(&self, from: PeerId, message: SyncMessage) -> Option<SyncMessage> {
        if self.config.validate_limits {
            if let Err(reason) = message.validate_limits() {
                return Some(SyncMessage::Error {
                    item_id: message.item_id(),
                    code: notesync_proto::SyncErrorCode::InvalidMessage,
                    message: reason.to_string(),
                });
            }
        }

        let item_id = message.item_id();
        match self.coordinator.receive(from, message).await {
            Ok(outcome) => outcome.reply,
            Err(SyncError::Peer { code, message }) => {
                tracing::warn!(item = %item_id, peer = %from, ?code, %message, "cycle failed on peer error");
                None
            }
            Err(e) => {
                tracing::warn!(item = %item_id, peer = %from, error = %e, "message handling failed");
                Some(SyncMessage::Error {
                    item_id,
                    code: e.code(),
                    message: e.to_string(),
                })
            }
        }
    }

    /// Receive and handle messages until the transport goes idle for the
    /// configured timeout.
    pub async fn serve<T: Transport>(&self, transport: &T) -> Result<ServeReport> {
        let mut report = ServeReport::default();
        loop {
            let received = transport.recv_timeout(self.config.message_timeout).await?;
            match received {
                Some((from, message)) => {
                    report.handled += 1;
                    if let Some(reply) = self.handle_message(from, message).await {
                        if matches!(reply, SyncMessage::Error { .. }) {
                            report.errors += 1;
                        }
                        transport.send(&from, reply).await?;
                    }
                }
                None => break, // idle; peers are done for now
            }
        }
        Ok(report)
    }
}
