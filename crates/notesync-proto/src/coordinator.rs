//! Synchronization coordinator: routes protocol events to sessions.
//!
//! The coordinator owns one independent state machine per (item, peer) pair,
//! created lazily on first contact. It plays both roles: as initiator it
//! starts cycles and advances them on responses; as responder it reacts to
//! the counter-peer's messages against the local store.
//!
//! At most one cycle is in flight per pair: a second `request_*` while a
//! session is not idle fails `SessionBusy` rather than silently
//! interleaving.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Arc, Mutex, RwLock};

use tokio::sync::Mutex as AsyncMutex;

use notesync_core::{missing_parts, Frame, Item, ItemId, Part, PartId};
use notesync_store::{CreateResult, Store};

use crate::error::{Result, SyncError};
use crate::messages::{PeerId, SyncErrorCode, SyncMessage};
use crate::session::{SessionState, SyncSession};

/// Key of one synchronization direction: one item, one counter-peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionKey {
    pub item_id: ItemId,
    pub peer_id: PeerId,
}

impl SessionKey {
    /// Build a key.
    pub fn new(item_id: ItemId, peer_id: PeerId) -> Self {
        Self { item_id, peer_id }
    }
}

/// A protocol event: a local intent or an incoming message.
#[derive(Debug)]
pub enum SyncEvent {
    /// Initiate a cycle toward a peer.
    Initiate {
        /// The counter-peer.
        peer_id: PeerId,
        /// What to do.
        intent: SyncIntent,
    },
    /// React to a message from a peer.
    Receive {
        /// The sending peer, from the transport envelope.
        from: PeerId,
        /// The message.
        message: SyncMessage,
    },
}

/// Local intents that start a cycle.
#[derive(Debug)]
pub enum SyncIntent {
    /// Register a freshly authored item here and mirror it to the peer.
    CreateItem(Item),
    /// Report our servable frame and upload whatever the peer needs.
    PushNeeds { item_id: ItemId },
    /// Pull content for the given parts from the peer.
    Download {
        item_id: ItemId,
        part_ids: BTreeSet<PartId>,
    },
}

/// What a handled event produced.
#[derive(Debug)]
pub struct HandleOutcome {
    /// Session state for the (item, peer) pair after the event. Responder
    /// reactions carry no session; they report `Idle`.
    pub state: SessionState,
    /// Message to send to the counter-peer, if any.
    pub reply: Option<SyncMessage>,
}

impl HandleOutcome {
    fn idle(reply: Option<SyncMessage>) -> Self {
        Self {
            state: SessionState::Idle,
            reply,
        }
    }
}

/// Orchestrates sync sessions over a shared store.
pub struct SyncCoordinator<S> {
    store: Arc<S>,
    sessions: Mutex<HashMap<SessionKey, Arc<AsyncMutex<SyncSession>>>>,
    /// Last frame learned about each counter-peer's replica of an item.
    remote_frames: RwLock<HashMap<SessionKey, Frame>>,
    /// Need sets served to peers, awaiting their upload.
    served_needs: Mutex<HashMap<SessionKey, BTreeSet<PartId>>>,
}

impl<S: Store> SyncCoordinator<S> {
    /// Create a coordinator over a store.
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            sessions: Mutex::new(HashMap::new()),
            remote_frames: RwLock::new(HashMap::new()),
            served_needs: Mutex::new(HashMap::new()),
        }
    }

    /// The underlying store.
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    fn session(&self, key: SessionKey) -> Arc<AsyncMutex<SyncSession>> {
        self.sessions
            .lock()
            .unwrap()
            .entry(key)
            .or_insert_with(|| Arc::new(AsyncMutex::new(SyncSession::new(key.item_id, key.peer_id))))
            .clone()
    }

    /// Current state of the session for an (item, peer) pair.
    pub async fn session_state(&self, item_id: ItemId, peer_id: PeerId) -> SessionState {
        self.session(SessionKey::new(item_id, peer_id))
            .lock()
            .await
            .state()
    }

    /// Abort the in-flight cycle for an (item, peer) pair.
    ///
    /// Discards pending need sets; committed item data is untouched.
    pub async fn abort(&self, item_id: ItemId, peer_id: PeerId) {
        self.session(SessionKey::new(item_id, peer_id))
            .lock()
            .await
            .abort();
    }

    fn remote_frame(&self, key: &SessionKey) -> Frame {
        self.remote_frames
            .read()
            .unwrap()
            .get(key)
            .cloned()
            .unwrap_or_default()
    }

    fn merge_remote_frame(&self, key: SessionKey, delta: &Frame) {
        self.remote_frames
            .write()
            .unwrap()
            .entry(key)
            .or_default()
            .merge(delta);
    }

    /// Route a protocol event to the right session.
    pub async fn handle(&self, event: SyncEvent) -> Result<HandleOutcome> {
        match event {
            SyncEvent::Initiate { peer_id, intent } => match intent {
                SyncIntent::CreateItem(item) => self.request_create(peer_id, item).await,
                SyncIntent::PushNeeds { item_id } => self.request_needs(peer_id, item_id).await,
                SyncIntent::Download { item_id, part_ids } => {
                    self.request_download(peer_id, item_id, part_ids).await
                }
            },
            SyncEvent::Receive { from, message } => self.receive(from, message).await,
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Initiator: starting cycles
    // ─────────────────────────────────────────────────────────────────────────

    /// Register a freshly authored item locally and emit the mirroring
    /// `CreateNote`.
    ///
    /// Fails `DuplicateItem` with nothing changed when the id is already
    /// registered here; a peer-side duplicate is rolled back when its error
    /// reply arrives, so both containers change or neither does.
    pub async fn request_create(&self, peer_id: PeerId, item: Item) -> Result<HandleOutcome> {
        let item_id = item.item_id();
        let key = SessionKey::new(item_id, peer_id);
        let session = self.session(key);
        let mut session = session.lock().await;

        session.begin_create()?;
        match self.store.create_item(&item).await {
            Ok(CreateResult::Created) => {}
            Ok(CreateResult::AlreadyExists) => {
                session.abort();
                return Err(SyncError::DuplicateItem(item_id));
            }
            Err(e) => {
                session.abort();
                return Err(e.into());
            }
        }

        // No further ack follows the CreateNoteAck, so record the mirrored
        // frame now.
        self.merge_remote_frame(key, item.frame());
        tracing::debug!(item = %item_id, peer = %peer_id, "create note requested");

        Ok(HandleOutcome {
            state: session.state(),
            reply: Some(SyncMessage::CreateNote {
                item_id,
                frame: item.frame().clone(),
                parts: item.parts().map(|(id, p)| (*id, p.clone())).collect(),
            }),
        })
    }

    /// Start a needs cycle: report the sub-frame we can serve and predict
    /// the need set the peer will compute from it.
    pub async fn request_needs(&self, peer_id: PeerId, item_id: ItemId) -> Result<HandleOutcome> {
        let key = SessionKey::new(item_id, peer_id);
        let session = self.session(key);
        let mut session = session.lock().await;

        let local = self
            .store
            .get_frame(&item_id)
            .await?
            .ok_or(SyncError::ItemNotFound(item_id))?;
        let held = self.store.part_ids(&item_id).await?;
        // Only advertise parts we can actually serve.
        let report = local.restricted_to(&held);
        let predicted = missing_parts(&self.remote_frame(&key), &report);

        session.begin_needs(predicted)?;
        tracing::debug!(item = %item_id, peer = %peer_id, "needs query requested");

        Ok(HandleOutcome {
            state: session.state(),
            reply: Some(SyncMessage::NeedsQuery {
                item_id,
                frame: report,
            }),
        })
    }

    /// Start a download cycle for explicit part ids.
    pub async fn request_download(
        &self,
        peer_id: PeerId,
        item_id: ItemId,
        part_ids: BTreeSet<PartId>,
    ) -> Result<HandleOutcome> {
        let key = SessionKey::new(item_id, peer_id);
        let session = self.session(key);
        let mut session = session.lock().await;

        if !self.store.contains_item(&item_id).await? {
            return Err(SyncError::ItemNotFound(item_id));
        }
        session.begin_download(part_ids.clone())?;
        tracing::debug!(item = %item_id, peer = %peer_id, count = part_ids.len(), "download requested");

        Ok(HandleOutcome {
            state: session.state(),
            reply: Some(SyncMessage::DownloadQuery { item_id, part_ids }),
        })
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Message routing
    // ─────────────────────────────────────────────────────────────────────────

    /// React to an incoming message, as responder or initiator.
    pub async fn receive(&self, from: PeerId, message: SyncMessage) -> Result<HandleOutcome> {
        match message {
            SyncMessage::CreateNote {
                item_id,
                frame,
                parts,
            } => self.on_create_note(from, item_id, frame, parts).await,
            SyncMessage::NeedsQuery { item_id, frame } => {
                self.on_needs_query(from, item_id, frame).await
            }
            SyncMessage::PartsUpload {
                item_id,
                frame_delta,
                parts,
            } => self.on_parts_upload(from, item_id, frame_delta, parts).await,
            SyncMessage::DownloadQuery { item_id, part_ids } => {
                self.on_download_query(from, item_id, part_ids).await
            }
            SyncMessage::CreateNoteAck { item_id } => self.on_create_ack(from, item_id).await,
            SyncMessage::NeedsResponse { item_id, need_set } => {
                self.on_needs_response(from, item_id, need_set).await
            }
            SyncMessage::DownloadResponse {
                item_id,
                frame,
                parts,
            } => {
                self.on_download_response(from, item_id, frame, parts)
                    .await
            }
            SyncMessage::Error {
                item_id,
                code,
                message,
            } => self.on_peer_error(from, item_id, code, message).await,
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Responder reactions
    // ─────────────────────────────────────────────────────────────────────────

    async fn on_create_note(
        &self,
        from: PeerId,
        item_id: ItemId,
        frame: Frame,
        parts: BTreeMap<PartId, Part>,
    ) -> Result<HandleOutcome> {
        let key = SessionKey::new(item_id, from);
        let item = Item::from_frame(item_id, frame.clone(), parts)
            .map_err(|e| SyncError::InvalidMessage(format!("malformed CreateNote: {e}")))?;

        match self.store.create_item(&item).await? {
            CreateResult::AlreadyExists => Err(SyncError::DuplicateItem(item_id)),
            CreateResult::Created => {
                self.merge_remote_frame(key, &frame);
                tracing::debug!(item = %item_id, peer = %from, "item registered");
                Ok(HandleOutcome::idle(Some(SyncMessage::CreateNoteAck {
                    item_id,
                })))
            }
        }
    }

    async fn on_needs_query(
        &self,
        from: PeerId,
        item_id: ItemId,
        reported: Frame,
    ) -> Result<HandleOutcome> {
        let key = SessionKey::new(item_id, from);
        let local = self
            .store
            .get_frame(&item_id)
            .await?
            .ok_or(SyncError::ItemNotFound(item_id))?;

        // What we still need out of what the reporter can serve.
        let needs = missing_parts(&local, &reported);
        self.merge_remote_frame(key, &reported);
        self.served_needs.lock().unwrap().insert(key, needs.clone());
        tracing::debug!(item = %item_id, peer = %from, needs = needs.len(), "needs computed");

        Ok(HandleOutcome::idle(Some(SyncMessage::NeedsResponse {
            item_id,
            need_set: needs,
        })))
    }

    async fn on_parts_upload(
        &self,
        from: PeerId,
        item_id: ItemId,
        frame_delta: Frame,
        parts: BTreeMap<PartId, Part>,
    ) -> Result<HandleOutcome> {
        let key = SessionKey::new(item_id, from);
        // One shot per served need set; a failed upload requires a fresh
        // needs cycle.
        let expected = self
            .served_needs
            .lock()
            .unwrap()
            .remove(&key)
            .unwrap_or_default();
        let got: BTreeSet<PartId> = parts.keys().copied().collect();

        if let Some(extra) = got.difference(&expected).next() {
            tracing::warn!(item = %item_id, peer = %from, part = %extra, "unsolicited part in upload");
            return Err(SyncError::UnsolicitedPart { part_id: *extra });
        }
        let missing: BTreeSet<PartId> = expected.difference(&got).copied().collect();
        if !missing.is_empty() {
            tracing::warn!(item = %item_id, peer = %from, count = missing.len(), "incomplete upload");
            return Err(SyncError::IncompleteUpload { missing });
        }

        // Frame merge and part writes are atomic per item inside the store.
        self.store
            .apply_update(&item_id, &frame_delta, parts)
            .await?;
        self.merge_remote_frame(key, &frame_delta);
        tracing::debug!(item = %item_id, peer = %from, count = got.len(), "upload applied");

        Ok(HandleOutcome::idle(None))
    }

    async fn on_download_query(
        &self,
        from: PeerId,
        item_id: ItemId,
        part_ids: BTreeSet<PartId>,
    ) -> Result<HandleOutcome> {
        let key = SessionKey::new(item_id, from);
        let frame = self
            .store
            .get_frame(&item_id)
            .await?
            .ok_or(SyncError::ItemNotFound(item_id))?;
        // Missing content is an error for the requester to see, never an
        // empty default.
        let parts = self.store.get_parts(&item_id, &part_ids).await?;

        self.merge_remote_frame(key, &frame.restricted_to(&part_ids));
        tracing::debug!(item = %item_id, peer = %from, count = part_ids.len(), "download served");

        Ok(HandleOutcome::idle(Some(SyncMessage::DownloadResponse {
            item_id,
            frame,
            parts,
        })))
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Initiator reactions
    // ─────────────────────────────────────────────────────────────────────────

    async fn on_create_ack(&self, from: PeerId, item_id: ItemId) -> Result<HandleOutcome> {
        let key = SessionKey::new(item_id, from);
        let session = self.session(key);
        let mut session = session.lock().await;

        session.complete_create()?;
        tracing::debug!(item = %item_id, peer = %from, "create acknowledged");
        Ok(HandleOutcome {
            state: session.state(),
            reply: None,
        })
    }

    async fn on_needs_response(
        &self,
        from: PeerId,
        item_id: ItemId,
        need_set: BTreeSet<PartId>,
    ) -> Result<HandleOutcome> {
        let key = SessionKey::new(item_id, from);
        let session = self.session(key);
        let mut session = session.lock().await;

        match session.confirm_needs(&need_set) {
            Ok(()) => {}
            Err(err @ SyncError::NeedSetMismatch { .. }) => {
                // Data-level disagreement: fail the cycle, reset to idle, and
                // re-anchor our belief about the peer so the next cycle's
                // prediction matches what it actually computes.
                session.abort();
                if let Some(local) = self.store.get_frame(&item_id).await? {
                    let not_needed: BTreeSet<PartId> = local
                        .part_ids()
                        .difference(&need_set)
                        .copied()
                        .collect();
                    self.remote_frames
                        .write()
                        .unwrap()
                        .insert(key, local.restricted_to(&not_needed));
                }
                tracing::warn!(item = %item_id, peer = %from, "need set mismatch");
                return Err(err);
            }
            Err(err) => return Err(err),
        }

        if need_set.is_empty() {
            // Nothing to upload; the cycle completes here.
            session.take_upload(&BTreeSet::new())?;
            return Ok(HandleOutcome {
                state: session.state(),
                reply: None,
            });
        }

        let upload = self.build_upload(&item_id, &need_set).await;
        let (frame_delta, parts) = match upload {
            Ok(v) => v,
            Err(e) => {
                session.abort();
                return Err(e);
            }
        };

        session.take_upload(&need_set)?;
        // There is no upload ack; advance our belief optimistically. A later
        // mismatch aborts that cycle and resynchronizes the belief.
        self.merge_remote_frame(key, &frame_delta);
        tracing::debug!(item = %item_id, peer = %from, count = need_set.len(), "uploading needed parts");

        Ok(HandleOutcome {
            state: session.state(),
            reply: Some(SyncMessage::PartsUpload {
                item_id,
                frame_delta,
                parts,
            }),
        })
    }

    async fn build_upload(
        &self,
        item_id: &ItemId,
        need_set: &BTreeSet<PartId>,
    ) -> Result<(Frame, BTreeMap<PartId, Part>)> {
        let local = self
            .store
            .get_frame(item_id)
            .await?
            .ok_or(SyncError::ItemNotFound(*item_id))?;
        let parts = self.store.get_parts(item_id, need_set).await?;
        Ok((local.restricted_to(need_set), parts))
    }

    async fn on_download_response(
        &self,
        from: PeerId,
        item_id: ItemId,
        frame: Frame,
        parts: BTreeMap<PartId, Part>,
    ) -> Result<HandleOutcome> {
        let key = SessionKey::new(item_id, from);
        let session = self.session(key);
        let mut session = session.lock().await;

        let got: BTreeSet<PartId> = parts.keys().copied().collect();
        match session.complete_download(&got) {
            Ok(()) => {}
            Err(err @ SyncError::NeedSetMismatch { .. }) => {
                session.abort();
                tracing::warn!(item = %item_id, peer = %from, "download set mismatch");
                return Err(err);
            }
            Err(err) => return Err(err),
        }

        // The response frame covers the served parts, so the merge and the
        // writes land together, atomically per item.
        self.store.apply_update(&item_id, &frame, parts).await?;
        self.merge_remote_frame(key, &frame);
        tracing::debug!(item = %item_id, peer = %from, count = got.len(), "download applied");

        Ok(HandleOutcome {
            state: session.state(),
            reply: None,
        })
    }

    async fn on_peer_error(
        &self,
        from: PeerId,
        item_id: ItemId,
        code: SyncErrorCode,
        message: String,
    ) -> Result<HandleOutcome> {
        let key = SessionKey::new(item_id, from);
        let session = self.session(key);
        let mut session = session.lock().await;

        if session.state() == SessionState::CreatingItem {
            // The mirror failed: roll back this cycle's local registration so
            // neither container keeps the item.
            self.store.remove_item(&item_id).await?;
            self.remote_frames.write().unwrap().remove(&key);
            tracing::warn!(item = %item_id, peer = %from, "create rolled back after peer error");
        }
        session.abort();
        tracing::warn!(item = %item_id, peer = %from, ?code, %message, "peer reported error");

        Err(SyncError::Peer { code, message })
    }
}
