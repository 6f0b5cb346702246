//! The per-(item, peer) sync session state machine.
//!
//! One session sequences one item's synchronization with one counter-peer.
//! Each direction of negotiation is a distinct session instance, owned by
//! the coordinator of the peer that initiates it. A session returns to
//! `Idle` after every complete request/response round and is reused across
//! cycles.
//!
//! Illegal transitions are typed errors, never panics: a `begin_*` from a
//! non-idle session is `SessionBusy` (transient), and a response arriving in
//! the wrong state is `ProtocolViolation` (a lost or duplicated message).

use std::collections::BTreeSet;

use notesync_core::{ItemId, PartId};

use crate::error::{Result, SyncError};
use crate::messages::PeerId;

/// Observable states of a sync session.
///
/// Upload and download application are atomic within a single transition,
/// so the transfer itself is not an observable state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No cycle in flight. Initial and terminal state of every cycle.
    Idle,
    /// CreateNote sent; awaiting the acknowledgment.
    CreatingItem,
    /// NeedsQuery sent; awaiting the computed need set.
    AwaitingNeedsResponse,
    /// Need set confirmed; the upload may proceed.
    NeedsKnown,
    /// DownloadQuery sent; awaiting content.
    AwaitingDownloadAck,
}

/// The state machine driving one item's sync with one counter-peer.
#[derive(Debug, Clone)]
pub struct SyncSession {
    item_id: ItemId,
    peer_id: PeerId,
    state: SessionState,
    pending_need_set: BTreeSet<PartId>,
    pending_download: BTreeSet<PartId>,
}

impl SyncSession {
    /// A fresh idle session for an (item, peer) pair.
    pub fn new(item_id: ItemId, peer_id: PeerId) -> Self {
        Self {
            item_id,
            peer_id,
            state: SessionState::Idle,
            pending_need_set: BTreeSet::new(),
            pending_download: BTreeSet::new(),
        }
    }

    /// The item this session synchronizes.
    pub fn item_id(&self) -> ItemId {
        self.item_id
    }

    /// The counter-peer.
    pub fn peer_id(&self) -> PeerId {
        self.peer_id
    }

    /// Current state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Whether a new cycle may start.
    pub fn is_idle(&self) -> bool {
        self.state == SessionState::Idle
    }

    /// The need set computed when this cycle began.
    pub fn pending_need_set(&self) -> &BTreeSet<PartId> {
        &self.pending_need_set
    }

    fn expect(&self, expected: SessionState) -> Result<()> {
        if self.state == expected {
            Ok(())
        } else {
            Err(SyncError::ProtocolViolation {
                expected,
                actual: self.state,
            })
        }
    }

    fn expect_idle(&self) -> Result<()> {
        if self.state == SessionState::Idle {
            Ok(())
        } else {
            Err(SyncError::SessionBusy { state: self.state })
        }
    }

    /// Start a create cycle. `Idle -> CreatingItem`.
    pub fn begin_create(&mut self) -> Result<()> {
        self.expect_idle()?;
        self.state = SessionState::CreatingItem;
        Ok(())
    }

    /// Acknowledge the create. `CreatingItem -> Idle`.
    pub fn complete_create(&mut self) -> Result<()> {
        self.expect(SessionState::CreatingItem)?;
        self.state = SessionState::Idle;
        Ok(())
    }

    /// Start a needs cycle with the need set this peer predicts the
    /// counter-peer will compute. `Idle -> AwaitingNeedsResponse`.
    pub fn begin_needs(&mut self, predicted: BTreeSet<PartId>) -> Result<()> {
        self.expect_idle()?;
        self.pending_need_set = predicted;
        self.state = SessionState::AwaitingNeedsResponse;
        Ok(())
    }

    /// Confirm the responded need set against the pending one, exactly.
    /// `AwaitingNeedsResponse -> NeedsKnown`; a mismatch fails with state
    /// unchanged.
    pub fn confirm_needs(&mut self, need_set: &BTreeSet<PartId>) -> Result<()> {
        self.expect(SessionState::AwaitingNeedsResponse)?;
        if *need_set != self.pending_need_set {
            return Err(SyncError::NeedSetMismatch {
                expected: self.pending_need_set.clone(),
                got: need_set.clone(),
            });
        }
        self.state = SessionState::NeedsKnown;
        Ok(())
    }

    /// Validate an upload's part ids against the pending need set, exactly,
    /// and complete the cycle. `NeedsKnown -> Idle`.
    ///
    /// An extra id fails `UnsolicitedPart`; a missing id fails
    /// `IncompleteUpload`. Failure leaves state and the pending set
    /// unchanged.
    pub fn take_upload(&mut self, part_ids: &BTreeSet<PartId>) -> Result<()> {
        self.expect(SessionState::NeedsKnown)?;
        if let Some(extra) = part_ids.difference(&self.pending_need_set).next() {
            return Err(SyncError::UnsolicitedPart { part_id: *extra });
        }
        let missing: BTreeSet<PartId> = self
            .pending_need_set
            .difference(part_ids)
            .copied()
            .collect();
        if !missing.is_empty() {
            return Err(SyncError::IncompleteUpload { missing });
        }
        self.pending_need_set.clear();
        self.state = SessionState::Idle;
        Ok(())
    }

    /// Start a download cycle for the given part ids.
    /// `Idle -> AwaitingDownloadAck`.
    pub fn begin_download(&mut self, part_ids: BTreeSet<PartId>) -> Result<()> {
        self.expect_idle()?;
        self.pending_download = part_ids;
        self.state = SessionState::AwaitingDownloadAck;
        Ok(())
    }

    /// Validate a download response's part ids against the requested set,
    /// exactly, and complete the cycle. `AwaitingDownloadAck -> Idle`.
    pub fn complete_download(&mut self, part_ids: &BTreeSet<PartId>) -> Result<()> {
        self.expect(SessionState::AwaitingDownloadAck)?;
        if *part_ids != self.pending_download {
            return Err(SyncError::NeedSetMismatch {
                expected: self.pending_download.clone(),
                got: part_ids.clone(),
            });
        }
        self.pending_download.clear();
        self.state = SessionState::Idle;
        Ok(())
    }

    /// Abort the in-flight cycle from any state, discarding pending sets.
    ///
    /// Never touches the owning container's committed item data.
    pub fn abort(&mut self) {
        self.pending_need_set.clear();
        self.pending_download.clear();
        self.state = SessionState::Idle;
    }
}
