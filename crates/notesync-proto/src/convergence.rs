//! Convergence verification for the sync protocol.
//!
//! After syncing, peers can verify they hold the same part set for an item
//! by comparing deterministic frame digests instead of exchanging content.

use notesync_core::{frame_digest, missing_parts, Digest, Frame, ItemId};
use notesync_store::Store;

use crate::error::{Result, SyncError};

/// Compute the digest of an item's frame as stored.
///
/// Returns None when the item is unknown.
pub async fn item_digest<S: Store>(store: &S, item_id: &ItemId) -> Result<Option<Digest>> {
    Ok(store
        .get_frame(item_id)
        .await?
        .map(|frame| frame_digest(&frame)))
}

/// Verify that the local replica of an item has converged with a remote
/// frame.
///
/// Peers have converged when neither side is missing anything from the
/// other, which for monotone frames means the frames are equal and the
/// digests match. A digest mismatch under equal need sets means the external
/// version-marker invariant was violated somewhere (same marker, different
/// frame content); that is surfaced as `Diverged`, never resolved here.
pub async fn verify_convergence<S: Store>(
    store: &S,
    item_id: &ItemId,
    remote_frame: &Frame,
) -> Result<ConvergenceResult> {
    let local = match store.get_frame(item_id).await? {
        Some(frame) => frame,
        None => {
            return Ok(ConvergenceResult::NotConverged {
                reason: "item not found locally".into(),
            });
        }
    };

    let local_needs = missing_parts(&local, remote_frame);
    if !local_needs.is_empty() {
        return Ok(ConvergenceResult::NotConverged {
            reason: format!("local replica is missing {} parts", local_needs.len()),
        });
    }
    let remote_needs = missing_parts(remote_frame, &local);
    if !remote_needs.is_empty() {
        return Ok(ConvergenceResult::NotConverged {
            reason: format!("remote replica is missing {} parts", remote_needs.len()),
        });
    }

    let local_digest = frame_digest(&local);
    let remote_digest = frame_digest(remote_frame);
    if local_digest != remote_digest {
        return Ok(ConvergenceResult::Diverged {
            local: local_digest,
            remote: remote_digest,
        });
    }

    Ok(ConvergenceResult::Converged)
}

/// Batch verification of many items against their remote frames.
pub async fn verify_all_items<S: Store>(
    store: &S,
    remote_frames: &[(ItemId, Frame)],
) -> Result<Vec<(ItemId, ConvergenceResult)>> {
    let mut results = Vec::with_capacity(remote_frames.len());
    for (item_id, remote) in remote_frames {
        let result = verify_convergence(store, item_id, remote).await?;
        results.push((*item_id, result));
    }
    Ok(results)
}

/// Result of convergence verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConvergenceResult {
    /// Both replicas record identical frames.
    Converged,
    /// One side still needs parts (more sync rounds required).
    NotConverged { reason: String },
    /// Equal need sets but different digests: the version-marker generator's
    /// uniqueness guarantee was broken outside this core.
    Diverged { local: Digest, remote: Digest },
}

impl ConvergenceResult {
    /// Whether the replicas have converged.
    pub fn is_converged(&self) -> bool {
        matches!(self, ConvergenceResult::Converged)
    }

    /// Whether divergence was detected.
    pub fn is_diverged(&self) -> bool {
        matches!(self, ConvergenceResult::Diverged { .. })
    }
}

/// Convenience: verify an item against another store's view of it.
pub async fn verify_between<A: Store, B: Store>(
    local: &A,
    remote: &B,
    item_id: &ItemId,
) -> Result<ConvergenceResult> {
    let remote_frame = remote
        .get_frame(item_id)
        .await?
        .ok_or(SyncError::ItemNotFound(*item_id))?;
    verify_convergence(local, item_id, &remote_frame).await
}
