//! Viewed-Once Guard
//!
//! Issues the "follow-up viewed" side effect at most once per id for the
//! lifetime of the guard. The id is reserved under the lock before the
//! call goes out, so concurrent callers for the same id never dispatch
//! twice. A call that fails, or is dropped before it finishes, releases
//! the reservation.
//!
//! Nothing is persisted: a fresh guard re-issues the call once per id,
//! which the server treats as a no-op.

use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::Mutex;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::error::SideEffectError;
use crate::model::FollowupId;
use crate::side_channel::SideChannel;

/// Why `mark_viewed_if_needed` did not dispatch, or why dispatch failed.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum MarkViewedError {
    /// The opened item is not a follow-up
    #[error("not a follow-up")]
    NotAFollowup,

    /// Already marked in this session
    #[error("follow-up {0} already marked viewed")]
    AlreadyViewed(FollowupId),

    /// The side effect failed; a later call may retry
    #[error("marking follow-up viewed failed: {0}")]
    SideEffect(#[from] SideEffectError),
}

impl MarkViewedError {
    /// True for the two no-op outcomes
    #[must_use]
    pub fn is_noop(&self) -> bool {
        matches!(self, Self::NotAFollowup | Self::AlreadyViewed(_))
    }
}

/// Session-scoped exactly-once guard for the mark-viewed call.
pub struct ViewedOnceGuard {
    channel: Arc<dyn SideChannel>,
    viewed: Mutex<HashSet<FollowupId>>,
}

impl ViewedOnceGuard {
    /// Guard dispatching through `channel`
    pub fn new(channel: Arc<dyn SideChannel>) -> Self {
        Self {
            channel,
            viewed: Mutex::new(HashSet::new()),
        }
    }

    /// Mark `id` viewed unless it is absent or already handled.
    ///
    /// # Errors
    ///
    /// [`MarkViewedError::NotAFollowup`] / [`MarkViewedError::AlreadyViewed`]
    /// when nothing was dispatched, [`MarkViewedError::SideEffect`] when the
    /// call failed.
    pub async fn mark_viewed_if_needed(&self, id: Option<FollowupId>) -> Result<(), MarkViewedError> {
        let id = id.ok_or(MarkViewedError::NotAFollowup)?;

        let Some(reservation) = Reservation::take(&self.viewed, id) else {
            debug!(followup = %id, "Already marked viewed this session");
            return Err(MarkViewedError::AlreadyViewed(id));
        };

        match self.channel.mark_followup_viewed(id).await {
            Ok(()) => {
                reservation.commit();
                info!(followup = %id, "Follow-up marked viewed");
                Ok(())
            }
            Err(e) => {
                warn!(followup = %id, error = %e, "Failed to mark follow-up viewed");
                Err(e.into())
            }
        }
    }

    /// True if `id` was marked (or is being marked) this session
    #[must_use]
    pub fn was_viewed(&self, id: FollowupId) -> bool {
        self.viewed.lock().contains(&id)
    }

    /// Number of ids marked this session
    #[must_use]
    pub fn viewed_count(&self) -> usize {
        self.viewed.lock().len()
    }
}

/// An id held in the viewed set while its call is in flight. Released on
/// drop unless committed.
struct Reservation<'a> {
    viewed: &'a Mutex<HashSet<FollowupId>>,
    id: FollowupId,
    committed: bool,
}

impl<'a> Reservation<'a> {
    fn take(viewed: &'a Mutex<HashSet<FollowupId>>, id: FollowupId) -> Option<Self> {
        viewed.lock().insert(id).then_some(Self {
            viewed,
            id,
            committed: false,
        })
    }

    fn commit(mut self) {
        self.committed = true;
    }
}

impl Drop for Reservation<'_> {
    fn drop(&mut self) {
        if !self.committed {
            self.viewed.lock().remove(&self.id);
        }
    }
}

impl std::fmt::Debug for ViewedOnceGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ViewedOnceGuard")
            .field("viewed", &self.viewed_count())
            .finish_non_exhaustive()
    }
}
