//! Unread tracking.
//!
//! A notification is unread when the backend says so OR when it was indexed
//! after the local high-water mark. The backend flag can lag behind a fetch
//! that raced a mark-seen round trip, so both sources are consulted.

use chrono::{DateTime, Utc};
use notifeed_common::{AppResult, get_metrics};
use tracing::{debug, warn};

use super::event_store::EventStore;
use crate::entities::{NotificationGroup, RawNotification};

/// Tracks the "last seen" high-water mark.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UnreadTracker {
    last_seen_at: Option<DateTime<Utc>>,
}

impl UnreadTracker {
    /// Create a tracker from a persisted mark. `None` means nothing was seen yet.
    #[must_use]
    pub const fn new(last_seen_at: Option<DateTime<Utc>>) -> Self {
        Self { last_seen_at }
    }

    /// Current high-water mark.
    #[must_use]
    pub const fn last_seen_at(&self) -> Option<DateTime<Utc>> {
        self.last_seen_at
    }

    /// Whether a single notification is unread.
    #[must_use]
    pub fn is_unread(&self, notification: &RawNotification) -> bool {
        !notification.is_read
            || self
                .last_seen_at
                .is_none_or(|mark| notification.indexed_at > mark)
    }

    /// Whether any member of a group is unread.
    #[must_use]
    pub fn has_unread(&self, group: &NotificationGroup) -> bool {
        group.notifications().iter().any(|n| self.is_unread(n))
    }

    /// Fill `has_unread_notifications` on every group.
    pub fn annotate(&self, groups: &mut [NotificationGroup]) {
        for group in groups {
            group.has_unread_notifications = self.has_unread(group);
        }
    }

    /// The mark a mark-seen call should send for the materialized events.
    ///
    /// This is the `indexed_at` of the newest event, not the current time, so
    /// events that arrive while the call is in flight stay unread. Returns
    /// `None` when nothing is unread.
    #[must_use]
    pub fn pending_mark(&self, events: &[RawNotification]) -> Option<DateTime<Utc>> {
        if !events.iter().any(|n| self.is_unread(n)) {
            return None;
        }
        events.iter().map(|n| n.indexed_at).max()
    }

    /// Advance the mark. Never moves backwards; returns whether it changed.
    pub fn advance(&mut self, mark: DateTime<Utc>) -> bool {
        match self.last_seen_at {
            Some(current) if current >= mark => false,
            _ => {
                self.last_seen_at = Some(mark);
                true
            }
        }
    }

    /// Issue the backend mark-seen call.
    ///
    /// The tracker itself is only advanced by the caller once this succeeds;
    /// a failure leaves the mark untouched and is not retried.
    pub async fn mark_all_seen(store: &dyn EventStore, through: DateTime<Utc>) -> AppResult<()> {
        match store.mark_seen(through).await {
            Ok(()) => {
                get_metrics().record_mark_seen(true);
                debug!(%through, "Marked notifications as seen");
                Ok(())
            }
            Err(e) => {
                get_metrics().record_mark_seen(false);
                warn!(error = %e, %through, "Failed to mark notifications as seen");
                Err(e)
            }
        }
    }
}

/// Replace every event indexed at or before `mark` with a read copy.
///
/// After a successful mark-seen the backend reports these as read on the next
/// fetch; applying that locally keeps already fetched events consistent.
#[must_use]
pub fn apply_seen_mark(events: &[RawNotification], mark: DateTime<Utc>) -> Vec<RawNotification> {
    events
        .iter()
        .map(|n| {
            if !n.is_read && n.indexed_at <= mark {
                RawNotification {
                    is_read: true,
                    ..n.clone()
                }
            } else {
                n.clone()
            }
        })
        .collect()
}

/// Number of groups with at least one unread member.
#[must_use]
pub fn unread_group_count(groups: &[NotificationGroup]) -> usize {
    groups.iter().filter(|g| g.has_unread_notifications).count()
}
