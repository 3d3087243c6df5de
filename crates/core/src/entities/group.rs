//! Notification group entity.

use serde::Serialize;

use super::notification::{Author, NotificationType, RawNotification};
use super::post::Post;

/// The rendering unit: one or more raw notifications sharing a type and subject.
///
/// Groups are a derived view. They are rebuilt from the raw notification set
/// whenever it changes and are never patched in place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationGroup {
    /// Identifier derived from the grouping key, stable across re-fetches
    pub id: String,
    /// Type shared by every member
    pub notification_type: NotificationType,
    /// Members, newest first; never empty
    notifications: Vec<RawNotification>,
    /// URI of the post the group is about, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject_uri: Option<String>,
    /// Resolved subject post, populated lazily
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject_post: Option<Post>,
    /// Whether any member is unread
    pub has_unread_notifications: bool,
}

impl NotificationGroup {
    /// Build a group, ordering members newest first.
    ///
    /// Returns `None` for an empty member list. The sort is stable, so members
    /// sharing a timestamp keep their input order.
    #[must_use]
    pub fn new(
        id: String,
        notification_type: NotificationType,
        mut notifications: Vec<RawNotification>,
        subject_uri: Option<String>,
    ) -> Option<Self> {
        if notifications.is_empty() {
            return None;
        }
        notifications.sort_by(|a, b| b.indexed_at.cmp(&a.indexed_at));

        Some(Self {
            id,
            notification_type,
            notifications,
            subject_uri,
            subject_post: None,
            has_unread_notifications: false,
        })
    }

    /// Members, newest first.
    #[must_use]
    pub fn notifications(&self) -> &[RawNotification] {
        &self.notifications
    }

    /// The newest member.
    #[must_use]
    pub fn latest_notification(&self) -> &RawNotification {
        &self.notifications[0]
    }

    /// Distinct authors, most recent first.
    #[must_use]
    pub fn distinct_authors(&self) -> Vec<&Author> {
        let mut seen = std::collections::HashSet::new();
        self.notifications
            .iter()
            .map(|n| &n.author)
            .filter(|a| seen.insert(a.id.as_str()))
            .collect()
    }

    /// The first `limit` distinct authors, for inline display.
    #[must_use]
    pub fn preview_authors(&self, limit: usize) -> Vec<&Author> {
        let mut authors = self.distinct_authors();
        authors.truncate(limit);
        authors
    }

    /// Distinct authors beyond the first `limit`, shown as "and N others".
    #[must_use]
    pub fn other_author_count(&self, limit: usize) -> usize {
        self.distinct_authors().len().saturating_sub(limit)
    }
}
