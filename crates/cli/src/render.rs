//! JSON-lines rendering of notification groups.

use chrono::{DateTime, Utc};
use notifeed_core::{NotificationGroup, NotificationType, SessionSnapshot};
use serde::Serialize;

/// One output line per group.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupLine<'a> {
    pub id: &'a str,
    #[serde(rename = "type")]
    pub notification_type: NotificationType,
    pub latest_at: DateTime<Utc>,
    pub unread: bool,
    pub count: usize,
    pub authors: Vec<&'a str>,
    #[serde(skip_serializing_if = "is_zero")]
    pub other_authors: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject_uri: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject_text: Option<&'a str>,
}

const fn is_zero(n: &usize) -> bool {
    *n == 0
}

impl<'a> GroupLine<'a> {
    /// Summarize a group, listing at most `preview_authors` authors for follows.
    ///
    /// Other group types list every distinct author.
    pub fn new(group: &'a NotificationGroup, preview_authors: usize) -> Self {
        let limit = match group.notification_type {
            NotificationType::Follow => preview_authors,
            _ => usize::MAX,
        };

        Self {
            id: &group.id,
            notification_type: group.notification_type,
            latest_at: group.latest_notification().indexed_at,
            unread: group.has_unread_notifications,
            count: group.notifications().len(),
            authors: group
                .preview_authors(limit)
                .into_iter()
                .map(|a| a.display_name.as_str())
                .collect(),
            other_authors: group.other_author_count(limit),
            subject_uri: group.subject_uri.as_deref(),
            subject_text: group.subject_post.as_ref().map(|p| p.text.as_str()),
        }
    }
}

/// Render every group of a snapshot as JSON lines.
pub fn render_snapshot(
    snapshot: &SessionSnapshot,
    preview_authors: usize,
) -> Result<Vec<String>, serde_json::Error> {
    snapshot
        .groups
        .iter()
        .map(|group| serde_json::to_string(&GroupLine::new(group, preview_authors)))
        .collect()
}
