//! Raw notification entity.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Notification types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationType {
    /// Someone liked a post
    Like,
    /// Someone reposted a post
    Repost,
    /// Someone followed the account
    Follow,
    /// Someone mentioned the account
    Mention,
    /// Someone replied to a post
    Reply,
    /// Someone quoted a post
    Quote,
}

impl NotificationType {
    /// Wire name of this type.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Like => "like",
            Self::Repost => "repost",
            Self::Follow => "follow",
            Self::Mention => "mention",
            Self::Reply => "reply",
            Self::Quote => "quote",
        }
    }
}

impl fmt::Display for NotificationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NotificationType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "like" => Ok(Self::Like),
            "repost" => Ok(Self::Repost),
            "follow" => Ok(Self::Follow),
            "mention" => Ok(Self::Mention),
            "reply" => Ok(Self::Reply),
            "quote" => Ok(Self::Quote),
            other => Err(other.to_string()),
        }
    }
}

/// The reason a notification was emitted.
///
/// Backends add reasons over time; anything this engine does not know is kept
/// verbatim so it can be reported, then dropped during grouping.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum NotificationKind {
    /// A reason this engine groups.
    Known(NotificationType),
    /// A reason this engine does not understand.
    Unrecognized(String),
}

impl NotificationKind {
    /// The known type, if any.
    #[must_use]
    pub const fn notification_type(&self) -> Option<NotificationType> {
        match self {
            Self::Known(t) => Some(*t),
            Self::Unrecognized(_) => None,
        }
    }
}

impl From<String> for NotificationKind {
    fn from(reason: String) -> Self {
        match reason.parse::<NotificationType>() {
            Ok(t) => Self::Known(t),
            Err(other) => Self::Unrecognized(other),
        }
    }
}

impl From<NotificationKind> for String {
    fn from(kind: NotificationKind) -> Self {
        match kind {
            NotificationKind::Known(t) => t.as_str().to_string(),
            NotificationKind::Unrecognized(reason) => reason,
        }
    }
}

impl From<NotificationType> for NotificationKind {
    fn from(t: NotificationType) -> Self {
        Self::Known(t)
    }
}

/// The account that caused a notification.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Author {
    /// Stable account identifier (e.g. a DID)
    pub id: String,
    /// Display name, falling back to the handle when empty
    pub display_name: String,
    /// Account handle
    pub handle: String,
    /// Avatar image URI
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_uri: Option<String>,
}

/// One atomic event from the backend.
///
/// Immutable once fetched. A later fetch carrying the same `id` replaces this
/// value rather than mutating it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawNotification {
    /// Stable identity (content identifier)
    pub id: String,
    /// Who caused the event
    pub author: Author,
    /// Why the event was emitted
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    /// The post or entity the event is about
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject_uri: Option<String>,
    /// Fallback target when `subject_uri` is absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason_subject_uri: Option<String>,
    /// Authoritative ordering key
    pub indexed_at: DateTime<Utc>,
    /// Read flag as reported by the backend at fetch time
    pub is_read: bool,
}

impl RawNotification {
    /// The known notification type, if any.
    #[must_use]
    pub const fn notification_type(&self) -> Option<NotificationType> {
        self.kind.notification_type()
    }

    /// The URI this event is about, preferring the direct subject.
    #[must_use]
    pub fn subject(&self) -> Option<&str> {
        self.subject_uri
            .as_deref()
            .or(self.reason_subject_uri.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_from_reason() {
        assert_eq!(
            NotificationKind::from("like".to_string()),
            NotificationKind::Known(NotificationType::Like)
        );
        assert_eq!(
            NotificationKind::from("starterpack-joined".to_string()),
            NotificationKind::Unrecognized("starterpack-joined".to_string())
        );
    }

    #[test]
    fn test_unrecognized_kind_keeps_reason_on_the_wire() {
        let kind = NotificationKind::Unrecognized("verified".to_string());
        assert_eq!(serde_json::to_value(&kind).unwrap(), "verified");
    }

    #[test]
    fn test_deserialize_notification() {
        let json = serde_json::json!({
            "id": "bafy1",
            "author": {
                "id": "did:plc:alice",
                "displayName": "Alice",
                "handle": "alice.example.com"
            },
            "type": "repost",
            "reasonSubjectUri": "at://did:plc:me/app.bsky.feed.post/1",
            "indexedAt": "2024-05-01T12:00:00Z",
            "isRead": false
        });

        let n: RawNotification = serde_json::from_value(json).unwrap();
        assert_eq!(n.notification_type(), Some(NotificationType::Repost));
        assert_eq!(n.author.avatar_uri, None);
        assert_eq!(n.subject(), Some("at://did:plc:me/app.bsky.feed.post/1"));
    }

    #[test]
    fn test_subject_prefers_direct_subject() {
        let n = RawNotification {
            id: "1".to_string(),
            author: Author {
                id: "did:plc:bob".to_string(),
                display_name: "Bob".to_string(),
                handle: "bob.example.com".to_string(),
                avatar_uri: None,
            },
            kind: NotificationType::Like.into(),
            subject_uri: Some("at://post/direct".to_string()),
            reason_subject_uri: Some("at://post/fallback".to_string()),
            indexed_at: Utc::now(),
            is_read: true,
        };
        assert_eq!(n.subject(), Some("at://post/direct"));
    }
}
