//! XRPC wire records and their mapping onto engine entities.
//!
//! Only the fields the engine needs are decoded; everything else in the
//! lexicon is ignored.

use chrono::{DateTime, Utc};
use notifeed_core::{Author, NotificationKind, NotificationType, Post, RawNotification};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Response of `app.bsky.notification.listNotifications`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListNotificationsOutput {
    #[serde(default)]
    pub cursor: Option<String>,
    pub notifications: Vec<WireNotification>,
}

/// Response of `app.bsky.feed.getPosts`.
#[derive(Debug, Deserialize)]
pub struct GetPostsOutput {
    pub posts: Vec<PostView>,
}

/// Body of `app.bsky.notification.updateSeen`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateSeenInput {
    pub seen_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileView {
    pub did: String,
    pub handle: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub avatar: Option<String>,
}

impl From<ProfileView> for Author {
    fn from(profile: ProfileView) -> Self {
        let display_name = profile
            .display_name
            .filter(|name| !name.trim().is_empty())
            .unwrap_or_else(|| profile.handle.clone());

        Self {
            id: profile.did,
            display_name,
            handle: profile.handle,
            avatar_uri: profile.avatar,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireNotification {
    pub uri: String,
    pub cid: String,
    pub author: ProfileView,
    pub reason: String,
    #[serde(default)]
    pub reason_subject: Option<String>,
    #[serde(default)]
    pub record: Value,
    #[serde(default)]
    pub is_read: bool,
    pub indexed_at: DateTime<Utc>,
}

impl WireNotification {
    /// The post this notification is about.
    ///
    /// Likes and reposts point at the liked post through their record;
    /// replies, mentions and quotes are themselves the post worth previewing.
    fn subject_uri(&self, kind: &NotificationKind) -> Option<String> {
        match kind.notification_type()? {
            NotificationType::Like | NotificationType::Repost => self
                .record
                .pointer("/subject/uri")
                .and_then(Value::as_str)
                .map(ToString::to_string)
                .or_else(|| self.reason_subject.clone()),
            NotificationType::Reply | NotificationType::Mention | NotificationType::Quote => {
                Some(self.uri.clone())
            }
            NotificationType::Follow => None,
        }
    }
}

impl From<WireNotification> for RawNotification {
    fn from(wire: WireNotification) -> Self {
        let kind = NotificationKind::from(wire.reason.clone());
        let subject_uri = wire.subject_uri(&kind);

        Self {
            id: wire.cid,
            author: wire.author.into(),
            kind,
            subject_uri,
            reason_subject_uri: wire.reason_subject,
            indexed_at: wire.indexed_at,
            is_read: wire.is_read,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostView {
    pub uri: String,
    pub cid: String,
    pub author: ProfileView,
    #[serde(default)]
    pub record: Value,
    pub indexed_at: DateTime<Utc>,
    #[serde(default)]
    pub like_count: Option<u64>,
    #[serde(default)]
    pub repost_count: Option<u64>,
    #[serde(default)]
    pub reply_count: Option<u64>,
}

impl From<PostView> for Post {
    fn from(view: PostView) -> Self {
        let text = view
            .record
            .get("text")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        Self {
            uri: view.uri,
            cid: view.cid,
            author: view.author.into(),
            text,
            indexed_at: view.indexed_at,
            like_count: view.like_count.unwrap_or_default(),
            repost_count: view.repost_count.unwrap_or_default(),
            reply_count: view.reply_count.unwrap_or_default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const LIST_RESPONSE: &str = r#"{
        "cursor": "2024-05-01T10:00:00.000Z",
        "notifications": [
            {
                "uri": "at://did:plc:alice/app.bsky.feed.like/3k1",
                "cid": "bafylike",
                "author": {"did": "did:plc:alice", "handle": "alice.example.com", "displayName": "Alice"},
                "reason": "like",
                "reasonSubject": "at://did:plc:me/app.bsky.feed.post/p1",
                "record": {
                    "$type": "app.bsky.feed.like",
                    "subject": {"uri": "at://did:plc:me/app.bsky.feed.post/p1", "cid": "bafyp1"},
                    "createdAt": "2024-05-01T10:05:00.000Z"
                },
                "isRead": false,
                "indexedAt": "2024-05-01T10:05:01.000Z"
            },
            {
                "uri": "at://did:plc:bob/app.bsky.graph.follow/3k2",
                "cid": "bafyfollow",
                "author": {"did": "did:plc:bob", "handle": "bob.example.com", "displayName": ""},
                "reason": "follow",
                "record": {"$type": "app.bsky.graph.follow", "subject": "did:plc:me"},
                "isRead": true,
                "indexedAt": "2024-05-01T10:04:00.000Z"
            },
            {
                "uri": "at://did:plc:carol/app.bsky.feed.post/r1",
                "cid": "bafyreply",
                "author": {"did": "did:plc:carol", "handle": "carol.example.com"},
                "reason": "reply",
                "reasonSubject": "at://did:plc:me/app.bsky.feed.post/p1",
                "record": {"$type": "app.bsky.feed.post", "text": "nice"},
                "isRead": false,
                "indexedAt": "2024-05-01T10:03:00.000Z"
            },
            {
                "uri": "at://did:plc:dave/app.bsky.graph.starterpack/s1",
                "cid": "bafystarter",
                "author": {"did": "did:plc:dave", "handle": "dave.example.com"},
                "reason": "starterpack-joined",
                "record": {},
                "isRead": false,
                "indexedAt": "2024-05-01T10:02:00.000Z"
            }
        ]
    }"#;

    fn decode() -> (Option<String>, Vec<RawNotification>) {
        let output: ListNotificationsOutput = serde_json::from_str(LIST_RESPONSE).unwrap();
        let events = output.notifications.into_iter().map(Into::into).collect();
        (output.cursor, events)
    }

    #[test]
    fn test_list_response_cursor() {
        let (cursor, events) = decode();
        assert_eq!(cursor.as_deref(), Some("2024-05-01T10:00:00.000Z"));
        assert_eq!(events.len(), 4);
    }

    #[test]
    fn test_like_subject_comes_from_record() {
        let (_, events) = decode();
        let like = &events[0];

        assert_eq!(like.id, "bafylike");
        assert_eq!(like.notification_type(), Some(NotificationType::Like));
        assert_eq!(
            like.subject_uri.as_deref(),
            Some("at://did:plc:me/app.bsky.feed.post/p1")
        );
        assert_eq!(like.author.display_name, "Alice");
        assert_eq!(
            like.indexed_at,
            Utc.with_ymd_and_hms(2024, 5, 1, 10, 5, 1).unwrap()
        );
        assert!(!like.is_read);
    }

    #[test]
    fn test_follow_has_no_subject_and_falls_back_to_handle() {
        let (_, events) = decode();
        let follow = &events[1];

        assert_eq!(follow.notification_type(), Some(NotificationType::Follow));
        assert_eq!(follow.subject_uri, None);
        assert_eq!(follow.author.display_name, "bob.example.com");
        assert!(follow.is_read);
    }

    #[test]
    fn test_reply_subject_is_the_reply_itself() {
        let (_, events) = decode();
        let reply = &events[2];

        assert_eq!(
            reply.subject_uri.as_deref(),
            Some("at://did:plc:carol/app.bsky.feed.post/r1")
        );
        assert_eq!(
            reply.reason_subject_uri.as_deref(),
            Some("at://did:plc:me/app.bsky.feed.post/p1")
        );
    }

    #[test]
    fn test_unknown_reason_is_kept_unrecognized() {
        let (_, events) = decode();
        assert_eq!(
            events[3].kind,
            NotificationKind::Unrecognized("starterpack-joined".to_string())
        );
        assert_eq!(events[3].subject_uri, None);
    }

    #[test]
    fn test_post_view_mapping() {
        let json = r#"{
            "posts": [{
                "uri": "at://did:plc:me/app.bsky.feed.post/p1",
                "cid": "bafyp1",
                "author": {"did": "did:plc:me", "handle": "me.example.com", "displayName": "Me"},
                "record": {"$type": "app.bsky.feed.post", "text": "hello world"},
                "indexedAt": "2024-04-30T08:00:00.000Z",
                "likeCount": 12,
                "replyCount": 1
            }]
        }"#;

        let output: GetPostsOutput = serde_json::from_str(json).unwrap();
        let post: Post = output.posts.into_iter().next().unwrap().into();

        assert_eq!(post.text, "hello world");
        assert_eq!(post.like_count, 12);
        assert_eq!(post.repost_count, 0);
        assert_eq!(post.reply_count, 1);
        assert_eq!(post.author.id, "did:plc:me");
    }

    #[test]
    fn test_update_seen_body() {
        let body = UpdateSeenInput {
            seen_at: Utc.with_ymd_and_hms(2024, 5, 1, 10, 5, 1).unwrap(),
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["seenAt"], "2024-05-01T10:05:01Z");
    }
}
