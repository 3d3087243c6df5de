//! Grouping engine.
//!
//! Turns an ordered sequence of raw notifications into notification groups.
//! Which events merge is decided by a single policy table keyed on
//! [`NotificationType`]; adding a type means adding one arm to
//! [`GroupingPolicy::for_type`].

use std::collections::{HashMap, HashSet};

use notifeed_common::get_metrics;
use tracing::warn;

use crate::entities::{NotificationGroup, NotificationType, RawNotification};

/// How events of one type collapse into groups.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupingPolicy {
    /// Merge every event that shares a subject ("N people liked your post").
    BySubject,
    /// Never merge; each event carries its own authored post.
    Individual,
    /// Merge every event of the type in the materialized window.
    All,
}

impl GroupingPolicy {
    /// The policy for a notification type.
    #[must_use]
    pub const fn for_type(notification_type: NotificationType) -> Self {
        match notification_type {
            NotificationType::Like | NotificationType::Repost => Self::BySubject,
            NotificationType::Mention | NotificationType::Reply | NotificationType::Quote => {
                Self::Individual
            }
            NotificationType::Follow => Self::All,
        }
    }

    /// The grouping key for an event, also used as the group id.
    ///
    /// A subject-merged event without any subject URI cannot share a group
    /// and is keyed on its own id.
    #[must_use]
    pub fn key(self, notification_type: NotificationType, event: &RawNotification) -> String {
        match self {
            Self::BySubject => match event.subject() {
                Some(uri) => format!("{notification_type}:{uri}"),
                None => format!("{notification_type}:{}", event.id),
            },
            Self::Individual => format!("{notification_type}:{}", event.id),
            Self::All => notification_type.to_string(),
        }
    }

    /// Whether groups under this policy show a subject post preview.
    #[must_use]
    pub const fn has_subject_post(self) -> bool {
        !matches!(self, Self::All)
    }
}

/// Group raw notifications.
///
/// Deterministic for a given input. Groups come back ordered by the
/// `indexed_at` of their newest member, descending; groups whose newest
/// members share a timestamp keep the order in which their keys first
/// appeared. Events repeating an already seen `id` are skipped (the first
/// occurrence wins) and events of an unrecognized type are dropped.
///
/// Unread flags are left `false`; see [`super::unread::annotate`].
#[must_use]
pub fn group_notifications(events: &[RawNotification]) -> Vec<NotificationGroup> {
    let mut seen_ids: HashSet<&str> = HashSet::with_capacity(events.len());
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut buckets: Vec<(String, NotificationType, Vec<RawNotification>)> = Vec::new();
    let mut duplicates = 0u64;

    for event in events {
        if !seen_ids.insert(event.id.as_str()) {
            duplicates += 1;
            continue;
        }

        let Some(notification_type) = event.notification_type() else {
            warn!(
                id = %event.id,
                kind = ?event.kind,
                "Dropping notification with unrecognized type"
            );
            get_metrics().record_unrecognized();
            continue;
        };

        let key = GroupingPolicy::for_type(notification_type).key(notification_type, event);
        match index.get(&key) {
            Some(&slot) => buckets[slot].2.push(event.clone()),
            None => {
                index.insert(key.clone(), buckets.len());
                buckets.push((key, notification_type, vec![event.clone()]));
            }
        }
    }

    get_metrics().record_duplicates(duplicates);

    let mut groups: Vec<NotificationGroup> = buckets
        .into_iter()
        .filter_map(|(key, notification_type, members)| {
            let subject_uri = if GroupingPolicy::for_type(notification_type).has_subject_post() {
                members
                    .iter()
                    .find_map(|n| n.subject().map(ToString::to_string))
            } else {
                None
            };
            NotificationGroup::new(key, notification_type, members, subject_uri)
        })
        .collect();

    groups.sort_by(|a, b| {
        b.latest_notification()
            .indexed_at
            .cmp(&a.latest_notification().indexed_at)
    });

    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{Author, NotificationKind};
    use chrono::{TimeZone, Utc};

    fn event(
        id: &str,
        notification_type: NotificationType,
        subject: Option<&str>,
        secs: i64,
    ) -> RawNotification {
        RawNotification {
            id: id.to_string(),
            author: Author {
                id: format!("did:plc:{id}"),
                display_name: format!("User {id}"),
                handle: format!("{id}.example.com"),
                avatar_uri: None,
            },
            kind: notification_type.into(),
            subject_uri: subject.map(ToString::to_string),
            reason_subject_uri: None,
            indexed_at: Utc.timestamp_opt(secs, 0).unwrap(),
            is_read: false,
        }
    }

    #[test]
    fn test_policy_table() {
        assert_eq!(GroupingPolicy::for_type(NotificationType::Like), GroupingPolicy::BySubject);
        assert_eq!(GroupingPolicy::for_type(NotificationType::Repost), GroupingPolicy::BySubject);
        assert_eq!(GroupingPolicy::for_type(NotificationType::Follow), GroupingPolicy::All);
        assert_eq!(GroupingPolicy::for_type(NotificationType::Reply), GroupingPolicy::Individual);
        assert_eq!(GroupingPolicy::for_type(NotificationType::Quote), GroupingPolicy::Individual);
        assert_eq!(GroupingPolicy::for_type(NotificationType::Mention), GroupingPolicy::Individual);
    }

    #[test]
    fn test_mixed_page_groups_and_orders() {
        let events = vec![
            event("l1", NotificationType::Like, Some("at://p1"), 5),
            event("f1", NotificationType::Follow, None, 4),
            event("l2", NotificationType::Like, Some("at://p1"), 3),
            event("r1", NotificationType::Reply, Some("at://r1"), 2),
        ];

        let groups = group_notifications(&events);

        assert_eq!(groups.len(), 3);
        assert_eq!(groups[0].id, "like:at://p1");
        assert_eq!(groups[0].notifications().len(), 2);
        assert_eq!(groups[0].latest_notification().id, "l1");
        assert_eq!(groups[1].id, "follow");
        assert_eq!(groups[2].id, "reply:r1");
        assert_eq!(groups[2].subject_uri.as_deref(), Some("at://r1"));
    }

    #[test]
    fn test_likes_on_different_posts_stay_apart() {
        let events = vec![
            event("l1", NotificationType::Like, Some("at://p1"), 5),
            event("l2", NotificationType::Like, Some("at://p2"), 4),
            event("l3", NotificationType::Repost, Some("at://p1"), 3),
        ];

        let groups = group_notifications(&events);
        let ids: Vec<_> = groups.iter().map(|g| g.id.as_str()).collect();
        assert_eq!(ids, vec!["like:at://p1", "like:at://p2", "repost:at://p1"]);
    }

    #[test]
    fn test_reason_subject_is_fallback_key() {
        let mut with_fallback = event("l1", NotificationType::Like, None, 5);
        with_fallback.reason_subject_uri = Some("at://p1".to_string());
        let direct = event("l2", NotificationType::Like, Some("at://p1"), 4);

        let groups = group_notifications(&[with_fallback, direct]);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].notifications().len(), 2);
    }

    #[test]
    fn test_like_without_subject_is_singleton() {
        let events = vec![
            event("l1", NotificationType::Like, None, 5),
            event("l2", NotificationType::Like, None, 4),
        ];

        let groups = group_notifications(&events);
        assert_eq!(groups.len(), 2);
    }

    #[test]
    fn test_individual_types_never_merge() {
        let events = vec![
            event("q1", NotificationType::Quote, Some("at://p1"), 6),
            event("q2", NotificationType::Quote, Some("at://p1"), 5),
            event("m1", NotificationType::Mention, Some("at://p1"), 4),
            event("r1", NotificationType::Reply, Some("at://p1"), 3),
        ];

        let groups = group_notifications(&events);
        assert_eq!(groups.len(), 4);
        assert!(groups.iter().all(|g| g.notifications().len() == 1));
    }

    #[test]
    fn test_follows_merge_across_time() {
        let events = vec![
            event("f1", NotificationType::Follow, None, 10),
            event("l1", NotificationType::Like, Some("at://p1"), 8),
            event("f2", NotificationType::Follow, None, 2),
        ];

        let groups = group_notifications(&events);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].id, "follow");
        assert_eq!(groups[0].notifications().len(), 2);
        assert_eq!(groups[0].subject_uri, None);
    }

    #[test]
    fn test_duplicate_ids_appear_once() {
        let events = vec![
            event("l1", NotificationType::Like, Some("at://p1"), 5),
            event("l1", NotificationType::Like, Some("at://p1"), 5),
            event("r1", NotificationType::Reply, Some("at://r1"), 4),
            event("r1", NotificationType::Reply, Some("at://r1"), 4),
        ];

        let groups = group_notifications(&events);
        let total: usize = groups.iter().map(|g| g.notifications().len()).sum();
        assert_eq!(total, 2);
    }

    #[test]
    fn test_unrecognized_type_is_dropped() {
        let mut unknown = event("x1", NotificationType::Like, Some("at://p1"), 9);
        unknown.kind = NotificationKind::Unrecognized("starterpack-joined".to_string());
        let events = vec![unknown, event("l1", NotificationType::Like, Some("at://p1"), 5)];

        let groups = group_notifications(&events);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].notifications().len(), 1);
        assert_eq!(groups[0].latest_notification().id, "l1");
    }

    #[test]
    fn test_out_of_order_members_are_sorted() {
        // Second page older like arrives after a newer one on the same post
        let events = vec![
            event("l1", NotificationType::Like, Some("at://p1"), 3),
            event("r1", NotificationType::Reply, Some("at://r1"), 4),
            event("l2", NotificationType::Like, Some("at://p1"), 7),
        ];

        let groups = group_notifications(&events);
        assert_eq!(groups[0].id, "like:at://p1");
        assert_eq!(groups[0].latest_notification().id, "l2");
        assert_eq!(groups[1].id, "reply:r1");
    }

    #[test]
    fn test_grouping_is_deterministic() {
        let events = vec![
            event("a", NotificationType::Like, Some("at://p1"), 5),
            event("b", NotificationType::Follow, None, 5),
            event("c", NotificationType::Like, Some("at://p2"), 5),
            event("d", NotificationType::Reply, Some("at://r"), 5),
            event("e", NotificationType::Like, Some("at://p1"), 5),
        ];

        let first = group_notifications(&events);
        for _ in 0..10 {
            assert_eq!(group_notifications(&events), first);
        }
        let ids: Vec<_> = first.iter().map(|g| g.id.as_str()).collect();
        assert_eq!(ids, vec!["like:at://p1", "follow", "like:at://p2", "reply:d"]);
    }

    #[test]
    fn test_empty_input() {
        assert!(group_notifications(&[]).is_empty());
    }
}
