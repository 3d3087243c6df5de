//! Subject post resolution and caching.
//!
//! Groups about a post show a preview of it. Posts are resolved lazily through
//! the event store and cached for the lifetime of a session. Failed lookups
//! are cached too, so a broken post is not requested again on every page;
//! a refresh forgets those failures so they get one more try.

use std::collections::{HashMap, HashSet};

use futures::stream::{self, StreamExt};
use notifeed_common::{AppResult, get_metrics};
use tracing::{debug, warn};

use super::event_store::EventStore;
use super::grouping::GroupingPolicy;
use crate::entities::{NotificationGroup, Post, RawNotification};

/// Maximum concurrent post lookups.
const MAX_CONCURRENT_RESOLVES: usize = 8;

#[derive(Debug, Clone)]
enum CacheEntry {
    Resolved(Post),
    Failed,
}

/// Per-session cache of resolved subject posts.
#[derive(Debug, Clone, Default)]
pub struct SubjectPostCache {
    entries: HashMap<String, CacheEntry>,
}

impl SubjectPostCache {
    /// Create an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A resolved post, if cached.
    #[must_use]
    pub fn get(&self, uri: &str) -> Option<&Post> {
        match self.entries.get(uri) {
            Some(CacheEntry::Resolved(post)) => Some(post),
            _ => None,
        }
    }

    /// Whether a lookup for `uri` failed earlier in this session.
    #[must_use]
    pub fn has_failed(&self, uri: &str) -> bool {
        matches!(self.entries.get(uri), Some(CacheEntry::Failed))
    }

    /// Subject URIs of `events` that have no cache entry yet, in first-seen order.
    #[must_use]
    pub fn missing_for(&self, events: &[RawNotification]) -> Vec<String> {
        let mut queued = HashSet::new();
        let mut missing = Vec::new();

        for event in events {
            let Some(notification_type) = event.notification_type() else {
                continue;
            };
            if !GroupingPolicy::for_type(notification_type).has_subject_post() {
                continue;
            }
            let Some(uri) = event.subject() else {
                continue;
            };
            if !queued.insert(uri) {
                continue;
            }

            let hit = self.entries.contains_key(uri);
            get_metrics().record_subject_cache_access(hit);
            if !hit {
                missing.push(uri.to_string());
            }
        }

        missing
    }

    /// Record the outcome of a lookup.
    pub fn record(&mut self, uri: String, result: AppResult<Post>) {
        let entry = match result {
            Ok(post) => CacheEntry::Resolved(post),
            Err(e) => {
                get_metrics().record_subject_resolve_failure();
                warn!(uri = %uri, error = %e, "Failed to resolve subject post");
                CacheEntry::Failed
            }
        };
        self.entries.insert(uri, entry);
    }

    /// Drop cached failures so the next lookup retries them.
    pub fn forget_failures(&mut self) {
        let before = self.entries.len();
        self.entries
            .retain(|_, entry| matches!(entry, CacheEntry::Resolved(_)));
        let forgotten = before - self.entries.len();
        if forgotten > 0 {
            debug!(count = forgotten, "Forgetting failed subject post lookups");
        }
    }

    /// Attach cached posts to groups that have a subject.
    pub fn attach(&self, groups: &mut [NotificationGroup]) {
        for group in groups {
            group.subject_post = group
                .subject_uri
                .as_deref()
                .and_then(|uri| self.get(uri))
                .cloned();
        }
    }
}

/// Resolve posts concurrently. Failures are returned, not raised.
pub async fn resolve_all(
    store: &dyn EventStore,
    uris: Vec<String>,
) -> Vec<(String, AppResult<Post>)> {
    if uris.is_empty() {
        return Vec::new();
    }
    debug!(count = uris.len(), "Resolving subject posts");

    stream::iter(uris)
        .map(|uri| async move {
            let result = store.resolve_post(&uri).await;
            (uri, result)
        })
        .buffer_unordered(MAX_CONCURRENT_RESOLVES)
        .collect()
        .await
}
