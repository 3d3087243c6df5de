//! Pagination controller.
//!
//! Issues page fetches against the event store, tracks the continuation
//! cursor and merges pages into the materialized raw event set.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use notifeed_common::{AppResult, Timer, get_metrics};
use tracing::{debug, warn};

use super::event_store::{Cursor, EventStore, NotificationPage};
use crate::entities::RawNotification;

/// Default distance from the end of the group list that triggers the next page.
pub const DEFAULT_PREFETCH_THRESHOLD: usize = 5;

/// Continuation state for the materialized window.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CursorState {
    next_cursor: Option<Cursor>,
}

impl CursorState {
    /// Token for the next page, if the backend has more.
    #[must_use]
    pub const fn next_cursor(&self) -> Option<&Cursor> {
        self.next_cursor.as_ref()
    }

    /// Whether another page can be requested.
    #[must_use]
    pub const fn has_more(&self) -> bool {
        self.next_cursor.is_some()
    }

    /// Replace the cursor with one from a freshly fetched page.
    ///
    /// A `None` cursor marks the window exhausted until the next first-page
    /// fetch installs a new one.
    pub fn replace(&mut self, next_cursor: Option<Cursor>) {
        self.next_cursor = next_cursor;
    }
}

/// Drives page fetches against an [`EventStore`].
#[derive(Clone)]
pub struct PaginationController {
    store: Arc<dyn EventStore>,
}

impl PaginationController {
    /// Create a new pagination controller.
    #[must_use]
    pub fn new(store: Arc<dyn EventStore>) -> Self {
        Self { store }
    }

    /// The underlying event store.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn EventStore> {
        &self.store
    }

    /// Fetch the newest page. Used by the initial load and by refresh.
    pub async fn fetch_first_page(&self) -> AppResult<NotificationPage> {
        self.fetch(None).await
    }

    /// Fetch the page after `cursor`.
    ///
    /// Transport failures propagate unchanged; the controller never retries.
    /// Exhaustion shows up as a page with no `next_cursor`.
    pub async fn fetch_next_page(&self, cursor: &Cursor) -> AppResult<NotificationPage> {
        self.fetch(Some(cursor)).await
    }

    async fn fetch(&self, cursor: Option<&Cursor>) -> AppResult<NotificationPage> {
        let timer = Timer::start();
        let result = self.store.fetch_notifications(cursor).await;
        get_metrics().record_fetch(timer.elapsed(), result.is_ok());

        match &result {
            Ok(page) => debug!(
                cursor = ?cursor.map(Cursor::as_str),
                events = page.events.len(),
                has_more = page.next_cursor.is_some(),
                "Fetched notification page"
            ),
            Err(e) => warn!(
                cursor = ?cursor.map(Cursor::as_str),
                error = %e,
                "Notification page fetch failed"
            ),
        }

        result
    }
}

/// Keep only events this engine can group, logging the rest.
fn recognized(events: Vec<RawNotification>) -> impl Iterator<Item = RawNotification> {
    events.into_iter().filter(|n| {
        if n.notification_type().is_some() {
            return true;
        }
        warn!(id = %n.id, kind = ?n.kind, "Dropping notification with unrecognized type");
        get_metrics().record_unrecognized();
        false
    })
}

/// Build the raw event set from a first page, replacing whatever was held.
///
/// Repeated ids inside the page keep their first occurrence.
#[must_use]
pub fn first_page_events(events: Vec<RawNotification>) -> Vec<RawNotification> {
    let mut seen = HashSet::new();
    let mut duplicates = 0u64;
    let out = recognized(events)
        .filter(|n| {
            let fresh = seen.insert(n.id.clone());
            if !fresh {
                duplicates += 1;
            }
            fresh
        })
        .collect();
    get_metrics().record_duplicates(duplicates);
    out
}

/// Merge a later page into the held events.
///
/// Events whose `id` is already held replace the held copy in its current
/// position (a superseding replacement); new events are appended in page
/// order. Returns the merged set and the number of incoming duplicates.
#[must_use]
pub fn merge_page(
    existing: &[RawNotification],
    incoming: Vec<RawNotification>,
) -> (Vec<RawNotification>, usize) {
    let mut merged = existing.to_vec();
    let mut index: HashMap<String, usize> = merged
        .iter()
        .enumerate()
        .map(|(i, n)| (n.id.clone(), i))
        .collect();
    let mut duplicates = 0usize;

    for event in recognized(incoming) {
        if let Some(&slot) = index.get(&event.id) {
            merged[slot] = event;
            duplicates += 1;
        } else {
            index.insert(event.id.clone(), merged.len());
            merged.push(event);
        }
    }

    get_metrics().record_duplicates(duplicates as u64);
    (merged, duplicates)
}

/// Whether rendering at `visible_index` is close enough to the end of
/// `group_count` groups to want the next page.
#[must_use]
pub const fn within_prefetch_threshold(
    visible_index: usize,
    group_count: usize,
    threshold: usize,
) -> bool {
    visible_index.saturating_add(threshold) >= group_count
}
