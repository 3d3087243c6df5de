//! Event store abstraction.
//!
//! The event store supplies pages of raw notifications, resolves posts by URI
//! and records the "seen" mark on the backend. The concrete transport lives
//! outside the core (see the `notifeed-client` crate); timeouts, auth and
//! connection handling are its concern.

use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use notifeed_common::AppResult;
use serde::{Deserialize, Serialize};

use crate::entities::{Post, RawNotification};

/// Opaque continuation token for the next page.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Cursor(String);

impl Cursor {
    /// Wrap a backend token.
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// The raw token.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One page of raw notifications.
///
/// Events are sorted newest first within the page. A `None` cursor means the
/// backend has nothing older.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NotificationPage {
    /// Events in this page
    pub events: Vec<RawNotification>,
    /// Token for the next page
    pub next_cursor: Option<Cursor>,
}

/// Trait for the backend that owns notifications.
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Fetch a page of notifications, starting after `cursor` when given.
    async fn fetch_notifications(&self, cursor: Option<&Cursor>) -> AppResult<NotificationPage>;

    /// Resolve a post by URI.
    async fn resolve_post(&self, uri: &str) -> AppResult<Post>;

    /// Record that everything indexed at or before `through` has been seen.
    async fn mark_seen(&self, through: DateTime<Utc>) -> AppResult<()>;
}
