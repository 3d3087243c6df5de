//! Subject post entity.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::notification::Author;

/// A resolved post shown as a group preview.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    /// Post URI
    pub uri: String,
    /// Content identifier of this revision
    pub cid: String,
    /// Post author
    pub author: Author,
    /// Post text
    #[serde(default)]
    pub text: String,
    /// When the post was indexed
    pub indexed_at: DateTime<Utc>,
    /// Like count at resolution time
    #[serde(default)]
    pub like_count: u64,
    /// Repost count at resolution time
    #[serde(default)]
    pub repost_count: u64,
    /// Reply count at resolution time
    #[serde(default)]
    pub reply_count: u64,
}
