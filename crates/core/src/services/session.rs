//! Notification aggregation session.
//!
//! The session owns the materialized notification window and is the only
//! thing that mutates it. It composes the pagination controller, the grouping
//! engine and the unread tracker behind four operations:
//!
//! - [`NotificationSession::load_notifications`]
//! - [`NotificationSession::refresh_notifications`]
//! - [`NotificationSession::load_more_notifications`]
//! - [`NotificationSession::mark_notifications_as_seen`]
//!
//! Every state change publishes a new immutable [`SessionSnapshot`]; the
//! rendering layer only ever reads snapshots.
//!
//! # Concurrency
//!
//! The session is cheap to clone and safe to drive from many tasks. State sits
//! behind a mutex that is held while checking guards and while applying a
//! fetch result, never while waiting on the network. Requests for an
//! operation that is already in flight are ignored. Each fetch carries a
//! generation number; a result that completes after a newer fetch started is
//! discarded.
//!
//! Subject post previews are resolved after a page is applied and published,
//! so a slow lookup never holds the groups back. A second snapshot carries the
//! previews once they arrive.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use notifeed_common::{AppError, AppResult, SeenStateStore, get_metrics};
use serde::Serialize;
use tokio::sync::{Mutex, watch};
use tracing::{debug, info, warn};

use super::event_store::{Cursor, EventStore, NotificationPage};
use super::grouping::group_notifications;
use super::pagination::{
    CursorState, DEFAULT_PREFETCH_THRESHOLD, PaginationController, first_page_events, merge_page,
    within_prefetch_threshold,
};
use super::subject_post::{SubjectPostCache, resolve_all};
use super::unread::{UnreadTracker, apply_seen_mark, unread_group_count};
use crate::entities::{NotificationGroup, RawNotification};

/// Session tuning.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Distance from the end of the group list that triggers the next page.
    pub prefetch_threshold: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            prefetch_threshold: DEFAULT_PREFETCH_THRESHOLD,
        }
    }
}

/// Primary session state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SessionPhase {
    /// Nothing loaded yet, or the initial load failed.
    Empty,
    /// The first page is being fetched.
    LoadingInitial,
    /// Groups are available.
    Ready,
}

/// The four session operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Operation {
    /// Initial load
    Load,
    /// Refresh from the top
    Refresh,
    /// Next page
    LoadMore,
    /// Mark everything seen
    MarkSeen,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Load => "load",
            Self::Refresh => "refresh",
            Self::LoadMore => "load_more",
            Self::MarkSeen => "mark_seen",
        })
    }
}

/// What happened to an operation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationOutcome {
    /// The operation ran and its result is visible.
    Applied,
    /// The request was not valid in the current state, or the same operation
    /// was already in flight. Nothing was fetched.
    Ignored,
    /// The fetch completed after a newer one started; its result was dropped.
    Superseded,
}

/// The most recent failure, kept for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionError {
    /// Operation that failed
    pub operation: Operation,
    /// Error code
    pub code: &'static str,
    /// Human readable message
    pub message: String,
}

impl SessionError {
    fn new(operation: Operation, error: &AppError) -> Self {
        Self {
            operation,
            code: error.error_code(),
            message: error.to_string(),
        }
    }
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} failed: {}", self.operation, self.message)
    }
}

/// Read-only view of the session for the rendering layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSnapshot {
    /// Primary state
    pub phase: SessionPhase,
    /// Groups, newest first
    pub groups: Arc<Vec<NotificationGroup>>,
    /// The initial load is in flight
    pub is_loading: bool,
    /// A next-page fetch is in flight
    pub is_loading_more: bool,
    /// A refresh is in flight
    pub is_refreshing: bool,
    /// A mark-seen call is in flight
    pub is_marking_seen: bool,
    /// The backend has older notifications
    pub has_more_notifications: bool,
    /// Current high-water mark
    pub last_seen_at: Option<DateTime<Utc>>,
    /// Groups with at least one unread member
    pub unread_count: usize,
    /// Most recent failure, cleared by the next success
    pub last_error: Option<SessionError>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FetchKind {
    Initial,
    Refresh,
    More,
}

impl FetchKind {
    const fn operation(self) -> Operation {
        match self {
            Self::Initial => Operation::Load,
            Self::Refresh => Operation::Refresh,
            Self::More => Operation::LoadMore,
        }
    }
}

struct SessionState {
    phase: SessionPhase,
    loading_more: bool,
    refreshing: bool,
    marking_seen: bool,
    events: Vec<RawNotification>,
    groups: Arc<Vec<NotificationGroup>>,
    cursor: CursorState,
    tracker: UnreadTracker,
    posts: SubjectPostCache,
    last_error: Option<SessionError>,
    generation: u64,
}

impl SessionState {
    fn new(last_seen_at: Option<DateTime<Utc>>) -> Self {
        Self {
            phase: SessionPhase::Empty,
            loading_more: false,
            refreshing: false,
            marking_seen: false,
            events: Vec::new(),
            groups: Arc::new(Vec::new()),
            cursor: CursorState::default(),
            tracker: UnreadTracker::new(last_seen_at),
            posts: SubjectPostCache::new(),
            last_error: None,
            generation: 0,
        }
    }

    fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            phase: self.phase,
            groups: self.groups.clone(),
            is_loading: self.phase == SessionPhase::LoadingInitial,
            is_loading_more: self.loading_more,
            is_refreshing: self.refreshing,
            is_marking_seen: self.marking_seen,
            has_more_notifications: self.cursor.has_more(),
            last_seen_at: self.tracker.last_seen_at(),
            unread_count: unread_group_count(&self.groups),
            last_error: self.last_error.clone(),
        }
    }

    /// Recompute groups from the held events.
    fn rebuild_groups(&mut self) {
        let mut groups = group_notifications(&self.events);
        self.tracker.annotate(&mut groups);
        self.posts.attach(&mut groups);
        self.groups = Arc::new(groups);
    }

    /// Try to start a fetch. Returns the generation and cursor to use.
    fn begin_fetch(&mut self, kind: FetchKind) -> Option<(u64, Option<Cursor>)> {
        let cursor = match kind {
            FetchKind::Initial => {
                if self.phase != SessionPhase::Empty {
                    return None;
                }
                self.phase = SessionPhase::LoadingInitial;
                None
            }
            FetchKind::Refresh => {
                if self.phase != SessionPhase::Ready || self.refreshing {
                    return None;
                }
                if self.loading_more {
                    debug!("Refresh supersedes in-flight load more");
                    self.loading_more = false;
                }
                self.refreshing = true;
                None
            }
            FetchKind::More => {
                if self.phase != SessionPhase::Ready || self.loading_more || self.refreshing {
                    return None;
                }
                let cursor = self.cursor.next_cursor()?.clone();
                self.loading_more = true;
                Some(cursor)
            }
        };

        self.generation += 1;
        Some((self.generation, cursor))
    }

    /// Clear the in-flight marker for `kind` after a failure.
    fn fail_fetch(&mut self, kind: FetchKind, error: &AppError) {
        match kind {
            FetchKind::Initial => self.phase = SessionPhase::Empty,
            FetchKind::Refresh => self.refreshing = false,
            FetchKind::More => self.loading_more = false,
        }
        self.last_error = Some(SessionError::new(kind.operation(), error));
    }

    /// Apply a fetched page. Grouping runs here, before any flag is cleared.
    fn apply_page(&mut self, kind: FetchKind, events: Vec<RawNotification>, next: Option<Cursor>) {
        match kind {
            FetchKind::Initial => {
                self.events = events;
                self.phase = SessionPhase::Ready;
            }
            FetchKind::Refresh => {
                self.events = events;
                self.refreshing = false;
            }
            FetchKind::More => {
                let (merged, _) = merge_page(&self.events, events);
                self.events = merged;
                self.loading_more = false;
            }
        }
        if next.is_none() {
            debug!("Notification window exhausted");
        }
        self.cursor.replace(next);
        self.last_error = None;
        self.rebuild_groups();
    }
}

struct SessionInner {
    controller: PaginationController,
    seen_store: Option<Arc<dyn SeenStateStore>>,
    config: SessionConfig,
    state: Mutex<SessionState>,
    snapshot_tx: watch::Sender<Arc<SessionSnapshot>>,
}

/// Notification aggregation session.
#[derive(Clone)]
pub struct NotificationSession {
    inner: Arc<SessionInner>,
}

impl NotificationSession {
    /// Create a new session.
    ///
    /// `last_seen_at` is the persisted high-water mark, or `None` if nothing
    /// has ever been marked seen.
    #[must_use]
    pub fn new(store: Arc<dyn EventStore>, last_seen_at: Option<DateTime<Utc>>) -> Self {
        Self::with_config(store, last_seen_at, SessionConfig::default())
    }

    /// Create a new session with custom tuning.
    #[must_use]
    pub fn with_config(
        store: Arc<dyn EventStore>,
        last_seen_at: Option<DateTime<Utc>>,
        config: SessionConfig,
    ) -> Self {
        Self::build(store, last_seen_at, config, None)
    }

    /// Create a session whose mark is restored from and written back to `seen_store`.
    pub async fn restore(
        store: Arc<dyn EventStore>,
        seen_store: Arc<dyn SeenStateStore>,
        config: SessionConfig,
    ) -> AppResult<Self> {
        let last_seen_at = seen_store.load().await?;
        info!(last_seen_at = ?last_seen_at, "Restored notification seen state");
        Ok(Self::build(store, last_seen_at, config, Some(seen_store)))
    }

    fn build(
        store: Arc<dyn EventStore>,
        last_seen_at: Option<DateTime<Utc>>,
        config: SessionConfig,
        seen_store: Option<Arc<dyn SeenStateStore>>,
    ) -> Self {
        let state = SessionState::new(last_seen_at);
        let (snapshot_tx, _) = watch::channel(Arc::new(state.snapshot()));

        Self {
            inner: Arc::new(SessionInner {
                controller: PaginationController::new(store),
                seen_store,
                config,
                state: Mutex::new(state),
                snapshot_tx,
            }),
        }
    }

    /// The latest snapshot.
    #[must_use]
    pub fn snapshot(&self) -> Arc<SessionSnapshot> {
        self.inner.snapshot_tx.borrow().clone()
    }

    /// Subscribe to snapshots. The receiver always holds the latest one.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Arc<SessionSnapshot>> {
        self.inner.snapshot_tx.subscribe()
    }

    fn publish(&self, state: &SessionState) {
        self.inner.snapshot_tx.send_replace(Arc::new(state.snapshot()));
    }

    /// Load the first page. Only valid while the session is empty.
    pub async fn load_notifications(&self) -> AppResult<OperationOutcome> {
        self.run_fetch(FetchKind::Initial).await
    }

    /// Replace the window with a fresh first page. Only valid once ready.
    ///
    /// A refresh supersedes an in-flight load-more, whose result is then
    /// discarded. On failure the previous groups stay untouched.
    pub async fn refresh_notifications(&self) -> AppResult<OperationOutcome> {
        self.run_fetch(FetchKind::Refresh).await
    }

    /// Append the next page. Ignored when there is no cursor, or when a
    /// refresh or another load-more is in flight.
    pub async fn load_more_notifications(&self) -> AppResult<OperationOutcome> {
        self.run_fetch(FetchKind::More).await
    }

    /// Request the next page if `visible_index` is within the prefetch
    /// threshold of the end of the group list.
    pub async fn load_more_if_needed(&self, visible_index: usize) -> AppResult<OperationOutcome> {
        let near_end = {
            let state = self.inner.state.lock().await;
            within_prefetch_threshold(
                visible_index,
                state.groups.len(),
                self.inner.config.prefetch_threshold,
            )
        };

        if near_end {
            self.load_more_notifications().await
        } else {
            Ok(OperationOutcome::Ignored)
        }
    }

    async fn run_fetch(&self, kind: FetchKind) -> AppResult<OperationOutcome> {
        let operation = kind.operation();
        let (generation, cursor) = {
            let mut state = self.inner.state.lock().await;
            match state.begin_fetch(kind) {
                Some(started) => {
                    self.publish(&state);
                    started
                }
                None => {
                    debug!(%operation, "Ignoring notification request");
                    return Ok(OperationOutcome::Ignored);
                }
            }
        };

        let result = match &cursor {
            Some(cursor) => self.inner.controller.fetch_next_page(cursor).await,
            None => self.inner.controller.fetch_first_page().await,
        };

        let page = match result {
            Ok(page) => page,
            Err(e) => {
                let mut state = self.inner.state.lock().await;
                if state.generation != generation {
                    get_metrics().record_superseded();
                    debug!(%operation, error = %e, "Discarding superseded failure");
                    return Ok(OperationOutcome::Superseded);
                }
                state.fail_fetch(kind, &e);
                self.publish(&state);
                warn!(%operation, error = %e, "Notification fetch failed");
                return Err(e);
            }
        };

        let NotificationPage { events, next_cursor } = page;
        let events = match kind {
            FetchKind::More => events,
            FetchKind::Initial | FetchKind::Refresh => first_page_events(events),
        };
        let missing = {
            let mut state = self.inner.state.lock().await;
            if state.generation != generation {
                get_metrics().record_superseded();
                debug!(%operation, "Discarding superseded notification page");
                return Ok(OperationOutcome::Superseded);
            }

            if kind == FetchKind::Refresh {
                state.posts.forget_failures();
            }
            let missing = state.posts.missing_for(&events);

            let incoming = events.len();
            state.apply_page(kind, events, next_cursor);
            self.publish(&state);
            info!(
                %operation,
                incoming,
                groups = state.groups.len(),
                has_more = state.cursor.has_more(),
                "Applied notification page"
            );
            missing
        };

        self.attach_subject_posts(generation, missing).await;
        Ok(OperationOutcome::Applied)
    }

    /// Resolve subject posts for an applied page and republish with previews.
    ///
    /// Groups are already visible without previews while this runs. Results
    /// are dropped if another fetch started in the meantime; that fetch looks
    /// up whatever is still missing.
    async fn attach_subject_posts(&self, generation: u64, missing: Vec<String>) {
        if missing.is_empty() {
            return;
        }

        let resolved = resolve_all(self.inner.controller.store().as_ref(), missing).await;

        let mut state = self.inner.state.lock().await;
        if state.generation != generation {
            debug!(count = resolved.len(), "Dropping subject posts resolved for a superseded page");
            return;
        }
        for (uri, result) in resolved {
            state.posts.record(uri, result);
        }
        state.rebuild_groups();
        self.publish(&state);
    }

    /// Mark everything materialized as seen.
    ///
    /// Sends the `indexed_at` of the newest held notification to the backend.
    /// On success the high-water mark advances to that value and is written
    /// back to the seen-state store, if one is configured. On failure the mark
    /// is unchanged and the error is recorded. Ignored when nothing is unread.
    pub async fn mark_notifications_as_seen(&self) -> AppResult<OperationOutcome> {
        let through = {
            let mut state = self.inner.state.lock().await;
            if state.phase != SessionPhase::Ready || state.marking_seen {
                debug!(operation = %Operation::MarkSeen, "Ignoring notification request");
                return Ok(OperationOutcome::Ignored);
            }
            let Some(through) = state.tracker.pending_mark(&state.events) else {
                debug!("Nothing unread to mark as seen");
                return Ok(OperationOutcome::Ignored);
            };
            state.marking_seen = true;
            self.publish(&state);
            through
        };

        let result =
            UnreadTracker::mark_all_seen(self.inner.controller.store().as_ref(), through).await;

        let last_seen_at = {
            let mut state = self.inner.state.lock().await;
            state.marking_seen = false;

            if let Err(e) = result {
                state.last_error = Some(SessionError::new(Operation::MarkSeen, &e));
                self.publish(&state);
                return Err(e);
            }

            state.tracker.advance(through);
            state.events = apply_seen_mark(&state.events, through);
            state.last_error = None;
            state.rebuild_groups();
            self.publish(&state);
            info!(%through, unread = unread_group_count(&state.groups), "Marked notifications as seen");
            state.tracker.last_seen_at()
        };

        if let (Some(store), Some(mark)) = (&self.inner.seen_store, last_seen_at) {
            if let Err(e) = store.save(mark).await {
                warn!(error = %e, "Failed to persist last seen mark");
            }
        }

        Ok(OperationOutcome::Applied)
    }
}
