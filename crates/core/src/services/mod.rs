//! Notification engine services.

pub mod event_store;
pub mod grouping;
pub mod pagination;
pub mod session;
pub mod subject_post;
pub mod unread;

pub use event_store::{Cursor, EventStore, NotificationPage};
pub use grouping::{GroupingPolicy, group_notifications};
pub use pagination::{CursorState, DEFAULT_PREFETCH_THRESHOLD, PaginationController};
pub use session::{
    NotificationSession, Operation, OperationOutcome, SessionConfig, SessionError, SessionPhase,
    SessionSnapshot,
};
pub use subject_post::SubjectPostCache;
pub use unread::UnreadTracker;
