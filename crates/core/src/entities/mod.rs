//! Domain entities for the notification engine.

pub mod group;
pub mod notification;
pub mod post;

pub use group::NotificationGroup;
pub use notification::{Author, NotificationKind, NotificationType, RawNotification};
pub use post::Post;
