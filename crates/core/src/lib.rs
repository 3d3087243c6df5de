//! Notification aggregation and pagination engine.
//!
//! Turns a chronological stream of social-network notification events into a
//! deduplicated, grouped, paginated and unread-aware feed. The backend is
//! reached through the [`EventStore`] trait; the rendering layer reads
//! [`SessionSnapshot`]s published by a [`NotificationSession`].

pub mod entities;
pub mod services;

pub use entities::*;
pub use services::*;
