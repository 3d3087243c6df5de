//! Common utilities and shared types for notifeed.
//!
//! This crate provides foundational components used across all notifeed crates:
//!
//! - **Configuration**: Application settings via [`Config`]
//! - **Error handling**: Unified error types via [`AppError`] and [`AppResult`]
//! - **Metrics**: Engine counters via [`Metrics`]
//! - **Storage**: Persistence of the "last seen" mark via [`SeenStateStore`]
//!
//! # Example
//!
//! ```no_run
//! use notifeed_common::{AppResult, Config};
//!
//! fn example() -> AppResult<()> {
//!     let config = Config::load()?;
//!     println!("Event store: {}", config.event_store.service_url);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod metrics;
pub mod storage;

pub use config::{Config, EventStoreConfig, FeedConfig, LogFormat, LoggingConfig, StateConfig};
pub use error::{AppError, AppResult};
pub use metrics::{Metrics, MetricsSnapshot, Timer, get_metrics};
pub use storage::{FileSeenStore, MemorySeenStore, SeenStateStore};
