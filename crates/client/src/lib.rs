//! XRPC event store client for notifeed.
//!
//! Implements [`notifeed_core::EventStore`] over HTTP against an AT-protocol
//! style notification service.

pub mod client;
pub mod error;
mod wire;

pub use client::XrpcEventStore;
pub use error::XrpcError;
