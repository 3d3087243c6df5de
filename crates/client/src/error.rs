//! XRPC client errors.

#![allow(missing_docs)]

use notifeed_common::AppError;

/// Error type for XRPC client operations.
#[derive(Debug, thiserror::Error)]
pub enum XrpcError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
    #[error("Authentication rejected by service")]
    Unauthorized,
    #[error("Request failed: {status} - {body}")]
    RequestFailed { status: u16, body: String },
    #[error("Unexpected response body: {0}")]
    Decode(String),
}

impl From<XrpcError> for AppError {
    fn from(err: XrpcError) -> Self {
        match err {
            XrpcError::HttpError(e) if e.is_timeout() => Self::Timeout,
            XrpcError::HttpError(e) if e.is_decode() => Self::Decode(e.to_string()),
            XrpcError::HttpError(e) => Self::Transport(e.to_string()),
            XrpcError::InvalidUrl(msg) => Self::Config(msg),
            XrpcError::Unauthorized => Self::Unauthorized,
            XrpcError::RequestFailed { status, body } => {
                Self::Transport(format!("status {status}: {body}"))
            }
            XrpcError::Decode(msg) => Self::Decode(msg),
        }
    }
}
