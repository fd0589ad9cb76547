//! API adapter error types
//!
//! Classifies resource API failures. The split that matters for the session:
//! `Unauthorized` (401) is the sole trigger for the refresh-or-logout path,
//! while `Forbidden` (403) is a role failure that never touches tokens.

use std::time::Duration;

use thiserror::Error;

/// Resource API operation errors
#[derive(Debug, Error)]
pub enum ApiError {
    /// 401 from the resource API after the single allowed refresh-and-retry
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// 403 from the resource API; a role failure, not an auth failure
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// 5xx from the resource API
    #[error("server error: {0}")]
    Server(String),

    /// Other 4xx from the resource API
    #[error("client error: {0}")]
    Client(String),

    /// Transport failure
    #[error("network error: {0}")]
    Network(String),

    /// Request exceeded the bounded client-side timeout
    #[error("timeout after {0:?}")]
    Timeout(Duration),

    /// Adapter misconfiguration
    #[error("configuration error: {0}")]
    Config(String),

    /// Token acquisition or refresh through the session failed
    #[error("session error: {0}")]
    Auth(String),
}
