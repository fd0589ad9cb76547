//! Error types for the session core
//!
//! Protocol-level failures (exchange, refresh) are absorbed into session
//! state transitions by [`crate::session::SessionManager`]; these types are
//! what the lower layers report before that happens.

use thiserror::Error;

use crate::storage::StorageError;

/// Errors produced by the authentication session core
#[derive(Debug, Error)]
pub enum AuthError {
    /// Malformed provider configuration. Raised at construction time, before
    /// any network call.
    #[error("configuration error: {0}")]
    Config(String),

    /// PKCE material could not be generated (secure random source
    /// unavailable). Fatal: an authorization flow without an unpredictable
    /// verifier must not be started.
    #[error("PKCE generation failed: {0}")]
    Pkce(String),

    /// A callback arrived but no PKCE attempt is stored for it. The
    /// authorization code is single-use and cannot be replayed without its
    /// verifier; the user must restart the login redirect.
    #[error("no PKCE verifier stored for this attempt")]
    MissingVerifier,

    /// State parameter in the callback does not match the stored attempt.
    #[error("state mismatch: expected {expected}, received {received}")]
    StateMismatch { expected: String, received: String },

    /// Callback URL carried neither a `code` nor an `error` parameter, or
    /// could not be parsed at all.
    #[error("invalid callback: {0}")]
    InvalidCallback(String),

    /// The authorization-code exchange failed. `error` carries the provider's
    /// error code when the provider supplied one.
    #[error("token exchange failed: {reason}")]
    ExchangeFailed { error: Option<String>, reason: String },

    /// Refresh-token exchange failed. `attempts` is the number of tries made
    /// before giving up.
    #[error("token refresh failed after {attempts} attempt(s): {reason}")]
    RefreshFailed { attempts: u32, reason: String },

    /// A refresh was requested but the current token set carries no refresh
    /// token.
    #[error("no refresh token available")]
    NoRefreshToken,

    /// An operation that requires a token set was invoked without one.
    #[error("not authenticated")]
    NotAuthenticated,

    /// The user profile could not be fetched from the resource API.
    #[error("profile fetch failed: {0}")]
    ProfileFetch(String),

    /// Persistence backend failure.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}

impl AuthError {
    /// Provider error code attached to an exchange failure, if any.
    #[must_use]
    pub fn provider_error(&self) -> Option<&str> {
        match self {
            Self::ExchangeFailed { error, .. } => error.as_deref(),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exchange_failed_display_includes_reason() {
        let err = AuthError::ExchangeFailed {
            error: Some("invalid_grant".to_string()),
            reason: "provider returned invalid_grant".to_string(),
        };
        assert!(err.to_string().contains("invalid_grant"));
        assert_eq!(err.provider_error(), Some("invalid_grant"));
    }

    #[test]
    fn refresh_failed_display_includes_attempts() {
        let err = AuthError::RefreshFailed { attempts: 3, reason: "server error".to_string() };
        assert!(err.to_string().contains("3 attempt"));
    }

    #[test]
    fn provider_error_absent_for_other_variants() {
        assert_eq!(AuthError::MissingVerifier.provider_error(), None);
    }
}
