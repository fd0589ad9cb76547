//! Core session types
//!
//! Defines the token set owned by the store, the wire format of the
//! provider's token endpoint, the derived session state, and the user profile
//! fetched from the resource API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::errors::AuthError;

/// Well-known role names used by the portal.
pub mod roles {
    pub const ADMIN: &str = "ADMIN";
    pub const STAFF: &str = "STAFF";
}

/// OAuth 2.0 access, ID and refresh tokens with expiry metadata
///
/// Created only by a successful token exchange (initial or refresh). Owned
/// exclusively by the token store and replaced wholesale on refresh; no field
/// is ever updated in place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenSet {
    /// JWT access token presented to the resource API
    pub access_token: String,

    /// ID token (JWT) containing the user's identity claims
    pub id_token: String,

    /// Refresh token, when the provider issued one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,

    /// Token type (always "Bearer")
    pub token_type: String,

    /// Access token lifetime in seconds, as reported by the provider
    pub expires_in: i64,

    /// Absolute expiration timestamp, computed from `expires_in` at creation
    pub expires_at: DateTime<Utc>,
}

impl TokenSet {
    /// Create a token set, computing `expires_at` from the current time.
    #[must_use]
    pub fn new(
        access_token: String,
        id_token: String,
        refresh_token: Option<String>,
        expires_in: i64,
    ) -> Self {
        Self {
            access_token,
            id_token,
            refresh_token,
            token_type: "Bearer".to_string(),
            expires_in,
            expires_at: Utc::now() + chrono::Duration::seconds(expires_in),
        }
    }

    /// Whether `expires_at` has passed.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.expires_within(0)
    }

    /// Whether the token expires within the next `threshold_seconds`.
    #[must_use]
    pub fn expires_within(&self, threshold_seconds: i64) -> bool {
        Utc::now() + chrono::Duration::seconds(threshold_seconds) >= self.expires_at
    }
}

/// Token endpoint response (RFC 6749 §5.1)
#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub id_token: Option<String>,
    pub refresh_token: Option<String>,
    pub token_type: String,
    pub expires_in: i64,
}

impl From<TokenResponse> for TokenSet {
    fn from(response: TokenResponse) -> Self {
        Self::new(
            response.access_token,
            response.id_token.unwrap_or_default(),
            response.refresh_token,
            response.expires_in,
        )
    }
}

/// Token endpoint error body (RFC 6749 §5.2)
#[derive(Debug, Deserialize)]
pub struct OidcErrorBody {
    pub error: String,
    pub error_description: Option<String>,
}

/// Session state derived from the token store and profile-fetch progress.
///
/// Exactly one state holds at any observation point; the state is recomputed
/// from the store on every read, never cached or polled on a timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No token set exists
    Unauthenticated,
    /// No token set exists yet, but a token exchange is in flight
    Pending,
    /// A token set exists and has not expired
    Authenticated,
    /// A token set exists but its expiry has passed without a successful
    /// refresh
    Expired,
}

/// User profile fetched from the resource API (`GET /me`)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub user_id: String,
    pub email: String,
    pub display_name: String,
    pub locale: String,
    pub created_at: String,
    pub updated_at: String,
    pub roles: Vec<String>,
}

impl UserProfile {
    /// Exact set membership; no role implies another.
    #[must_use]
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }
}

/// Query parameters of the provider's redirect back to the callback path
#[derive(Debug, Clone, Default)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
}

impl CallbackParams {
    /// Parse the callback redirect URL the provider sent the browser to.
    ///
    /// # Errors
    /// Returns [`AuthError::InvalidCallback`] if `url` is not a valid URL.
    pub fn from_url(url: &str) -> Result<Self, AuthError> {
        let parsed = Url::parse(url)
            .map_err(|e| AuthError::InvalidCallback(format!("unparseable callback URL: {e}")))?;

        let mut params = Self::default();
        for (key, value) in parsed.query_pairs() {
            match key.as_ref() {
                "code" => params.code = Some(value.into_owned()),
                "state" => params.state = Some(value.into_owned()),
                "error" => params.error = Some(value.into_owned()),
                _ => {}
            }
        }
        Ok(params)
    }

    /// Build params for a successful callback carrying `code`.
    #[must_use]
    pub fn with_code(code: impl Into<String>) -> Self {
        Self { code: Some(code.into()), state: None, error: None }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_set_computes_expiry() {
        let tokens =
            TokenSet::new("access".to_string(), "id".to_string(), Some("refresh".to_string()), 3600);

        assert_eq!(tokens.token_type, "Bearer");
        assert!(!tokens.is_expired());
        assert!(tokens.expires_within(7200));
    }

    #[test]
    fn token_set_with_past_expiry_is_expired() {
        let tokens = TokenSet::new("access".to_string(), "id".to_string(), None, -60);
        assert!(tokens.is_expired());
    }

    #[test]
    fn token_response_conversion_preserves_fields() {
        let response = TokenResponse {
            access_token: "access123".to_string(),
            id_token: Some("id789".to_string()),
            refresh_token: Some("refresh456".to_string()),
            token_type: "Bearer".to_string(),
            expires_in: 3600,
        };

        let tokens: TokenSet = response.into();
        assert_eq!(tokens.access_token, "access123");
        assert_eq!(tokens.id_token, "id789");
        assert_eq!(tokens.refresh_token, Some("refresh456".to_string()));
        assert_eq!(tokens.expires_in, 3600);
    }

    #[test]
    fn profile_role_membership_is_exact() {
        let profile = UserProfile {
            user_id: "u1".to_string(),
            email: "staff@example.com".to_string(),
            display_name: "Staff Member".to_string(),
            locale: "en".to_string(),
            created_at: "2024-01-01T00:00:00Z".to_string(),
            updated_at: "2024-01-01T00:00:00Z".to_string(),
            roles: vec![roles::ADMIN.to_string()],
        };

        assert!(profile.has_role(roles::ADMIN));
        // ADMIN does not imply STAFF
        assert!(!profile.has_role(roles::STAFF));
    }

    #[test]
    fn profile_deserializes_camel_case() {
        let json = r#"{
            "userId": "u1",
            "email": "a@b.c",
            "displayName": "A",
            "locale": "en",
            "createdAt": "2024-01-01T00:00:00Z",
            "updatedAt": "2024-01-01T00:00:00Z",
            "roles": ["STAFF"]
        }"#;

        let profile: UserProfile = serde_json::from_str(json).unwrap();
        assert_eq!(profile.user_id, "u1");
        assert_eq!(profile.roles, vec!["STAFF".to_string()]);
    }

    #[test]
    fn callback_params_parse_code_and_state() {
        let params =
            CallbackParams::from_url("https://portal.example.com/auth/callback?code=abc&state=xyz")
                .unwrap();

        assert_eq!(params.code.as_deref(), Some("abc"));
        assert_eq!(params.state.as_deref(), Some("xyz"));
        assert_eq!(params.error, None);
    }

    #[test]
    fn callback_params_parse_error() {
        let params =
            CallbackParams::from_url("https://portal.example.com/auth/callback?error=access_denied")
                .unwrap();

        assert_eq!(params.error.as_deref(), Some("access_denied"));
        assert_eq!(params.code, None);
    }

    #[test]
    fn callback_params_reject_garbage() {
        assert!(matches!(
            CallbackParams::from_url("not a url"),
            Err(AuthError::InvalidCallback(_))
        ));
    }
}
