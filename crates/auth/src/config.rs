//! Provider configuration
//!
//! Static OIDC client configuration. Validation happens once at construction;
//! the redirect builders downstream are pure string construction and cannot
//! fail at runtime.

use url::Url;

use crate::errors::AuthError;

/// Validated OAuth2/OIDC provider configuration
#[derive(Debug, Clone)]
pub struct OidcConfig {
    /// Base URL of the authorization server's hosted UI,
    /// e.g. "https://staffport-auth.auth.ap-southeast-2.amazoncognito.com"
    provider_url: String,

    /// OAuth client ID
    pub client_id: String,

    /// Scopes to request (joined with spaces in the authorize URL)
    pub scopes: Vec<String>,
}

impl OidcConfig {
    /// Create and validate a provider configuration.
    ///
    /// # Errors
    /// Returns [`AuthError::Config`] for an unparseable provider URL, a
    /// non-HTTP(S) scheme, a missing host, an empty client ID, or an empty
    /// scope list. These are startup-time failures; nothing downstream
    /// revalidates.
    pub fn new(
        provider_url: impl Into<String>,
        client_id: impl Into<String>,
        scopes: Vec<String>,
    ) -> Result<Self, AuthError> {
        let provider_url = provider_url.into();
        let client_id = client_id.into();

        let parsed = Url::parse(&provider_url)
            .map_err(|e| AuthError::Config(format!("invalid provider URL: {e}")))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(AuthError::Config(format!(
                "provider URL must be http(s), got scheme {}",
                parsed.scheme()
            )));
        }
        if parsed.host_str().is_none() {
            return Err(AuthError::Config("provider URL has no host".to_string()));
        }
        if client_id.is_empty() {
            return Err(AuthError::Config("client_id must not be empty".to_string()));
        }
        if scopes.is_empty() {
            return Err(AuthError::Config("at least one scope is required".to_string()));
        }

        Ok(Self { provider_url, client_id, scopes })
    }

    /// The provider's authorization endpoint.
    #[must_use]
    pub fn authorization_url(&self) -> String {
        format!("{}/oauth2/authorize", self.base())
    }

    /// The provider's token endpoint.
    #[must_use]
    pub fn token_url(&self) -> String {
        format!("{}/oauth2/token", self.base())
    }

    /// The provider's logout endpoint.
    #[must_use]
    pub fn logout_url(&self) -> String {
        format!("{}/logout", self.base())
    }

    /// Scopes as a space-separated string.
    #[must_use]
    pub fn scope_string(&self) -> String {
        self.scopes.join(" ")
    }

    fn base(&self) -> &str {
        self.provider_url.trim_end_matches('/')
    }
}
