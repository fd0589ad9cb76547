//! OIDC client: redirect URL construction and token endpoint calls
//!
//! Handles the provider-facing half of the authorization code flow:
//! - authorization URL building (with the PKCE challenge)
//! - logout URL building
//! - authorization code exchange
//! - refresh-token exchange
//!
//! A single `exchange` call is never retried here: a stale authorization code
//! cannot succeed twice, so recovery always means restarting the login
//! redirect. Bounded refresh retries live in the session layer.

use std::time::Duration;

use reqwest::Client;
use tracing::debug;

use crate::config::OidcConfig;
use crate::errors::AuthError;
use crate::pkce::PkceAttempt;
use crate::types::{OidcErrorBody, TokenResponse, TokenSet};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// HTTP client for the OAuth2/OIDC provider
#[derive(Debug, Clone)]
pub struct OidcClient {
    config: OidcConfig,
    http: Client,
}

impl OidcClient {
    /// Create a client with the default request timeout.
    ///
    /// # Errors
    /// Returns [`AuthError::Config`] if the underlying HTTP client cannot be
    /// constructed.
    pub fn new(config: OidcConfig) -> Result<Self, AuthError> {
        Self::with_timeout(config, DEFAULT_TIMEOUT)
    }

    /// Create a client with an explicit request timeout. The timeout bounds
    /// every token endpoint call; expiry maps to the same typed failure as an
    /// HTTP error.
    ///
    /// # Errors
    /// Returns [`AuthError::Config`] if the underlying HTTP client cannot be
    /// constructed.
    pub fn with_timeout(config: OidcConfig, timeout: Duration) -> Result<Self, AuthError> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AuthError::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { config, http })
    }

    /// Provider configuration in use.
    #[must_use]
    pub fn config(&self) -> &OidcConfig {
        &self.config
    }

    /// Build the authorization URL the browser is sent to for login.
    ///
    /// Pure construction; the attempt must already be persisted by the
    /// caller so the verifier survives the redirect round trip.
    #[must_use]
    pub fn build_authorization_url(&self, attempt: &PkceAttempt, redirect_uri: &str) -> String {
        let scope = self.config.scope_string();
        let params = [
            ("response_type", "code"),
            ("client_id", self.config.client_id.as_str()),
            ("redirect_uri", redirect_uri),
            ("scope", scope.as_str()),
            ("state", attempt.state.as_str()),
            ("code_challenge", attempt.code_challenge.as_str()),
            ("code_challenge_method", attempt.challenge_method()),
        ];

        format!("{}?{}", self.config.authorization_url(), encode_query(&params))
    }

    /// Build the provider logout URL. No PKCE is involved.
    #[must_use]
    pub fn build_logout_url(&self, redirect_uri: &str) -> String {
        let params = [("client_id", self.config.client_id.as_str()), ("logout_uri", redirect_uri)];

        format!("{}?{}", self.config.logout_url(), encode_query(&params))
    }

    /// Exchange an authorization code for a token set.
    ///
    /// One form-encoded POST to the token endpoint, carrying the verifier
    /// from the matching attempt.
    ///
    /// # Errors
    /// Returns [`AuthError::ExchangeFailed`] for any transport failure,
    /// timeout, non-success status (with the provider's error code when it
    /// sent one), or unparseable response body.
    pub async fn exchange(
        &self,
        code: &str,
        attempt: &PkceAttempt,
        redirect_uri: &str,
    ) -> Result<TokenSet, AuthError> {
        debug!("exchanging authorization code");

        let params = [
            ("grant_type", "authorization_code"),
            ("client_id", self.config.client_id.as_str()),
            ("code", code),
            ("redirect_uri", redirect_uri),
            ("code_verifier", attempt.code_verifier.as_str()),
        ];

        let response = self
            .http
            .post(self.config.token_url())
            .form(&params)
            .send()
            .await
            .map_err(|e| AuthError::ExchangeFailed { error: None, reason: transport_reason(&e) })?;

        if !response.status().is_success() {
            let (error, reason) = provider_failure(response).await;
            return Err(AuthError::ExchangeFailed { error, reason });
        }

        let token_response: TokenResponse = response.json().await.map_err(|e| {
            AuthError::ExchangeFailed {
                error: None,
                reason: format!("unparseable token response: {e}"),
            }
        })?;

        Ok(token_response.into())
    }

    /// Exchange a refresh token for a new token set.
    ///
    /// # Errors
    /// Returns [`AuthError::NoRefreshToken`] for an empty token and
    /// [`AuthError::RefreshFailed`] (with `attempts: 1`) for any transport,
    /// timeout, status, or parse failure of this single call.
    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenSet, AuthError> {
        if refresh_token.is_empty() {
            return Err(AuthError::NoRefreshToken);
        }

        debug!("refreshing access token");

        let params = [
            ("grant_type", "refresh_token"),
            ("client_id", self.config.client_id.as_str()),
            ("refresh_token", refresh_token),
        ];

        let response = self
            .http
            .post(self.config.token_url())
            .form(&params)
            .send()
            .await
            .map_err(|e| AuthError::RefreshFailed { attempts: 1, reason: transport_reason(&e) })?;

        if !response.status().is_success() {
            let (_, reason) = provider_failure(response).await;
            return Err(AuthError::RefreshFailed { attempts: 1, reason });
        }

        let token_response: TokenResponse = response.json().await.map_err(|e| {
            AuthError::RefreshFailed {
                attempts: 1,
                reason: format!("unparseable token response: {e}"),
            }
        })?;

        Ok(token_response.into())
    }
}

fn encode_query(params: &[(&str, &str)]) -> String {
    params
        .iter()
        .map(|(k, v)| format!("{k}={}", urlencoding::encode(v)))
        .collect::<Vec<_>>()
        .join("&")
}

fn transport_reason(e: &reqwest::Error) -> String {
    if e.is_timeout() {
        "token endpoint timed out".to_string()
    } else {
        format!("token endpoint unreachable: {e}")
    }
}

/// Decode the provider's error body, falling back to the raw status.
async fn provider_failure(response: reqwest::Response) -> (Option<String>, String) {
    let status = response.status();
    match response.json::<OidcErrorBody>().await {
        Ok(body) => {
            let reason = match &body.error_description {
                Some(desc) => format!("provider returned {}: {desc}", body.error),
                None => format!("provider returned {}", body.error),
            };
            (Some(body.error), reason)
        }
        Err(_) => (None, format!("token endpoint returned status {status}")),
    }
}
