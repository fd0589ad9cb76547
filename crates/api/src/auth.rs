//! Access token provisioning for the API adapter
//!
//! The adapter never reads raw tokens itself; it goes through
//! [`AccessTokenProvider`], which the session manager implements. The trait
//! also carries the single-shot refresh hook the 401 path uses.

use async_trait::async_trait;
use staffport_auth::SessionManager;

use crate::errors::ApiError;

/// Provides bearer tokens to the HTTP adapter.
///
/// Abstracting this enables testing with mock providers and keeps the
/// adapter independent of the session internals.
#[async_trait]
pub trait AccessTokenProvider: Send + Sync {
    /// Current access token. Does not refresh.
    async fn access_token(&self) -> Result<String, ApiError>;

    /// Perform exactly one refresh attempt and return the new access token.
    ///
    /// Called by the adapter at most once per logical request, on a 401. A
    /// failed refresh demotes the session; the adapter surfaces the error.
    async fn refresh(&self) -> Result<String, ApiError>;
}

#[async_trait]
impl AccessTokenProvider for SessionManager {
    async fn access_token(&self) -> Result<String, ApiError> {
        SessionManager::access_token(self)
            .ok_or_else(|| ApiError::Auth("not authenticated".to_string()))
    }

    async fn refresh(&self) -> Result<String, ApiError> {
        self.refresh_once()
            .await
            .map_err(|e| ApiError::Auth(format!("token refresh failed: {e}")))?;

        SessionManager::access_token(self)
            .ok_or_else(|| ApiError::Auth("no access token after refresh".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct StaticProvider {
        token: String,
    }

    #[async_trait]
    impl AccessTokenProvider for StaticProvider {
        async fn access_token(&self) -> Result<String, ApiError> {
            Ok(self.token.clone())
        }

        async fn refresh(&self) -> Result<String, ApiError> {
            Err(ApiError::Auth("no refresh in static provider".to_string()))
        }
    }

    #[tokio::test]
    async fn static_provider_yields_token() {
        let provider = StaticProvider { token: "test-token".to_string() };
        assert_eq!(provider.access_token().await.unwrap(), "test-token");
    }
}
