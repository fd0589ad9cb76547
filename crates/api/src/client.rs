//! Authenticated API client
//!
//! HTTP adapter between the portal and the resource API. Every request
//! carries the current bearer token; a 401 triggers exactly one refresh
//! attempt followed by one retry of the original request. The `retried`
//! marker guarantees termination — there is no path that loops.

use std::sync::Arc;
use std::time::Duration;

use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, Method, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use crate::auth::AccessTokenProvider;
use crate::errors::ApiError;

/// Configuration for the API client
#[derive(Debug, Clone)]
pub struct ApiClientConfig {
    /// Base URL for the resource API (e.g. "https://portal.example.com/api/v1")
    pub base_url: String,
    /// Timeout applied to every request
    pub timeout: Duration,
}

impl Default for ApiClientConfig {
    fn default() -> Self {
        Self {
            base_url: "https://portal.example.com/api/v1".to_string(),
            timeout: Duration::from_secs(10),
        }
    }
}

/// Resource API client with bearer authentication
pub struct ApiClient {
    http: Client,
    auth: Arc<dyn AccessTokenProvider>,
    config: ApiClientConfig,
}

impl ApiClient {
    /// Create a new API client.
    ///
    /// # Errors
    /// Returns [`ApiError::Config`] if the underlying HTTP client cannot be
    /// built.
    pub fn new(
        config: ApiClientConfig,
        auth: Arc<dyn AccessTokenProvider>,
    ) -> Result<Self, ApiError> {
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ApiError::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { http, auth, config })
    }

    /// Create a builder for fluent configuration.
    #[must_use]
    pub fn builder() -> ApiClientBuilder {
        ApiClientBuilder::default()
    }

    /// Execute a GET request.
    ///
    /// # Errors
    /// Returns an error if the request fails or the response cannot be
    /// deserialized.
    #[instrument(skip(self), fields(path = %path))]
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let response = self.send_with_auth(Method::GET, path, None, None).await?;
        decode(response).await
    }

    /// Execute a GET request with query parameters.
    ///
    /// # Errors
    /// Returns an error if the request fails or the response cannot be
    /// deserialized.
    #[instrument(skip(self, query), fields(path = %path))]
    pub async fn get_with_query<Q, T>(&self, path: &str, query: &Q) -> Result<T, ApiError>
    where
        Q: Serialize + Sync,
        T: DeserializeOwned,
    {
        let query = serde_json::to_value(query)
            .map_err(|e| ApiError::Client(format!("failed to serialize query: {e}")))?;
        let response = self.send_with_auth(Method::GET, path, Some(query), None).await?;
        decode(response).await
    }

    /// Execute a POST request.
    ///
    /// # Errors
    /// Returns an error if the request fails or the response cannot be
    /// deserialized.
    #[instrument(skip(self, body), fields(path = %path))]
    pub async fn post<B, T>(&self, path: &str, body: &B) -> Result<T, ApiError>
    where
        B: Serialize + Sync,
        T: DeserializeOwned,
    {
        let body = serde_json::to_value(body)
            .map_err(|e| ApiError::Client(format!("failed to serialize body: {e}")))?;
        let response = self.send_with_auth(Method::POST, path, None, Some(body)).await?;
        decode(response).await
    }

    /// Execute a PATCH request.
    ///
    /// # Errors
    /// Returns an error if the request fails or the response cannot be
    /// deserialized.
    #[instrument(skip(self, body), fields(path = %path))]
    pub async fn patch<B, T>(&self, path: &str, body: &B) -> Result<T, ApiError>
    where
        B: Serialize + Sync,
        T: DeserializeOwned,
    {
        let body = serde_json::to_value(body)
            .map_err(|e| ApiError::Client(format!("failed to serialize body: {e}")))?;
        let response = self.send_with_auth(Method::PATCH, path, None, Some(body)).await?;
        decode(response).await
    }

    /// Health check for the resource API. Unauthenticated.
    ///
    /// # Errors
    /// Returns an error only if the API is unreachable; a non-success status
    /// yields `Ok(false)`.
    #[instrument(skip(self))]
    pub async fn health_check(&self) -> Result<bool, ApiError> {
        let url = format!("{}/healthz", self.config.base_url);

        let response = self.http.get(&url).send().await.map_err(|e| self.map_transport(&e))?;

        if response.status().is_success() {
            Ok(true)
        } else {
            warn!(status = %response.status(), "resource API unhealthy");
            Ok(false)
        }
    }

    /// Send one logical request: bearer attached, at most one
    /// refresh-and-retry on 401.
    async fn send_with_auth(
        &self,
        method: Method,
        path: &str,
        query: Option<Value>,
        body: Option<Value>,
    ) -> Result<Response, ApiError> {
        let url = format!("{}{}", self.config.base_url, path);
        let mut token = self.auth.access_token().await?;
        let mut retried = false;

        loop {
            let mut request = self
                .http
                .request(method.clone(), &url)
                .header(AUTHORIZATION, format!("Bearer {token}"))
                .header(CONTENT_TYPE, "application/json");
            if let Some(query) = &query {
                request = request.query(query);
            }
            if let Some(body) = &body {
                request = request.json(body);
            }

            let response = request.send().await.map_err(|e| self.map_transport(&e))?;
            let status = response.status();

            if status == StatusCode::UNAUTHORIZED && !retried {
                // Sole trigger for the refresh path. One refresh, one retry.
                retried = true;
                debug!(url = %url, "401 from resource API, refreshing token");
                token = self.auth.refresh().await?;
                continue;
            }

            if !status.is_success() {
                let body_text = response.text().await.unwrap_or_default();
                return Err(map_status(status, &url, body_text));
            }

            info!(path = %path, "request successful");
            return Ok(response);
        }
    }

    fn map_transport(&self, e: &reqwest::Error) -> ApiError {
        if e.is_timeout() {
            ApiError::Timeout(self.config.timeout)
        } else {
            ApiError::Network(e.to_string())
        }
    }
}

fn map_status(status: StatusCode, url: &str, body: String) -> ApiError {
    let message = if body.is_empty() {
        format!("{url} returned status {status}")
    } else {
        format!("{url} returned status {status}: {body}")
    };

    if status == StatusCode::UNAUTHORIZED {
        ApiError::Unauthorized(message)
    } else if status == StatusCode::FORBIDDEN {
        ApiError::Forbidden(message)
    } else if status.is_server_error() {
        ApiError::Server(message)
    } else if status.is_client_error() {
        ApiError::Client(message)
    } else {
        ApiError::Network(message)
    }
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, ApiError> {
    let status = response.status();

    // 204/205 carry no body by spec
    if status == StatusCode::NO_CONTENT || status == StatusCode::RESET_CONTENT {
        serde_json::from_value(Value::Null).map_err(|_| {
            ApiError::Client(format!(
                "no-content response ({}) cannot satisfy the expected type",
                status.as_u16()
            ))
        })
    } else {
        response
            .json()
            .await
            .map_err(|e| ApiError::Client(format!("failed to parse response: {e}")))
    }
}

/// Builder for [`ApiClient`]
#[derive(Default)]
pub struct ApiClientBuilder {
    config: Option<ApiClientConfig>,
    auth: Option<Arc<dyn AccessTokenProvider>>,
}

impl ApiClientBuilder {
    /// Set the client configuration.
    #[must_use]
    pub fn config(mut self, config: ApiClientConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set the token provider.
    #[must_use]
    pub fn auth(mut self, auth: Arc<dyn AccessTokenProvider>) -> Self {
        self.auth = Some(auth);
        self
    }

    /// Build the API client.
    ///
    /// # Errors
    /// Returns [`ApiError::Config`] if the token provider is missing or the
    /// client cannot be constructed.
    pub fn build(self) -> Result<ApiClient, ApiError> {
        let config = self.config.unwrap_or_default();
        let auth =
            self.auth.ok_or_else(|| ApiError::Config("token provider not set".to_string()))?;

        ApiClient::new(config, auth)
    }
}
