//! Session state machine
//!
//! [`SessionManager`] owns the token store and derives the session state from
//! it on every read. State transitions happen only through token store
//! mutations and profile-fetch outcomes; there are no timers. The
//! authorization redirect splits the login flow into two separate operations
//! (`begin_login`, `handle_callback`) connected only by the persisted PKCE
//! attempt — the browser, not this code, controls resumption.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::client::OidcClient;
use crate::errors::AuthError;
use crate::pkce::{AttemptStore, PkceAttempt};
use crate::storage::StorageBackend;
use crate::store::TokenStore;
use crate::types::{CallbackParams, SessionState, TokenSet, UserProfile};

/// Fetches the user profile from the resource API.
///
/// Implemented by the authenticated API client; the seam keeps the session
/// core free of any dependency on the resource surface.
#[async_trait]
pub trait ProfileFetcher: Send + Sync {
    /// Fetch the profile of the currently authenticated user.
    async fn fetch_profile(&self) -> Result<UserProfile, AuthError>;
}

/// Tunables for the silent-refresh policy.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// Refresh attempts before the session demotes to `Unauthenticated`
    pub refresh_max_attempts: u32,
    /// Initial backoff delay between refresh attempts; doubles per attempt
    pub refresh_backoff: Duration,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self { refresh_max_attempts: 3, refresh_backoff: Duration::from_millis(250) }
    }
}

struct ProfileEntry {
    generation: u64,
    profile: UserProfile,
}

/// Resets the in-flight flag when the owning future completes or is dropped,
/// so an abandoned exchange never leaves the session stuck in `Pending`.
struct InFlightGuard<'a>(&'a AtomicBool);

impl<'a> InFlightGuard<'a> {
    fn set(flag: &'a AtomicBool) -> Self {
        flag.store(true, Ordering::SeqCst);
        Self(flag)
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// The session state machine.
///
/// Single instance per application, injected into the route guard and the
/// HTTP adapter; every consumer reads derived state from here instead of
/// re-deriving it from raw tokens.
pub struct SessionManager {
    client: OidcClient,
    store: Arc<TokenStore>,
    attempts: AttemptStore,
    profile: RwLock<Option<ProfileEntry>>,
    exchange_in_flight: AtomicBool,
    options: SessionOptions,
}

impl SessionManager {
    /// Create a session manager with default refresh policy.
    ///
    /// `token_storage` is the profile-scoped backend (survives reloads);
    /// `attempt_storage` is the tab/session-scoped backend holding the PKCE
    /// attempt across the redirect round trip.
    #[must_use]
    pub fn new(
        client: OidcClient,
        token_storage: Arc<dyn StorageBackend>,
        attempt_storage: Arc<dyn StorageBackend>,
    ) -> Arc<Self> {
        Self::with_options(client, token_storage, attempt_storage, SessionOptions::default())
    }

    /// Create a session manager with an explicit refresh policy.
    #[must_use]
    pub fn with_options(
        client: OidcClient,
        token_storage: Arc<dyn StorageBackend>,
        attempt_storage: Arc<dyn StorageBackend>,
        options: SessionOptions,
    ) -> Arc<Self> {
        let session = Arc::new(Self {
            client,
            store: Arc::new(TokenStore::new(token_storage)),
            attempts: AttemptStore::new(attempt_storage),
            profile: RwLock::new(None),
            exchange_in_flight: AtomicBool::new(false),
            options,
        });

        // Token replacement invalidates the cached profile for the old set.
        let weak = Arc::downgrade(&session);
        session.store.subscribe(move |_| {
            if let Some(session) = weak.upgrade() {
                session.evict_stale_profile();
            }
        });

        session
    }

    /// Load the persisted token set. Call once at application start.
    ///
    /// # Errors
    /// Returns a storage error if the backend read fails.
    pub fn init(&self) -> Result<bool, AuthError> {
        self.store.init()
    }

    /// The token store this session owns.
    #[must_use]
    pub fn store(&self) -> &TokenStore {
        &self.store
    }

    /// Start a login: generate and persist a fresh PKCE attempt, and return
    /// the provider authorization URL to navigate to.
    ///
    /// # Errors
    /// Returns [`AuthError::Pkce`] if no secure random source is available
    /// and a storage error if the attempt cannot be persisted.
    pub fn begin_login(&self, redirect_uri: &str) -> Result<String, AuthError> {
        let attempt = PkceAttempt::generate()?;
        self.attempts.save(&attempt)?;

        let url = self.client.build_authorization_url(&attempt, redirect_uri);
        info!("login redirect prepared");
        Ok(url)
    }

    /// Complete a login from the provider's callback redirect.
    ///
    /// Consumes the stored PKCE attempt (single use), exchanges the code and
    /// replaces the token set. While the exchange is in flight and no token
    /// set exists, [`Self::current_state`] reports `Pending`.
    ///
    /// # Errors
    /// - [`AuthError::ExchangeFailed`] if the callback carries a provider
    ///   error or the exchange itself fails
    /// - [`AuthError::InvalidCallback`] if neither `code` nor `error` is present
    /// - [`AuthError::MissingVerifier`] if no attempt is stored (no network
    ///   call is made)
    /// - [`AuthError::StateMismatch`] if the echoed state does not match
    pub async fn handle_callback(
        &self,
        params: CallbackParams,
        redirect_uri: &str,
    ) -> Result<TokenSet, AuthError> {
        if let Some(error) = params.error {
            // The provider rejected the authorization; the stored attempt can
            // never match a code and is discarded.
            self.attempts.clear();
            warn!(provider_error = %error, "authorization callback carried an error");
            return Err(AuthError::ExchangeFailed {
                reason: format!("provider returned {error}"),
                error: Some(error),
            });
        }

        let Some(code) = params.code else {
            return Err(AuthError::InvalidCallback(
                "callback carried neither code nor error".to_string(),
            ));
        };

        let attempt = self.attempts.take()?.ok_or(AuthError::MissingVerifier)?;

        if let Some(state) = params.state {
            if state != attempt.state {
                return Err(AuthError::StateMismatch { expected: attempt.state, received: state });
            }
        }

        let tokens = {
            let _in_flight = InFlightGuard::set(&self.exchange_in_flight);
            self.client.exchange(&code, &attempt, redirect_uri).await?
        };

        self.store.set(tokens.clone())?;
        info!("login completed");
        Ok(tokens)
    }

    /// Derive the current session state. Recomputed from the store on every
    /// call; exactly one state holds at any observation point.
    #[must_use]
    pub fn current_state(&self) -> SessionState {
        match self.store.get() {
            Some(tokens) if tokens.is_expired() => SessionState::Expired,
            Some(_) => SessionState::Authenticated,
            None if self.exchange_in_flight.load(Ordering::SeqCst) => SessionState::Pending,
            None => SessionState::Unauthenticated,
        }
    }

    /// Whether a valid, unexpired token set is present.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.current_state() == SessionState::Authenticated
    }

    /// Current access token, if a token set exists (expired or not — the
    /// HTTP adapter's 401 path handles expiry).
    #[must_use]
    pub fn access_token(&self) -> Option<String> {
        self.store.get().map(|t| t.access_token)
    }

    /// Role check against the cached profile of the current token set.
    ///
    /// False whenever the state is not `Authenticated`, the profile has not
    /// resolved, or the profile belongs to a previous token set. Membership
    /// is exact; no role implies another.
    #[must_use]
    pub fn has_role(&self, role: &str) -> bool {
        if self.current_state() != SessionState::Authenticated {
            return false;
        }
        self.current_profile().is_some_and(|p| p.has_role(role))
    }

    /// The cached profile for the current token set, if resolved.
    #[must_use]
    pub fn profile(&self) -> Option<UserProfile> {
        self.current_profile()
    }

    /// Whether the profile for the current token set has resolved.
    #[must_use]
    pub fn profile_resolved(&self) -> bool {
        self.current_profile().is_some()
    }

    /// Resolve the user profile through `fetcher`, caching it against the
    /// current token generation. Re-fetches only after the token set has
    /// been replaced.
    ///
    /// # Errors
    /// Returns [`AuthError::NotAuthenticated`] without a token set, or the
    /// fetcher's error.
    pub async fn resolve_profile(
        &self,
        fetcher: &dyn ProfileFetcher,
    ) -> Result<UserProfile, AuthError> {
        if self.store.get().is_none() {
            return Err(AuthError::NotAuthenticated);
        }

        let generation = self.store.generation();
        if let Some(profile) = self.current_profile() {
            return Ok(profile);
        }

        debug!("resolving user profile");
        let profile = fetcher.fetch_profile().await?;

        // Cache only if the token set was not replaced while fetching.
        if self.store.generation() == generation {
            *self.profile.write() = Some(ProfileEntry { generation, profile: profile.clone() });
        }

        Ok(profile)
    }

    /// Silent refresh with the configured bounded retry policy. On success
    /// the token set is replaced; once retries are exhausted (or no refresh
    /// token exists) the tokens are cleared and the session is
    /// `Unauthenticated`.
    ///
    /// # Errors
    /// [`AuthError::NotAuthenticated`], [`AuthError::NoRefreshToken`], or
    /// [`AuthError::RefreshFailed`] carrying the attempt count.
    pub async fn try_refresh(&self) -> Result<(), AuthError> {
        self.refresh_with_attempts(self.options.refresh_max_attempts).await
    }

    /// Single refresh attempt, no retries. Used by the HTTP adapter's 401
    /// path, which is allowed exactly one refresh per original request.
    ///
    /// # Errors
    /// Same as [`Self::try_refresh`].
    pub async fn refresh_once(&self) -> Result<(), AuthError> {
        self.refresh_with_attempts(1).await
    }

    async fn refresh_with_attempts(&self, max_attempts: u32) -> Result<(), AuthError> {
        let Some(tokens) = self.store.get() else {
            return Err(AuthError::NotAuthenticated);
        };
        let Some(refresh_token) = tokens.refresh_token else {
            // Nothing to retry with; demote immediately, no network call.
            debug!("no refresh token; clearing session");
            self.store.clear()?;
            return Err(AuthError::NoRefreshToken);
        };

        let mut delay = self.options.refresh_backoff;
        let mut last_reason = String::new();

        for attempt in 1..=max_attempts {
            match self.client.refresh(&refresh_token).await {
                Ok(mut new_tokens) => {
                    // The provider may omit the refresh token on refresh;
                    // keep the existing one so the session stays renewable.
                    if new_tokens.refresh_token.is_none() {
                        new_tokens.refresh_token = Some(refresh_token);
                    }
                    self.store.set(new_tokens)?;
                    info!(attempt, "token refresh succeeded");
                    return Ok(());
                }
                Err(e) => {
                    warn!(attempt, max_attempts, error = %e, "token refresh attempt failed");
                    last_reason = match e {
                        AuthError::RefreshFailed { reason, .. } => reason,
                        other => other.to_string(),
                    };
                    if attempt < max_attempts {
                        sleep(delay).await;
                        delay *= 2;
                    }
                }
            }
        }

        self.store.clear()?;
        Err(AuthError::RefreshFailed { attempts: max_attempts, reason: last_reason })
    }

    /// Log out: discard any pending attempt and cached profile, clear the
    /// token store, and return the provider logout URL to navigate to. The
    /// store is cleared before the returned redirect can fire. Idempotent.
    ///
    /// # Errors
    /// Returns a storage error if clearing the persisted token set fails.
    pub fn logout(&self, redirect_uri: &str) -> Result<String, AuthError> {
        self.attempts.clear();
        *self.profile.write() = None;
        self.store.clear()?;

        info!("logged out");
        Ok(self.client.build_logout_url(redirect_uri))
    }

    fn current_profile(&self) -> Option<UserProfile> {
        let generation = self.store.generation();
        self.profile
            .read()
            .as_ref()
            .filter(|entry| entry.generation == generation)
            .map(|entry| entry.profile.clone())
    }

    fn evict_stale_profile(&self) {
        let generation = self.store.generation();
        let mut profile = self.profile.write();
        if profile.as_ref().is_some_and(|entry| entry.generation != generation) {
            *profile = None;
        }
    }
}
