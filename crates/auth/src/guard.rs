//! Route guard
//!
//! Translates the derived session state into a navigation decision. The
//! guard never inspects raw tokens; it only ever consumes
//! [`SessionManager::current_state`] and the role queries, so every route in
//! the application gets the same answer for the same session.

use std::sync::Arc;

use tracing::debug;

use crate::session::SessionManager;
use crate::types::SessionState;

/// Outcome of evaluating a navigation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteDecision {
    /// Let the navigation proceed
    Admit,
    /// Redirect to the given path
    RedirectTo(String),
    /// Keep showing an interstitial; the answer is not known yet
    ShowPending,
}

/// Role-aware navigation gate.
pub struct RouteGuard {
    session: Arc<SessionManager>,
    login_path: String,
    forbidden_path: String,
}

impl RouteGuard {
    /// Guard with the portal's default login and forbidden paths.
    #[must_use]
    pub fn new(session: Arc<SessionManager>) -> Self {
        Self::with_paths(session, "/login", "/403")
    }

    /// Guard with explicit redirect targets.
    #[must_use]
    pub fn with_paths(
        session: Arc<SessionManager>,
        login_path: impl Into<String>,
        forbidden_path: impl Into<String>,
    ) -> Self {
        Self { session, login_path: login_path.into(), forbidden_path: forbidden_path.into() }
    }

    /// Evaluate a navigation that requires `required_roles` (all of them)
    /// when set.
    ///
    /// An `Expired` session gets one bounded refresh cycle before being
    /// redirected to login. A role-gated route whose profile has not
    /// resolved yet reports `ShowPending` rather than a premature forbidden
    /// redirect.
    pub async fn evaluate(&self, required_roles: Option<&[&str]>) -> RouteDecision {
        let state = self.session.current_state();
        debug!(state = ?state, "evaluating route");

        match state {
            SessionState::Unauthenticated => RouteDecision::RedirectTo(self.login_path.clone()),
            SessionState::Pending => RouteDecision::ShowPending,
            SessionState::Expired => {
                if self.session.try_refresh().await.is_ok() {
                    self.admit(required_roles)
                } else {
                    RouteDecision::RedirectTo(self.login_path.clone())
                }
            }
            SessionState::Authenticated => self.admit(required_roles),
        }
    }

    fn admit(&self, required_roles: Option<&[&str]>) -> RouteDecision {
        let Some(required) = required_roles else {
            return RouteDecision::Admit;
        };

        if !self.session.profile_resolved() {
            return RouteDecision::ShowPending;
        }

        if required.iter().all(|role| self.session.has_role(role)) {
            RouteDecision::Admit
        } else {
            RouteDecision::RedirectTo(self.forbidden_path.clone())
        }
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::client::OidcClient;
    use crate::config::OidcConfig;
    use crate::errors::AuthError;
    use crate::session::ProfileFetcher;
    use crate::storage::MemoryStorage;
    use crate::types::{roles, TokenSet, UserProfile};

    fn guarded_session() -> (Arc<SessionManager>, RouteGuard) {
        let config = OidcConfig::new(
            "https://auth.example.com",
            "test_client",
            vec!["openid".to_string()],
        )
        .unwrap();
        let session = SessionManager::new(
            OidcClient::new(config).unwrap(),
            Arc::new(MemoryStorage::new()),
            Arc::new(MemoryStorage::new()),
        );
        let guard = RouteGuard::new(session.clone());
        (session, guard)
    }

    fn tokens(expires_in: i64) -> TokenSet {
        TokenSet::new("access".to_string(), "id".to_string(), Some("r".to_string()), expires_in)
    }

    struct StubFetcher(Vec<String>);

    #[async_trait]
    impl ProfileFetcher for StubFetcher {
        async fn fetch_profile(&self) -> Result<UserProfile, AuthError> {
            Ok(UserProfile {
                user_id: "u1".to_string(),
                email: "user@example.com".to_string(),
                display_name: "User".to_string(),
                locale: "en".to_string(),
                created_at: "2024-01-01T00:00:00Z".to_string(),
                updated_at: "2024-01-01T00:00:00Z".to_string(),
                roles: self.0.clone(),
            })
        }
    }

    async fn resolve(session: &SessionManager, role_names: &[&str]) {
        session
            .resolve_profile(&StubFetcher(role_names.iter().map(ToString::to_string).collect()))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn unauthenticated_redirects_to_login_regardless_of_roles() {
        let (_, guard) = guarded_session();

        assert_eq!(guard.evaluate(None).await, RouteDecision::RedirectTo("/login".to_string()));
        assert_eq!(
            guard.evaluate(Some(&[roles::ADMIN])).await,
            RouteDecision::RedirectTo("/login".to_string())
        );
    }

    #[tokio::test]
    async fn authenticated_without_role_requirement_admits() {
        let (session, guard) = guarded_session();
        session.store().set(tokens(3600)).unwrap();

        assert_eq!(guard.evaluate(None).await, RouteDecision::Admit);
    }

    #[tokio::test]
    async fn role_gated_route_waits_for_profile() {
        let (session, guard) = guarded_session();
        session.store().set(tokens(3600)).unwrap();

        // profile not yet resolved: never a premature forbidden redirect
        assert_eq!(guard.evaluate(Some(&[roles::ADMIN])).await, RouteDecision::ShowPending);
    }

    #[tokio::test]
    async fn satisfied_roles_admit() {
        let (session, guard) = guarded_session();
        session.store().set(tokens(3600)).unwrap();
        resolve(&session, &[roles::ADMIN, roles::STAFF]).await;

        assert_eq!(guard.evaluate(Some(&[roles::ADMIN])).await, RouteDecision::Admit);
        assert_eq!(
            guard.evaluate(Some(&[roles::ADMIN, roles::STAFF])).await,
            RouteDecision::Admit
        );
    }

    #[tokio::test]
    async fn unsatisfied_roles_redirect_to_forbidden() {
        let (session, guard) = guarded_session();
        session.store().set(tokens(3600)).unwrap();
        resolve(&session, &[roles::STAFF]).await;

        assert_eq!(
            guard.evaluate(Some(&[roles::ADMIN])).await,
            RouteDecision::RedirectTo("/403".to_string())
        );
        // all required roles must be present, not just one
        assert_eq!(
            guard.evaluate(Some(&[roles::ADMIN, roles::STAFF])).await,
            RouteDecision::RedirectTo("/403".to_string())
        );
    }

    #[tokio::test]
    async fn forbidden_never_clears_tokens() {
        let (session, guard) = guarded_session();
        session.store().set(tokens(3600)).unwrap();
        resolve(&session, &[roles::STAFF]).await;

        let decision = guard.evaluate(Some(&[roles::ADMIN])).await;
        assert_eq!(decision, RouteDecision::RedirectTo("/403".to_string()));

        // session stays authenticated; role failure is not an auth failure
        assert!(session.is_authenticated());
        assert!(session.store().get().is_some());
    }

    #[tokio::test]
    async fn expired_without_refresh_token_redirects_to_login_and_clears() {
        let (session, guard) = guarded_session();
        session
            .store()
            .set(TokenSet::new("access".to_string(), "id".to_string(), None, -60))
            .unwrap();

        assert_eq!(guard.evaluate(None).await, RouteDecision::RedirectTo("/login".to_string()));
        assert_eq!(session.store().get(), None);
    }

    #[tokio::test]
    async fn custom_paths_are_used() {
        let config = OidcConfig::new(
            "https://auth.example.com",
            "test_client",
            vec!["openid".to_string()],
        )
        .unwrap();
        let session = SessionManager::new(
            OidcClient::new(config).unwrap(),
            Arc::new(MemoryStorage::new()),
            Arc::new(MemoryStorage::new()),
        );
        let guard = RouteGuard::with_paths(session, "/signin", "/no-access");

        assert_eq!(
            guard.evaluate(None).await,
            RouteDecision::RedirectTo("/signin".to_string())
        );
    }
}
