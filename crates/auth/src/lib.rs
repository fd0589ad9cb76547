//! Staffport session core
//!
//! Client-side authentication session manager for the staff portal. Delegates
//! identity to an external OAuth2/OIDC authorization server and gates
//! client-side routes by role. There is no server-side session to fall back
//! on: the session is exactly what the token store holds.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐
//! │ SessionManager  │  State machine, login/callback/refresh/logout
//! └────────┬────────┘
//!          │
//!          ├──► OidcClient     (redirect URLs, code exchange, refresh)
//!          ├──► TokenStore     (owned persisted credential state)
//!          ├──► AttemptStore   (PKCE attempt across the redirect boundary)
//!          │         │
//!          │         └──► StorageBackend  (memory / JSON file)
//!          │
//!          └──► RouteGuard     (admit / redirect / pending per navigation)
//! ```
//!
//! The authorization redirect is a persistence boundary, not an await: a
//! login is `begin_login` on one page load and `handle_callback` on another,
//! connected only by the PKCE attempt persisted in between.

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms)]
#![warn(clippy::all, clippy::perf, clippy::complexity, clippy::suspicious)]

pub mod client;
pub mod config;
pub mod errors;
pub mod guard;
pub mod pkce;
pub mod session;
pub mod storage;
pub mod store;
pub mod types;

// Re-export commonly used types
pub use client::OidcClient;
pub use config::OidcConfig;
pub use errors::AuthError;
pub use guard::{RouteDecision, RouteGuard};
pub use pkce::{AttemptStore, PkceAttempt};
pub use session::{ProfileFetcher, SessionManager, SessionOptions};
pub use storage::{JsonFileStorage, MemoryStorage, StorageBackend, StorageError};
pub use store::{TokenStore, TOKEN_STORAGE_KEY};
pub use types::{roles, CallbackParams, SessionState, TokenResponse, TokenSet, UserProfile};
