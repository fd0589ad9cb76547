//! Staffport resource API adapter
//!
//! Authenticated HTTP client for the portal's backend. The adapter owns two
//! behaviors the session core relies on:
//!
//! - every outbound request carries `Authorization: Bearer <access token>`
//!   taken from the session via [`AccessTokenProvider`]
//! - a 401 response triggers exactly one token refresh followed by one retry
//!   of the original request; a 403 never touches the session at all
//!
//! On top of that sits the typed endpoint surface (profile, user management,
//! audit log) the portal pages consume.

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms)]
#![warn(clippy::all, clippy::perf, clippy::complexity, clippy::suspicious)]

pub mod auth;
pub mod client;
pub mod endpoints;
pub mod errors;
pub mod types;

// Re-export commonly used types
pub use auth::AccessTokenProvider;
pub use client::{ApiClient, ApiClientBuilder, ApiClientConfig};
pub use errors::ApiError;
pub use types::{
    AuditLogEntry, AuditLogParams, PageResponse, SearchParams, UpdateUserProfile,
    UpdateUserRoles, UserManagement,
};
