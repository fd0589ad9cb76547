//! Typed resource API surface
//!
//! Thin wrappers mapping the portal's REST endpoints onto the authenticated
//! client. The pages consuming these are outside the session core; the one
//! piece the session itself depends on is `get_profile`, exposed to the
//! session through the [`ProfileFetcher`] seam.

use async_trait::async_trait;
use staffport_auth::{AuthError, ProfileFetcher, UserProfile};

use crate::client::ApiClient;
use crate::errors::ApiError;
use crate::types::{
    AuditLogEntry, AuditLogParams, PageResponse, SearchParams, UpdateUserProfile,
    UpdateUserRoles, UserManagement,
};

impl ApiClient {
    /// Fetch the authenticated user's profile.
    ///
    /// # Errors
    /// Returns an error if the request fails.
    pub async fn get_profile(&self) -> Result<UserProfile, ApiError> {
        self.get("/me").await
    }

    /// Update the authenticated user's profile.
    ///
    /// # Errors
    /// Returns an error if the request fails.
    pub async fn update_profile(
        &self,
        update: &UpdateUserProfile,
    ) -> Result<UserProfile, ApiError> {
        self.patch("/me", update).await
    }

    /// List users (admin).
    ///
    /// # Errors
    /// Returns an error if the request fails; `Forbidden` for a caller
    /// without the required role.
    pub async fn list_users(
        &self,
        params: &SearchParams,
    ) -> Result<PageResponse<UserManagement>, ApiError> {
        self.get_with_query("/admin/users", params).await
    }

    /// Replace a user's roles (admin).
    ///
    /// # Errors
    /// Returns an error if the request fails.
    pub async fn update_user_roles(
        &self,
        user_id: &str,
        update: &UpdateUserRoles,
    ) -> Result<UserManagement, ApiError> {
        self.patch(&format!("/admin/users/{user_id}/roles"), update).await
    }

    /// Query the audit log (admin).
    ///
    /// # Errors
    /// Returns an error if the request fails.
    pub async fn get_audit_logs(
        &self,
        params: &AuditLogParams,
    ) -> Result<PageResponse<AuditLogEntry>, ApiError> {
        self.get_with_query("/admin/audit-log", params).await
    }
}

#[async_trait]
impl ProfileFetcher for ApiClient {
    async fn fetch_profile(&self) -> Result<UserProfile, AuthError> {
        self.get_profile().await.map_err(|e| AuthError::ProfileFetch(e.to_string()))
    }
}
