//! Resource API data transfer types
//!
//! Wire shapes for the portal's REST surface. Field names follow the
//! backend's camelCase JSON, except the audit log query parameters, which the
//! backend expects in snake_case.

use serde::{Deserialize, Serialize};

/// Profile fields a user may change about themselves (`PATCH /me`)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUserProfile {
    pub display_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub locale: Option<String>,
}

/// Administrative view of a user (`GET /admin/users`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserManagement {
    pub user_id: String,
    pub email: String,
    pub display_name: String,
    pub locale: String,
    pub created_at: String,
    pub updated_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_login_at: Option<String>,
    pub roles: Vec<String>,
    pub active: bool,
}

/// Role replacement request (`PATCH /admin/users/{id}/roles`)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateUserRoles {
    pub roles: Vec<String>,
}

/// One audit log record (`GET /admin/audit-log`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditLogEntry {
    pub id: i64,
    pub user_id: String,
    pub user_email: String,
    pub user_display_name: String,
    pub event_type: String,
    pub ip_address: String,
    pub user_agent: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
    pub session_id: String,
    pub created_at: String,
}

/// Paginated response envelope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageResponse<T> {
    pub content: Vec<T>,
    pub page: u32,
    pub size: u32,
    pub total_elements: i64,
    pub total_pages: u32,
    pub first: bool,
    pub last: bool,
    pub has_next: bool,
    pub has_previous: bool,
    pub timestamp: String,
}

/// User listing query (`GET /admin/users`)
#[derive(Debug, Clone, Default, Serialize)]
pub struct SearchParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sort: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub direction: Option<String>,
}

/// Audit log query (`GET /admin/audit-log`); snake_case on the wire
#[derive(Debug, Clone, Default, Serialize)]
pub struct AuditLogParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<u32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_response_deserializes_camel_case() {
        let json = r#"{
            "content": [{"roles": ["STAFF"]}],
            "page": 0,
            "size": 20,
            "totalElements": 1,
            "totalPages": 1,
            "first": true,
            "last": true,
            "hasNext": false,
            "hasPrevious": false,
            "timestamp": "2024-01-01T00:00:00Z"
        }"#;

        let page: PageResponse<UpdateUserRoles> = serde_json::from_str(json).unwrap();
        assert_eq!(page.total_elements, 1);
        assert!(page.first && page.last);
        assert_eq!(page.content[0].roles, vec!["STAFF".to_string()]);
    }

    #[test]
    fn search_params_omit_unset_fields() {
        let params = SearchParams { query: Some("ada".to_string()), ..Default::default() };
        let value = serde_json::to_value(&params).unwrap();

        assert_eq!(value, serde_json::json!({"query": "ada"}));
    }

    #[test]
    fn audit_params_use_snake_case() {
        let params = AuditLogParams {
            user_id: Some("u1".to_string()),
            event_type: Some("LOGIN".to_string()),
            ..Default::default()
        };
        let value = serde_json::to_value(&params).unwrap();

        assert_eq!(value, serde_json::json!({"user_id": "u1", "event_type": "LOGIN"}));
    }
}
