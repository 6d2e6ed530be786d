//! Glue surfaces carried in from the HTTP boundary (out of scope here).
//!
//! The router populates a [`RequestContext`] per request and attaches
//! [`AuthInfo`] once authentication has run; core operations only ever
//! read these, never construct or mutate them.

use std::collections::HashMap;

/// Either of the two supported authentication mechanisms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthMethod {
    Jwt,
    ApiKey,
}

/// Populated by the HTTP boundary after authentication succeeds.
/// Absent on a protected path means "unauthenticated".
#[derive(Debug, Clone)]
pub struct AuthInfo {
    pub user_id: String,
    pub auth_method: AuthMethod,
    /// Ordered sequence of permission strings, e.g. `write:orders`.
    pub permissions: Vec<String>,
}

impl AuthInfo {
    pub fn new(user_id: impl Into<String>, auth_method: AuthMethod) -> Self {
        Self {
            user_id: user_id.into(),
            auth_method,
            permissions: Vec::new(),
        }
    }

    pub fn with_permissions(mut self, permissions: Vec<String>) -> Self {
        self.permissions = permissions;
        self
    }

    /// Exact match against the permission string, e.g. `"write:orders"`.
    pub fn has_permission(&self, permission: &str) -> bool {
        self.permissions.iter().any(|p| p == permission)
    }
}

/// Opaque handle for the inbound request body; the concrete streaming or
/// buffering type (and how to read it) belongs to the HTTP layer.
#[derive(Debug, Clone, Default)]
pub struct BodyStream;

/// Opaque handle for the outbound response sink (e.g. an SSE writer);
/// the concrete type belongs to the HTTP layer.
#[derive(Debug, Clone, Default)]
pub struct ResponseSink;

/// Per-request context handed to core operations by the HTTP layer.
/// `body_stream` / `response_sink` are represented by the caller's own
/// types (SSE writers, request bodies) and are intentionally opaque here.
/// `headers` is the ordered header list as received; `header_table` is
/// the HTTP layer's fast case-insensitive lookup over the same headers.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    pub method: String,
    pub path: String,
    pub query_string: String,
    pub headers: HashMap<String, String>,
    pub header_table: HashMap<String, String>,
    pub body_stream: Option<BodyStream>,
    pub response_sink: Option<ResponseSink>,
    pub path_params: HashMap<String, String>,
    pub auth_info: Option<AuthInfo>,
    pub client_ip: String,
    pub request_id: Option<String>,
}

impl RequestContext {
    pub fn new(method: impl Into<String>, path: impl Into<String>, client_ip: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            path: path.into(),
            query_string: String::new(),
            headers: HashMap::new(),
            header_table: HashMap::new(),
            body_stream: None,
            response_sink: None,
            path_params: HashMap::new(),
            auth_info: None,
            client_ip: client_ip.into(),
            request_id: None,
        }
    }

    /// Whether this request authorizes the named permission.
    /// `false` both when unauthenticated and when the permission is missing.
    pub fn is_authorized(&self, permission: &str) -> bool {
        self.auth_info
            .as_ref()
            .is_some_and(|a| a.has_permission(permission))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unauthenticated_context_is_never_authorized() {
        let ctx = RequestContext::new("POST", "/orders", "127.0.0.1");
        assert!(!ctx.is_authorized("write:orders"));
    }

    #[test]
    fn permission_match_is_exact() {
        let auth = AuthInfo::new("user1", AuthMethod::Jwt)
            .with_permissions(vec!["write:orders".to_string()]);
        let mut ctx = RequestContext::new("POST", "/orders", "127.0.0.1");
        ctx.auth_info = Some(auth);
        assert!(ctx.is_authorized("write:orders"));
        assert!(!ctx.is_authorized("write:orders:cancel"));
        assert!(!ctx.is_authorized("read:orders"));
    }
}
