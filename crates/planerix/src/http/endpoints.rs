//! Auth endpoint paths and wire types.

use serde::{Deserialize, Serialize};

/// Exchanges credentials for an access token and sets the refresh cookie.
pub const LOGIN: &str = "/auth/login";

/// Issues a new access token using the refresh cookie.
pub const REFRESH: &str = "/auth/refresh";

/// Invalidates the refresh cookie server-side.
pub const LOGOUT: &str = "/auth/logout";

/// Request body for login.
#[derive(Debug, Serialize)]
pub(crate) struct LoginRequest<'a> {
    pub email: &'a str,
    pub password: &'a str,
}

/// Response from login.
#[derive(Debug, Clone, Deserialize)]
pub struct LoginResponse {
    pub access_token: String,
    #[serde(default)]
    pub token_type: Option<String>,
    /// Remaining response fields (user profile and the like).
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Response from refresh.
/// Note: refresh takes no request body; the credential travels as a cookie.
#[derive(Debug, Deserialize)]
pub(crate) struct RefreshResponse {
    #[serde(default)]
    pub access_token: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn login_response_keeps_extra_fields() {
        let json = r#"{"access_token":"tok1","token_type":"bearer","user":{"id":7}}"#;
        let response: LoginResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.access_token, "tok1");
        assert_eq!(response.token_type.as_deref(), Some("bearer"));
        assert_eq!(response.extra["user"]["id"], 7);
    }

    #[test]
    fn refresh_response_tolerates_missing_token() {
        let response: RefreshResponse = serde_json::from_str("{}").unwrap();
        assert!(response.access_token.is_none());
    }
}
