//! Auth data model (§3).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// {access-token, optional refresh-token, issuer, server-URL, expiry}.
/// Stored by issuer; at most one token per issuer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OAuthToken {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub issuer: String,
    pub server_url: String,
    pub expiry: Option<DateTime<Utc>>,
}

impl OAuthToken {
    /// Value ready to drop into an `Authorization` header.
    pub fn bearer_header(&self) -> String {
        format!("Bearer {}", self.access_token)
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        matches!(self.expiry, Some(expiry) if expiry <= now)
    }
}

/// OAuth manager state machine (§4.D).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthState {
    Unauthenticated,
    PendingAuth,
    FlowInProgress,
    Authenticated,
    Failed,
}

/// One entry in the auth-status poller's cache (§3).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AuthRequiredInfo {
    pub server: String,
    pub issuer: String,
    pub scope: Option<String>,
    pub auth_tool_name: String,
}

/// An `auth://status` entry's optional challenge payload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AuthChallenge {
    pub issuer: String,
    pub scope: Option<String>,
    #[serde(rename = "auth_tool")]
    pub auth_tool_name: String,
}

/// One server's status within an `auth://status` response (§3).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ServerAuthStatus {
    #[serde(rename = "name")]
    pub server_name: String,
    pub status: String,
    #[serde(flatten)]
    pub challenge: Option<AuthChallenge>,
    pub error: Option<String>,
}

impl ServerAuthStatus {
    pub const STATUS_CONNECTED: &'static str = "connected";
    pub const STATUS_AUTH_REQUIRED: &'static str = "auth_required";

    pub fn is_auth_required(&self) -> bool {
        self.status == Self::STATUS_AUTH_REQUIRED
    }

    pub fn is_connected(&self) -> bool {
        self.status == Self::STATUS_CONNECTED
    }

    pub fn to_auth_required_info(&self) -> Option<AuthRequiredInfo> {
        let challenge = self.challenge.as_ref()?;
        Some(AuthRequiredInfo {
            server: self.server_name.clone(),
            issuer: challenge.issuer.clone(),
            scope: challenge.scope.clone(),
            auth_tool_name: challenge.auth_tool_name.clone(),
        })
    }
}

/// The `auth://status` resource payload: `{"servers": [...]}` (§6).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct AuthStatusResponse {
    pub servers: Vec<ServerAuthStatus>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_status_response_round_trips() {
        let original = AuthStatusResponse {
            servers: vec![
                ServerAuthStatus {
                    server_name: "gitlab".into(),
                    status: "auth_required".into(),
                    challenge: Some(AuthChallenge {
                        issuer: "https://idp.example/".into(),
                        scope: Some("openid".into()),
                        auth_tool_name: "x_gitlab_auth".into(),
                    }),
                    error: None,
                },
                ServerAuthStatus {
                    server_name: "jira".into(),
                    status: "connected".into(),
                    challenge: None,
                    error: None,
                },
            ],
        };

        let json = serde_json::to_string(&original).unwrap();
        let parsed: AuthStatusResponse = serde_json::from_str(&json).unwrap();
        assert_eq!(original, parsed);
    }

    #[test]
    fn bearer_header_is_prefixed() {
        let token = OAuthToken {
            access_token: "abc123".into(),
            refresh_token: None,
            issuer: "https://idp.example/".into(),
            server_url: "https://agg.example/mcp".into(),
            expiry: None,
        };
        assert_eq!(token.bearer_header(), "Bearer abc123");
    }
}
