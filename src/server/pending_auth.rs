//! Pending-auth bootstrap server (§4.G): a degenerate meta-tool
//! server exposing exactly one tool, run before the first successful
//! authentication.

use std::sync::Arc;

use serde_json::{json, Value};
use tracing::warn;

use crate::auth::OAuthManager;
use crate::config;
use crate::server::error::ServerResult;

/// The one operation this server answers: `authenticate_muster`, no
/// parameters.
pub struct PendingAuthServer {
    auth: Arc<OAuthManager>,
}

impl PendingAuthServer {
    pub fn new(auth: Arc<OAuthManager>) -> Self {
        Self { auth }
    }

    pub fn tool_name(&self) -> &'static str {
        config::PENDING_AUTH_TOOL_NAME
    }

    /// Triggers `start_flow`, best-effort-opens the system browser, and
    /// kicks off `wait_for_auth` in the background. Returns immediately
    /// with the structured `auth_required` response.
    pub async fn authenticate_muster(
        &self,
        client_config: crate::auth::OAuthClientConfig,
    ) -> ServerResult<Value> {
        let auth_url = self.auth.start_flow(client_config).await?;

        if webbrowser::open(&auth_url).is_err() {
            warn!(url = %auth_url, "failed to open system browser; user must copy the URL manually");
        }

        let auth = Arc::clone(&self.auth);
        let url_for_task = auth_url.clone();
        tokio::spawn(async move {
            if let Err(e) = auth.wait_for_auth().await {
                warn!(error = %e, url = %url_for_task, "background OAuth wait failed");
            }
        });

        Ok(json!({
            "status": "auth_required",
            "auth_url": auth_url,
            "clickable_url": auth_url,
            "message": "Open the URL above to authenticate, then retry your request.",
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::InMemoryTokenStore;

    #[tokio::test]
    async fn response_carries_auth_required_status_and_a_parseable_url() {
        let auth = Arc::new(OAuthManager::new(Arc::new(InMemoryTokenStore::new())));
        let server = PendingAuthServer::new(auth);

        let client_config = crate::auth::OAuthClientConfig {
            issuer: "https://idp.example/".into(),
            server_url: "https://agg.example/mcp".into(),
            client_id: "muster-agent".into(),
            client_secret: None,
            auth_url: "https://idp.example/authorize".into(),
            token_url: "https://idp.example/token".into(),
            scopes: vec!["openid".into()],
        };

        let response = server.authenticate_muster(client_config).await.unwrap();
        assert_eq!(response["status"], "auth_required");
        let url = response["auth_url"].as_str().unwrap();
        assert!(url::Url::parse(url).is_ok());
    }
}
