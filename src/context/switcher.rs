//! Context/endpoint switcher — §4.I.
//!
//! The REPL issues a switch; the core performs it: reconnect, re-auth on
//! "unauthorized" (retried exactly once), then rebuild caches and prod the
//! poller so the prompt's auth badge reflects the new endpoint immediately.

use std::sync::Arc;

use tracing::{info, warn};

use crate::auth::{AuthStatusPoller, OAuthClientConfig, OAuthManager};
use crate::context::error::{ContextError, ContextResult};
use crate::integration::{IntegrationError, Session};
use crate::transport::{Endpoint, TransportError};

pub struct ContextSwitcher {
    session: Arc<Session>,
    auth: Arc<OAuthManager>,
    poller: Arc<AuthStatusPoller>,
}

impl ContextSwitcher {
    pub fn new(session: Arc<Session>, auth: Arc<OAuthManager>, poller: Arc<AuthStatusPoller>) -> Self {
        Self {
            session,
            auth,
            poller,
        }
    }

    /// Performs the switch described in §4.I. `oauth_config` is the
    /// fresh OAuth client configuration for `new_endpoint`'s issuer,
    /// supplied by the caller since the core has no registry of endpoints.
    pub async fn switch(
        &self,
        new_endpoint: Endpoint,
        oauth_config: OAuthClientConfig,
    ) -> ContextResult<()> {
        if self.session.endpoint().await == new_endpoint {
            info!(%new_endpoint, "context switch no-op: endpoint unchanged");
            return Ok(());
        }

        match self.session.reconnect(new_endpoint.clone()).await {
            Ok(()) => {}
            Err(IntegrationError::Transport(TransportError::Unauthorized)) => {
                self.reauth_then_retry(new_endpoint.clone(), oauth_config)
                    .await?;
            }
            Err(e) => return Err(e.into()),
        }
        self.session.rewatch().await;

        self.session.initialize().await?;
        self.session.list_tools(true).await?;
        self.session.list_resources(true).await?;
        self.session.list_prompts(true).await?;
        self.poller.poll_once().await;

        info!(%new_endpoint, "context switch complete");
        Ok(())
    }

    /// Spec §4.I step 3: reuse a still-valid token for the new issuer if
    /// one exists; otherwise run the full OAuth flow. Retries `reconnect`
    /// exactly once afterwards; any further "unauthorized" is surfaced.
    async fn reauth_then_retry(
        &self,
        new_endpoint: Endpoint,
        oauth_config: OAuthClientConfig,
    ) -> ContextResult<()> {
        if self.auth.get_bearer_token(&oauth_config.issuer).await.is_err() {
            let auth_url = self.auth.start_flow(oauth_config.clone()).await?;
            if webbrowser::open(&auth_url).is_err() {
                warn!(url = %auth_url, "failed to open system browser for context-switch re-auth");
            }
            self.auth.wait_for_auth().await?;
        }

        let bearer = self.auth.get_bearer_token(&oauth_config.issuer).await?;
        self.session.set_header("Authorization", bearer).await;

        match self.session.reconnect(new_endpoint.clone()).await {
            Ok(()) => Ok(()),
            Err(IntegrationError::Transport(TransportError::Unauthorized)) => Err(
                ContextError::StillUnauthorized(new_endpoint.to_string()),
            ),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::InMemoryTokenStore;
    use crate::integration::SessionConfig;
    use crate::transport::TransportKind;

    fn sample_config(issuer: &str) -> OAuthClientConfig {
        OAuthClientConfig {
            issuer: issuer.to_string(),
            server_url: "https://agg.example/mcp".to_string(),
            client_id: "muster-agent".to_string(),
            client_secret: None,
            auth_url: "https://idp.example/authorize".to_string(),
            token_url: "https://idp.example/token".to_string(),
            scopes: vec!["openid".to_string()],
        }
    }

    #[tokio::test]
    async fn switching_to_the_current_endpoint_is_a_no_op() {
        // Streamable-HTTP's `start()` only stores headers (no live socket),
        // so this exercises the no-op branch without touching the network.
        let endpoint =
            Endpoint::parse("https://agg.example/mcp", TransportKind::StreamableHttp).unwrap();
        let session = Session::connect(endpoint.clone(), Default::default(), SessionConfig::default())
            .await
            .unwrap();
        let auth = Arc::new(OAuthManager::new(Arc::new(InMemoryTokenStore::new())));
        let poller = Arc::new(AuthStatusPoller::new(Arc::clone(&session)));
        let switcher = ContextSwitcher::new(Arc::clone(&session), auth, poller);

        let result = switcher.switch(endpoint, sample_config("https://idp.example/")).await;
        assert!(result.is_ok());
    }
}
