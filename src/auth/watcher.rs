//! Auth-watcher (§4.F): a stricter observer used in REPL/interactive
//! contexts, layered on top of the same `auth://status` resource the
//! poller watches but diffing consecutive snapshots for transitions.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::auth::store::TokenStore;
use crate::auth::types::ServerAuthStatus;
use crate::config;
use crate::integration::Session;

/// Callbacks the host (REPL) registers to react to watcher events.
#[async_trait]
pub trait WatcherEvents: Send + Sync {
    async fn on_token_submitted(&self, server: &str, issuer: &str);
    async fn on_browser_auth_required(&self, server: &str, auth_tool_name: &str);
    async fn on_auth_complete(&self, server: &str);
}

fn detect_new_challenges(
    old: &[ServerAuthStatus],
    new: &[ServerAuthStatus],
) -> Vec<ServerAuthStatus> {
    let old_required: HashMap<&str, &ServerAuthStatus> = old
        .iter()
        .filter(|s| s.is_auth_required())
        .map(|s| (s.server_name.as_str(), s))
        .collect();

    new.iter()
        .filter(|s| s.is_auth_required() && !old_required.contains_key(s.server_name.as_str()))
        .cloned()
        .collect()
}

fn detect_resolved_challenges(
    old: &[ServerAuthStatus],
    new: &[ServerAuthStatus],
) -> Vec<ServerAuthStatus> {
    let old_required: std::collections::HashSet<&str> = old
        .iter()
        .filter(|s| s.is_auth_required())
        .map(|s| s.server_name.as_str())
        .collect();

    new.iter()
        .filter(|s| s.is_connected() && old_required.contains(s.server_name.as_str()))
        .cloned()
        .collect()
}

/// Exponential backoff: `min(1s * 2^(k-1), 5min)` after `k` consecutive
/// failures (§8 invariant 6).
fn backoff_delay(consecutive_failures: u32) -> Duration {
    if consecutive_failures == 0 {
        return Duration::ZERO;
    }
    let scaled = config::BACKOFF_MIN.saturating_mul(
        config::BACKOFF_FACTOR.saturating_pow(consecutive_failures - 1),
    );
    scaled.min(config::BACKOFF_MAX)
}

pub struct AuthWatcher {
    session: Arc<Session>,
    token_store: Arc<dyn TokenStore>,
    events: Arc<dyn WatcherEvents>,
    previous: RwLock<Vec<ServerAuthStatus>>,
}

impl AuthWatcher {
    pub fn new(
        session: Arc<Session>,
        token_store: Arc<dyn TokenStore>,
        events: Arc<dyn WatcherEvents>,
    ) -> Self {
        Self {
            session,
            token_store,
            events,
            previous: RwLock::new(Vec::new()),
        }
    }

    async fn handle_new_challenge(&self, challenge: &ServerAuthStatus) {
        let Some(info) = challenge.to_auth_required_info() else {
            return;
        };
        debug!(
            event = "sso_lookup",
            server = %info.server,
            issuer = %info.issuer,
            "checking token store for SSO candidate"
        );

        if let Some(token) = self.token_store.get_by_issuer(&info.issuer).await {
            let result = self
                .session
                .call_tool(
                    config::SUBMIT_AUTH_TOKEN_TOOL,
                    Some(json!({
                        "server_name": info.server,
                        "access_token": token.access_token,
                    })),
                    None,
                )
                .await;

            match result {
                Ok(_) => {
                    debug!(
                        event = "sso_submit_ok",
                        server = %info.server,
                        issuer = %info.issuer,
                        "SSO token forwarded"
                    );
                    self.events
                        .on_token_submitted(&info.server, &info.issuer)
                        .await;
                    return;
                }
                Err(e) => {
                    warn!(
                        event = "sso_submit_failed",
                        server = %info.server,
                        issuer = %info.issuer,
                        error = %e,
                        "SSO submission failed, falling back to browser auth"
                    );
                }
            }
        } else {
            debug!(
                event = "sso_no_match",
                server = %info.server,
                issuer = %info.issuer,
                "no stored token for issuer"
            );
        }

        debug!(
            event = "browser_auth_required",
            server = %info.server,
            issuer = %info.issuer,
            "demanding interactive browser auth"
        );
        self.events
            .on_browser_auth_required(&info.server, &info.auth_tool_name)
            .await;
    }

    async fn poll_and_diff(&self) -> Result<(), crate::integration::IntegrationError> {
        let response = crate::auth::fetch_auth_status(&self.session).await?;
        let mut previous = self.previous.write().await;

        for challenge in detect_new_challenges(&previous, &response.servers) {
            self.handle_new_challenge(&challenge).await;
        }
        for resolved in detect_resolved_challenges(&previous, &response.servers) {
            self.events.on_auth_complete(&resolved.server_name).await;
        }

        *previous = response.servers;
        Ok(())
    }

    /// Runs until `cancel` fires, applying exponential backoff on
    /// consecutive fetch failures and resetting to the configured period
    /// on the first success after a failure streak.
    pub async fn run(self: Arc<Self>, cancel: CancellationToken) {
        let mut consecutive_failures: u32 = 0;
        loop {
            let result = self.poll_and_diff().await;
            let delay = match result {
                Ok(()) => {
                    consecutive_failures = 0;
                    config::AUTH_WATCH_PERIOD
                }
                Err(e) => {
                    consecutive_failures += 1;
                    if consecutive_failures <= 3 {
                        debug!(error = %e, failures = consecutive_failures, "auth-watcher fetch failed");
                    } else {
                        warn!(error = %e, failures = consecutive_failures, "auth-watcher fetch failed");
                    }
                    backoff_delay(consecutive_failures)
                }
            };

            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::types::AuthChallenge;

    fn status(name: &str, status: &str, issuer: Option<&str>) -> ServerAuthStatus {
        ServerAuthStatus {
            server_name: name.to_string(),
            status: status.to_string(),
            challenge: issuer.map(|issuer| AuthChallenge {
                issuer: issuer.to_string(),
                scope: None,
                auth_tool_name: format!("x_{name}_auth"),
            }),
            error: None,
        }
    }

    #[test]
    fn detects_new_challenge_not_previously_present() {
        let old = vec![status("gitlab", "connected", None)];
        let new = vec![status("gitlab", "auth_required", Some("https://idp.example/"))];
        let found = detect_new_challenges(&old, &new);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].server_name, "gitlab");
    }

    #[test]
    fn detects_resolved_challenge() {
        let old = vec![status("gitlab", "auth_required", Some("https://idp.example/"))];
        let new = vec![status("gitlab", "connected", None)];
        let found = detect_resolved_challenges(&old, &new);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].server_name, "gitlab");
    }

    #[test]
    fn backoff_sequence_matches_spec() {
        let expected = [1, 2, 4, 8, 16, 32, 64, 128, 256, 300, 300];
        for (k, expected_secs) in expected.iter().enumerate() {
            let delay = backoff_delay((k + 1) as u32);
            assert_eq!(delay.as_secs(), *expected_secs as u64, "k={}", k + 1);
        }
    }

    #[test]
    fn zero_failures_means_no_delay() {
        assert_eq!(backoff_delay(0), Duration::ZERO);
    }
}
