//! Auth-status poller (§4.E): a best-effort advisor, never a source
//! of truth for authentication decisions.

use std::sync::Arc;

use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::auth::types::AuthRequiredInfo;
use crate::config;
use crate::integration::Session;

/// Fetches `auth://status` from the session and caches `auth_required`
/// entries. Lifecycle: started alongside the meta-tool server, stopped
/// on process shutdown via the given [`CancellationToken`].
pub struct AuthStatusPoller {
    session: Arc<Session>,
    cache: RwLock<Vec<AuthRequiredInfo>>,
}

impl AuthStatusPoller {
    pub fn new(session: Arc<Session>) -> Self {
        Self {
            session,
            cache: RwLock::new(Vec::new()),
        }
    }

    pub async fn snapshot(&self) -> Vec<AuthRequiredInfo> {
        self.cache.read().await.clone()
    }

    pub async fn has_any(&self) -> bool {
        !self.cache.read().await.is_empty()
    }

    /// Performs a single poll, updating the cache on success and leaving
    /// it untouched on parse or network failure.
    pub async fn poll_once(&self) {
        match crate::auth::fetch_auth_status(&self.session).await {
            Ok(response) => {
                let entries: Vec<AuthRequiredInfo> = response
                    .servers
                    .iter()
                    .filter_map(|s| s.to_auth_required_info())
                    .collect();
                *self.cache.write().await = entries;
            }
            Err(e) => {
                warn!(error = %e, "auth-status poll failed; keeping last-known cache");
            }
        }
    }

    /// Runs until `cancel` fires. First poll is immediate.
    pub async fn run(self: Arc<Self>, cancel: CancellationToken) {
        self.poll_once().await;
        let mut ticker = tokio::time::interval(config::AUTH_POLL_PERIOD);
        ticker.tick().await; // consume the immediate first tick
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => self.poll_once().await,
            }
        }
    }
}
