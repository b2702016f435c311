//! Authentication: token store, OAuth manager, and the poller/watcher
//! pair that observe the aggregator's `auth://status` resource (spec
//! §4.D–§4.F).

pub mod error;
pub mod manager;
pub mod poller;
pub mod store;
pub mod types;
pub mod watcher;

pub use error::{AuthError, AuthResult};
pub use manager::{OAuthClientConfig, OAuthManager};
pub use poller::AuthStatusPoller;
pub use store::{InMemoryTokenStore, TokenStore};
pub use types::{AuthRequiredInfo, AuthState, AuthStatusResponse, OAuthToken, ServerAuthStatus};
pub use watcher::{AuthWatcher, WatcherEvents};

use crate::config;
use crate::integration::{IntegrationError, Session};

/// Fetches and parses `auth://status`, shared by the poller and watcher.
/// A malformed payload is reported as [`IntegrationError::InvalidResponse`]
/// rather than panicking; callers keep their last-known cache on error
/// (§7, kind 7).
pub(crate) async fn fetch_auth_status(
    session: &Session,
) -> Result<AuthStatusResponse, IntegrationError> {
    let contents = session.get_resource(config::AUTH_STATUS_RESOURCE_URI).await?;
    let text = contents
        .iter()
        .find_map(|c| c.as_text())
        .ok_or_else(|| IntegrationError::InvalidResponse("auth://status had no text content".into()))?;

    serde_json::from_str(text)
        .map_err(|e| IntegrationError::InvalidResponse(format!("auth://status parse error: {e}")))
}
