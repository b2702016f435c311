//! Errors raised by the auth store, OAuth manager, poller, and watcher.

use thiserror::Error;

/// Errors from the OAuth manager, token store, poller, and watcher
/// (§4.D–§4.F).
#[derive(Debug, Error)]
pub enum AuthError {
    /// Token-exchange failed; terminal for the current flow (state →
    /// failed). The caller may restart with `start_flow`.
    #[error("OAuth token exchange failed: {0}")]
    TokenExchange(String),

    /// The loopback callback server could not bind its port.
    #[error("OAuth callback port unavailable: {0}")]
    CallbackPortCollision(String),

    /// `wait_for_auth` hit its deadline before the callback arrived.
    #[error("timed out waiting for authentication callback")]
    WaitTimeout,

    /// The callback's `state` parameter didn't match the one issued with
    /// the authorization URL (CSRF check failure).
    #[error("OAuth callback state mismatch")]
    StateMismatch,

    /// No token is stored for the issuer/server requested.
    #[error("no token found for {0}")]
    NoToken(String),

    /// `get_bearer_token` called before any successful authentication.
    #[error("not authenticated")]
    NotAuthenticated,

    /// H's re-auth sub-state-machine has no auth manager registered for
    /// the current session (§4.H, step 3a).
    #[error("no auth manager registered; restart the agent to re-authenticate")]
    NoManagerRegistered,

    /// Another re-auth flow is already running (§4.H, step 3b).
    #[error("re-authentication already in progress, please retry shortly")]
    ReauthInProgress,

    #[error("invalid authorization URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error(transparent)]
    Transport(#[from] crate::transport::TransportError),
}

pub type AuthResult<T> = Result<T, AuthError>;
