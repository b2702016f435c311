//! Errors a context switch can fail with (§4.I).

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ContextError {
    #[error(transparent)]
    Integration(#[from] crate::integration::IntegrationError),

    #[error(transparent)]
    Auth(#[from] crate::auth::AuthError),

    /// Reconnect still failed with "unauthorized" after the one retry
    /// §4.I step 3 allows.
    #[error("switch to {0} failed: unauthorized even after re-auth")]
    StillUnauthorized(String),
}

pub type ContextResult<T> = Result<T, ContextError>;
