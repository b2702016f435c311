//! Errors surfaced by the session layer (§4.B).

use thiserror::Error;

use crate::transport::TransportError;

/// Errors a [`super::Session`] operation can fail with.
#[derive(Debug, Clone, Error)]
pub enum IntegrationError {
    /// Network, timeout, server-error, or unauthorized — propagated
    /// unchanged from the transport, per §4.B ("the session surfaces the
    /// error unchanged — only H decides whether to re-auth").
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// `get_resource` / `describe_resource` against an unknown URI.
    #[error("resource not found: {0}")]
    NotFound(String),

    /// The server's handshake capabilities don't cover the requested op.
    #[error("server does not support capability: {0}")]
    UnsupportedCapability(String),

    /// `initialize` called twice on the same session.
    #[error("session already initialized")]
    AlreadyInitialized,

    /// An operation requiring a handshake was called before `initialize`.
    #[error("session not initialized")]
    NotInitialized,

    /// The server's response didn't match the shape the operation expects.
    #[error("invalid response from server: {0}")]
    InvalidResponse(String),

    /// `serde_json` failed to build the outbound request parameters.
    #[error("failed to build request: {0}")]
    InvalidRequest(String),
}

pub type IntegrationResult<T> = Result<T, IntegrationError>;
