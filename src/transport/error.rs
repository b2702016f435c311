//! Transport-level error taxonomy.
//!
//! Mirrors the observable failure contract of [`super::traits::Transport`]:
//! every `invoke` either returns a result value or one of these kinds.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors surfaced by a transport's `start`, `invoke`, and `close` calls.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Error)]
pub enum TransportError {
    /// Connection refused, DNS failure, TLS failure, or a dropped stream.
    #[error("network error: {0}")]
    Network(String),

    /// The call exceeded its deadline.
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    /// The aggregator responded with a JSON-RPC error object.
    #[error("server error {code}: {message}")]
    ServerError { code: i32, message: String },

    /// HTTP 401 or an equivalent OAuth-unauthorized classification.
    #[error("unauthorized")]
    Unauthorized,

    /// The transport was closed (by us or the peer) before the call completed.
    #[error("transport closed")]
    Closed,

    /// `on_notification` was called on a transport whose
    /// `supports_notifications()` is `false`.
    #[error("notifications are not supported by this transport")]
    NotificationsUnsupported,

    /// The response could not be parsed as the expected JSON-RPC shape.
    #[error("malformed response: {0}")]
    Malformed(String),
}

impl TransportError {
    /// The §7 "token-expired" predicate: a distinguished case of
    /// `Unauthorized` identified by inspecting the server's own wording,
    /// since the wire protocol carries no separate error code for it.
    pub fn is_token_expired(&self) -> bool {
        match self {
            TransportError::Unauthorized => true,
            TransportError::ServerError { message, .. } => {
                let lower = message.to_lowercase();
                lower.contains("token") && (lower.contains("expired") || lower.contains("invalid"))
            }
            _ => false,
        }
    }
}

/// Convenience result type for transport operations.
pub type TransportResult<T> = Result<T, TransportError>;
