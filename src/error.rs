//! Top-level error aggregate.
//!
//! Mirrors the crate's per-module `thiserror` + aggregate pattern (see
//! `integration::error::IntegrationError`, `correlation::error`): each layer
//! owns its own enum, and `AgentError` wraps them for the boundary that
//! bridges multiple layers (the server forward pipeline, `main`).

use thiserror::Error;

use crate::auth::AuthError;
use crate::integration::error::IntegrationError;
use crate::transport::TransportError;

/// Errors observable at the outermost boundary of the agent.
#[derive(Debug, Error)]
pub enum AgentError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Integration(#[from] IntegrationError),

    #[error(transparent)]
    Auth(#[from] AuthError),

    /// Fatal at startup (§7, kind 1): bad CLI args, unparsable
    /// endpoint URL, missing required configuration.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Any other unrecoverable condition surfaced to `main`, exiting
    /// the process with a non-zero status (§6).
    #[error("startup failed: {0}")]
    Startup(String),
}

pub type AgentResult<T> = Result<T, AgentError>;
