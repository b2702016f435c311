//! Errors a meta-tool handler can fail with.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("argument '{0}' is required")]
    MissingArgument(String),

    #[error("unknown meta-tool: {0}")]
    UnknownTool(String),

    #[error(transparent)]
    Integration(#[from] crate::integration::IntegrationError),

    #[error(transparent)]
    Auth(#[from] crate::auth::AuthError),

    #[error("{0}")]
    Advisory(String),
}

pub type ServerResult<T> = Result<T, ServerError>;
