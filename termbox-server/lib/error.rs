//! Error types for the termbox server.
//!
//! Core errors are mapped onto HTTP status codes here. Errors from the background jobs never
//! reach this module; they are only logged.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use termbox_core::TermboxError;
use thiserror::Error;

use crate::payload::ErrorResponse;

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// The result of a server operation.
pub type ServerResult<T> = Result<T, ServerError>;

/// An error that occurred while serving a request or setting up the server.
#[derive(pretty_error_debug::Debug, Error)]
pub enum ServerError {
    /// The server configuration is invalid.
    #[error("configuration error: {0}")]
    ConfigError(String),

    /// The request is invalid.
    #[error(transparent)]
    ValidationError(#[from] ValidationError),

    /// The requested box does not exist.
    #[error("box not found: {0}")]
    NotFound(String),

    /// The container runtime failed.
    #[error("runtime error: {0}")]
    RuntimeError(String),

    /// Anything else.
    #[error("internal error: {0}")]
    InternalError(String),
}

/// A problem with the request itself.
#[derive(pretty_error_debug::Debug, Error)]
pub enum ValidationError {
    /// The request payload is malformed or refers to something unknown.
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

impl From<TermboxError> for ServerError {
    fn from(error: TermboxError) -> Self {
        match error {
            TermboxError::ImageNotInCatalog(_) => {
                ServerError::ValidationError(ValidationError::InvalidInput(error.to_string()))
            }
            TermboxError::PodNotFound(id) => ServerError::NotFound(id),
            TermboxError::Runtime(_)
            | TermboxError::RuntimeTimeout { .. }
            | TermboxError::Http(_)
            | TermboxError::MalformedPodEntry(_)
            | TermboxError::InvalidTimestamp { .. } => ServerError::RuntimeError(error.to_string()),
            _ => ServerError::InternalError(error.to_string()),
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = match &self {
            ServerError::ValidationError(_) => StatusCode::BAD_REQUEST,
            ServerError::NotFound(_) => StatusCode::NOT_FOUND,
            ServerError::RuntimeError(_) => StatusCode::BAD_GATEWAY,
            ServerError::ConfigError(_) | ServerError::InternalError(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        if status.is_server_error() {
            tracing::error!("request failed: {}", self);
        }

        (
            status,
            Json(ErrorResponse {
                error: self.to_string(),
            }),
        )
            .into_response()
    }
}
