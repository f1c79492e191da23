//! Dispatch-time errors.

use axum::http::StatusCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DispatchError {
    /// The body was already written; status, headers and redirects are
    /// frozen.
    #[error("response already committed")]
    ResponseCommitted,

    #[error("failed to read request body: {0}")]
    BodyRead(String),

    #[error("request body exceeds {limit} bytes")]
    BodyTooLarge { limit: usize },

    #[error("invalid JSON body: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid header '{name}'")]
    InvalidHeader { name: String },
}

impl DispatchError {
    /// Status written when the error reaches the client unanswered.
    pub fn status(&self) -> StatusCode {
        match self {
            Self::BodyTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            Self::Json(_) | Self::BodyRead(_) => StatusCode::BAD_REQUEST,
            Self::ResponseCommitted | Self::InvalidHeader { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}
