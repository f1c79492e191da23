//! Request identification.
//!
//! # Responsibilities
//! - Honor an incoming `x-request-id` or generate a UUID v4
//!
//! # Design Decisions
//! - Request ID assigned as early as possible so every log line of the
//!   request carries it
//! - Incoming IDs are accepted only if short and printable

use axum::http::HeaderMap;
use uuid::Uuid;

pub const X_REQUEST_ID: &str = "x-request-id";

const MAX_INCOMING_ID_LEN: usize = 128;

/// Request ID for `headers`, reusing a well-formed incoming one.
pub fn request_id(headers: &HeaderMap) -> String {
    headers
        .get(X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|id| !id.is_empty() && id.len() <= MAX_INCOMING_ID_LEN)
        .filter(|id| id.bytes().all(|b| b.is_ascii_graphic()))
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::new_v4().to_string())
}
