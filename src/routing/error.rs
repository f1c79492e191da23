//! Route registration errors.
//!
//! Lookups never fail: a miss is `None`. These errors only come out of
//! `Router::insert` and abort startup.

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RouteError {
    #[error("invalid route pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("duplicate route {method} {pattern}")]
    DuplicateRoute { method: String, pattern: String },

    #[error("empty parameter name in '{pattern}'")]
    EmptyParamName { pattern: String },

    #[error("unclosed parameter in '{pattern}'")]
    UnclosedParam { pattern: String },

    #[error("'{pattern}' declares {count} parameters, at most {max} are supported")]
    TooManyParams {
        pattern: String,
        count: usize,
        max: usize,
    },
}

impl RouteError {
    pub(crate) fn invalid(pattern: &str, reason: impl Into<String>) -> Self {
        Self::InvalidPattern {
            pattern: pattern.to_string(),
            reason: reason.into(),
        }
    }
}
