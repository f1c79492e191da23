//! Environment errors.

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EnvError {
    #[error("could not resolve placeholder '{key}' in value \"{text}\"")]
    UnresolvablePlaceholder { key: String, text: String },

    #[error("circular placeholder reference '{0}'")]
    CircularPlaceholder(String),

    #[error("required property '{0}' not found")]
    MissingProperty(String),

    #[error("property '{key}' has value \"{value}\" that cannot be converted: {message}")]
    Conversion {
        key: String,
        value: String,
        message: String,
    },

    #[error("property source index {index} out of range (len {len})")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("property source '{0}' not found")]
    SourceNotFound(String),
}
