//! Semantic validation of the bound configuration.
//!
//! Serde and binding catch malformed values; this pass checks combinations
//! and ranges, and reports every problem at once.

use std::fmt;
use std::net::SocketAddr;

use tracing_subscriber::EnvFilter;

use crate::config::schema::ApplicationConfig;

/// One semantic problem with the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Check the configuration, returning all errors found.
pub fn validate_config(config: &ApplicationConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.server.address.trim().is_empty() {
        errors.push(ValidationError::new("server.address", "must not be empty"));
    }
    if config.server.request_timeout_secs == 0 {
        errors.push(ValidationError::new(
            "server.request-timeout-secs",
            "must be greater than zero",
        ));
    }
    if config.server.max_body_size == 0 {
        errors.push(ValidationError::new(
            "server.max-body-size",
            "must be greater than zero",
        ));
    }

    if config.logging.level.trim().is_empty() {
        errors.push(ValidationError::new("logging.level", "must not be empty"));
    } else if let Err(e) = EnvFilter::try_new(&config.logging.level) {
        errors.push(ValidationError::new("logging.level", e.to_string()));
    }

    if config.metrics.enabled {
        match config.metrics.address.parse::<SocketAddr>() {
            Ok(addr) if config.server.port != 0 && addr.port() == config.server.port => {
                errors.push(ValidationError::new(
                    "metrics.address",
                    "must not use the server port",
                ));
            }
            Ok(_) => {}
            Err(e) => errors.push(ValidationError::new("metrics.address", e.to_string())),
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(validate_config(&ApplicationConfig::default()).is_ok());
    }

    #[test]
    fn reports_every_error() {
        let mut config = ApplicationConfig::default();
        config.server.address = String::new();
        config.server.request_timeout_secs = 0;
        config.metrics.enabled = true;
        config.metrics.address = "not an address".into();

        let errors = validate_config(&config).unwrap_err();
        let fields: Vec<&str> = errors.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(
            fields,
            vec!["server.address", "server.request-timeout-secs", "metrics.address"]
        );
    }

    #[test]
    fn metrics_port_must_differ_from_server_port() {
        let mut config = ApplicationConfig::default();
        config.metrics.enabled = true;
        config.metrics.address = "127.0.0.1:8080".into();

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors[0].field, "metrics.address");
    }
}
