//! Configuration schema definitions.
//!
//! This module defines the settings the runtime itself consumes. They are
//! bound from the environment, so every field can come from a config file,
//! the command line or code. All types derive Serde traits so the effective
//! configuration can be dumped or deserialized directly.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::config::loader::ConfigError;
use crate::env::Environment;

/// Root configuration of the runtime.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct ApplicationConfig {
    /// HTTP server settings (`server.*`).
    pub server: ServerConfig,

    /// Logging settings (`logging.*`).
    pub logging: LoggingConfig,

    /// Metrics exporter settings (`metrics.*`).
    pub metrics: MetricsConfig,
}

/// HTTP server configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    /// Interface to bind (e.g., "0.0.0.0").
    pub address: String,

    /// Port to bind; 0 picks a free port.
    pub port: u16,

    /// Total time allowed per request, in seconds.
    pub request_timeout_secs: u64,

    /// Maximum accepted request body, in bytes.
    pub max_body_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: "0.0.0.0".to_string(),
            port: 8080,
            request_timeout_secs: 30,
            max_body_size: 2 * 1024 * 1024,
        }
    }
}

impl ServerConfig {
    /// `address:port`, ready for `TcpListener::bind`.
    pub fn bind_address(&self) -> String {
        if self.address.contains(':') && !self.address.starts_with('[') {
            format!("[{}]:{}", self.address, self.port)
        } else {
            format!("{}:{}", self.address, self.port)
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pretty" | "text" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(format!("unknown log format '{other}', expected pretty or json")),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directives, used when `RUST_LOG` is unset.
    pub level: String,

    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "procyon=info,tower_http=info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}

/// Prometheus exporter configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct MetricsConfig {
    pub enabled: bool,

    /// Exporter listen address (e.g., "0.0.0.0:9090").
    pub address: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            address: "0.0.0.0:9090".to_string(),
        }
    }
}

impl ApplicationConfig {
    /// Read every known key from the environment, keeping defaults for
    /// absent ones. Keys accept kebab-case or snake_case.
    pub fn bind(env: &Environment) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let server = &mut config.server;
        bind_into(env, &["server.address"], &mut server.address)?;
        bind_into(env, &["server.port"], &mut server.port)?;
        bind_into(
            env,
            &["server.request-timeout-secs", "server.request_timeout_secs"],
            &mut server.request_timeout_secs,
        )?;
        bind_into(
            env,
            &["server.max-body-size", "server.max_body_size"],
            &mut server.max_body_size,
        )?;

        bind_into(env, &["logging.level"], &mut config.logging.level)?;
        bind_into(env, &["logging.format"], &mut config.logging.format)?;

        bind_into(env, &["metrics.enabled"], &mut config.metrics.enabled)?;
        bind_into(env, &["metrics.address"], &mut config.metrics.address)?;
        Ok(config)
    }
}

fn bind_into<T>(env: &Environment, keys: &[&str], target: &mut T) -> Result<(), ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    for key in keys {
        if let Some(raw) = env.property(key) {
            *target = raw.trim().parse().map_err(|e: T::Err| ConfigError::Binding {
                key: key.to_string(),
                message: e.to_string(),
            })?;
            return Ok(());
        }
    }
    Ok(())
}
