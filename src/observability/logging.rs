//! Structured logging.
//!
//! # Responsibilities
//! - Initialize the global `tracing` subscriber from `logging.*` settings
//!
//! # Design Decisions
//! - `RUST_LOG` wins over the configured level when set
//! - JSON format for production, pretty format for development
//! - A second initialization is ignored so tests and embedders can call it
//!   freely

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::schema::{LogFormat, LoggingConfig};

/// Filter used when neither `RUST_LOG` nor `logging.level` parse.
pub const DEFAULT_FILTER: &str = "procyon=info,tower_http=info";

fn filter_for(config: &LoggingConfig) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

/// Install the subscriber. Returns `false` if one was already installed.
pub fn init_logging(config: &LoggingConfig) -> bool {
    let registry = tracing_subscriber::registry().with(filter_for(config));
    let installed = match config.format {
        LogFormat::Json => registry.with(fmt::layer().json()).try_init(),
        LogFormat::Pretty => registry.with(fmt::layer()).try_init(),
    };
    installed.is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_init_is_ignored() {
        let config = LoggingConfig::default();
        let _ = init_logging(&config);
        assert!(!init_logging(&config));
    }

    #[test]
    fn bad_level_falls_back() {
        let config = LoggingConfig {
            level: "[[not a filter".into(),
            ..LoggingConfig::default()
        };
        // Either RUST_LOG or the default filter; never a panic.
        let _ = filter_for(&config);
    }
}
