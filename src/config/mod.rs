//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config files ({name}.yml, {name}-{profile}.toml, ...)
//!     → resolver.rs (locate per location/profile/extension)
//!     → loader.rs (parse & flatten to dot notation)
//!     → Environment property sources (below command-line args)
//!     → schema.rs (bind ApplicationConfig from the environment)
//!     → validation.rs (semantic checks)
//!     → shared via Arc to the server and as a resolvable component
//! ```
//!
//! # Design Decisions
//! - Files only contribute properties; typed binding happens afterwards so
//!   every source is treated the same
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (binding) from semantic checks

pub mod loader;
pub mod resolver;
pub mod schema;
pub mod validation;

pub use loader::{ConfigError, SourceLoader, TomlSourceLoader, YamlSourceLoader};
pub use resolver::ConfigResolver;
pub use schema::{ApplicationConfig, LogFormat, LoggingConfig, MetricsConfig, ServerConfig};
pub use validation::{validate_config, ValidationError};
