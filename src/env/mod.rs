//! Environment subsystem.
//!
//! # Data Flow
//! ```text
//! command line      → CommandLinePropertySource  (highest precedence)
//! config resolver   → MapPropertySource per file  (profile files first)
//! programmatic maps → MapPropertySource
//!     → PropertySources (ordered, first match wins)
//!     → Environment (placeholder expansion, typed reads, profiles)
//!     → conditions, ApplicationConfig, user components
//! ```
//!
//! # Design Decisions
//! - Values are strings until read; conversion goes through `FromStr`
//! - Only bare `${key}` placeholders are supported
//! - Environment variables are visible only through an explicitly added
//!   `SystemEnvironmentPropertySource`

pub mod environment;
pub mod error;
pub mod resolver;
pub mod source;

pub use environment::{Environment, DEFAULT_PROFILE};
pub use error::EnvError;
pub use resolver::PlaceholderResolver;
pub use source::{
    CommandLinePropertySource, MapPropertySource, PropertySource, PropertySources,
    SystemEnvironmentPropertySource,
};
