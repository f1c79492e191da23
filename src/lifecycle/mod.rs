//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs, event.rs):
//!     Starting → EnvironmentPrepared → ContextPrepared → ContextLoaded
//!         → Started → Ready
//!     any non-terminal phase → Failed
//!     each transition → StartupEvent → listeners (registration order)
//!
//! Shutdown (shutdown.rs):
//!     trigger → broadcast → server drains → container closes
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Shutdown::trigger
//! ```
//!
//! # Design Decisions
//! - Ordered startup: environment first, then components, then listeners
//! - Ordered shutdown: stop accepting, drain in-flight requests, finalize
//!   singletons

pub mod event;
pub mod shutdown;
pub mod signals;
pub mod startup;

pub use event::{EventBroadcaster, LifecycleError, Phase, StartupEvent, StartupListener};
pub use shutdown::Shutdown;
pub use startup::StartupMachine;
