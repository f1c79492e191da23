//! Startup phases, events and listeners.
//!
//! # Design Decisions
//! - Listeners are kept in one ordered list, each optionally filtered to a
//!   phase, so delivery follows registration order across all phases
//! - Broadcast is synchronous; a panicking listener is logged and skipped so
//!   the remaining listeners still receive the event

use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use thiserror::Error;

use crate::component::{BoxError, Container};
use crate::context::Context;
use crate::env::Environment;

/// Application startup phases, in order. `Ready` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Phase {
    Starting,
    EnvironmentPrepared,
    ContextPrepared,
    ContextLoaded,
    Started,
    Ready,
    Failed,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Starting => "starting",
            Self::EnvironmentPrepared => "environment-prepared",
            Self::ContextPrepared => "context-prepared",
            Self::ContextLoaded => "context-loaded",
            Self::Started => "started",
            Self::Ready => "ready",
            Self::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Ready | Self::Failed)
    }

    /// The phase that must follow this one on success.
    pub fn next(&self) -> Option<Phase> {
        match self {
            Self::Starting => Some(Self::EnvironmentPrepared),
            Self::EnvironmentPrepared => Some(Self::ContextPrepared),
            Self::ContextPrepared => Some(Self::ContextLoaded),
            Self::ContextLoaded => Some(Self::Started),
            Self::Started => Some(Self::Ready),
            Self::Ready | Self::Failed => None,
        }
    }

    /// Whether a machine currently in `from` may move to `to`.
    pub fn can_transition(from: Option<Phase>, to: Phase) -> bool {
        match (from, to) {
            (Some(current), _) if current.is_terminal() => false,
            (_, Phase::Failed) => true,
            (None, next) => next == Phase::Starting,
            (Some(current), next) => current.next() == Some(next),
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LifecycleError {
    #[error("illegal phase transition from {} to {to}", phase_name(.from))]
    IllegalTransition { from: Option<Phase>, to: Phase },

    #[error("startup listener failed during {phase}: {message}")]
    ListenerFailed { phase: Phase, message: String },
}

fn phase_name(phase: &Option<Phase>) -> &'static str {
    phase.as_ref().map_or("initial", Phase::as_str)
}

/// What listeners receive for each phase.
#[derive(Clone)]
pub struct StartupEvent {
    pub phase: Phase,
    pub app_name: Arc<str>,
    pub args: Arc<[String]>,
    pub context: Context,
    pub timestamp: SystemTime,
    /// Time since `Starting`; set for `Started` and `Ready`.
    pub elapsed: Option<Duration>,
    /// Present once the environment has been prepared.
    pub environment: Option<Arc<Environment>>,
    /// Present once the context has been prepared.
    pub container: Option<Arc<Container>>,
    /// Failure description; set for `Failed`.
    pub error: Option<String>,
}

impl fmt::Debug for StartupEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StartupEvent")
            .field("phase", &self.phase)
            .field("app_name", &self.app_name)
            .field("elapsed", &self.elapsed)
            .field("error", &self.error)
            .finish_non_exhaustive()
    }
}

pub trait StartupListener: Send + Sync {
    fn on_event(&self, event: &StartupEvent) -> Result<(), BoxError>;
}

impl<F> StartupListener for F
where
    F: Fn(&StartupEvent) -> Result<(), BoxError> + Send + Sync,
{
    fn on_event(&self, event: &StartupEvent) -> Result<(), BoxError> {
        self(event)
    }
}

/// Ordered listener list.
#[derive(Clone, Default)]
pub struct EventBroadcaster {
    listeners: Vec<(Option<Phase>, Arc<dyn StartupListener>)>,
}

impl EventBroadcaster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Listen to every phase.
    pub fn subscribe(&mut self, listener: impl StartupListener + 'static) {
        self.listeners.push((None, Arc::new(listener)));
    }

    /// Listen to one phase only.
    pub fn subscribe_to(&mut self, phase: Phase, listener: impl StartupListener + 'static) {
        self.listeners.push((Some(phase), Arc::new(listener)));
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    /// Deliver `event` to every interested listener in registration order.
    /// Returns the first listener error after everyone was called.
    pub fn broadcast(&self, event: &StartupEvent) -> Result<(), LifecycleError> {
        let mut first_error = None;
        for (filter, listener) in &self.listeners {
            if filter.is_some_and(|phase| phase != event.phase) {
                continue;
            }
            match catch_unwind(AssertUnwindSafe(|| listener.on_event(event))) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    tracing::warn!(phase = %event.phase, error = %e, "Startup listener failed");
                    first_error.get_or_insert(LifecycleError::ListenerFailed {
                        phase: event.phase,
                        message: e.to_string(),
                    });
                }
                Err(panic) => {
                    let message = panic
                        .downcast_ref::<&str>()
                        .map(|s| s.to_string())
                        .or_else(|| panic.downcast_ref::<String>().cloned())
                        .unwrap_or_else(|| "non-string panic payload".to_string());
                    tracing::error!(phase = %event.phase, panic = %message, "Startup listener panicked");
                }
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    fn event(phase: Phase) -> StartupEvent {
        StartupEvent {
            phase,
            app_name: Arc::from("test"),
            args: Arc::from(Vec::new()),
            context: Context::background(),
            timestamp: SystemTime::now(),
            elapsed: None,
            environment: None,
            container: None,
            error: None,
        }
    }

    #[test]
    fn transitions_follow_phase_order() {
        assert!(Phase::can_transition(None, Phase::Starting));
        assert!(!Phase::can_transition(None, Phase::Ready));
        assert!(Phase::can_transition(Some(Phase::Starting), Phase::EnvironmentPrepared));
        assert!(!Phase::can_transition(Some(Phase::Starting), Phase::ContextLoaded));
        assert!(Phase::can_transition(Some(Phase::ContextLoaded), Phase::Failed));
        assert!(!Phase::can_transition(Some(Phase::Ready), Phase::Failed));
        assert!(!Phase::can_transition(Some(Phase::Failed), Phase::Failed));
    }

    #[test]
    fn panicking_listener_does_not_stop_delivery() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut broadcaster = EventBroadcaster::new();

        let first = seen.clone();
        broadcaster.subscribe(move |e: &StartupEvent| -> Result<(), BoxError> {
            first.lock().push(format!("first:{}", e.phase));
            Ok(())
        });
        broadcaster.subscribe(|_: &StartupEvent| -> Result<(), BoxError> { panic!("listener bug") });
        let third = seen.clone();
        broadcaster.subscribe_to(Phase::Starting, move |e: &StartupEvent| -> Result<(), BoxError> {
            third.lock().push(format!("third:{}", e.phase));
            Ok(())
        });

        broadcaster.broadcast(&event(Phase::Starting)).unwrap();
        broadcaster.broadcast(&event(Phase::EnvironmentPrepared)).unwrap();
        assert_eq!(
            *seen.lock(),
            vec!["first:starting", "third:starting", "first:environment-prepared"]
        );
    }

    #[test]
    fn listener_error_is_reported_after_full_delivery() {
        let calls = Arc::new(Mutex::new(0));
        let mut broadcaster = EventBroadcaster::new();
        broadcaster.subscribe(|_: &StartupEvent| -> Result<(), BoxError> { Err("nope".into()) });
        let counter = calls.clone();
        broadcaster.subscribe(move |_: &StartupEvent| -> Result<(), BoxError> {
            *counter.lock() += 1;
            Ok(())
        });

        let err = broadcaster.broadcast(&event(Phase::Started)).unwrap_err();
        assert_eq!(
            err,
            LifecycleError::ListenerFailed {
                phase: Phase::Started,
                message: "nope".into()
            }
        );
        assert_eq!(*calls.lock(), 1);
    }
}
