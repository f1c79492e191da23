//! Startup orchestration state machine.
//!
//! # Responsibilities
//! - Track the current startup phase and reject out-of-order transitions
//! - Build and broadcast the event for every phase
//! - Move to `Failed` when a listener or a startup step fails
//!
//! # Design Decisions
//! - Fail fast: the first listener error aborts startup
//! - `Failed` is broadcast at most once; further failures are only logged
//! - Elapsed time is measured from `Starting`

use std::sync::Arc;
use std::time::{Instant, SystemTime};

use crate::component::Container;
use crate::context::Context;
use crate::env::Environment;
use crate::lifecycle::event::{EventBroadcaster, LifecycleError, Phase, StartupEvent};
use crate::observability::metrics;

pub struct StartupMachine {
    app_name: Arc<str>,
    args: Arc<[String]>,
    broadcaster: EventBroadcaster,
    phase: Option<Phase>,
    started_at: Instant,
    environment: Option<Arc<Environment>>,
    container: Option<Arc<Container>>,
}

impl StartupMachine {
    pub fn new(app_name: &str, args: &[String], broadcaster: EventBroadcaster) -> Self {
        Self {
            app_name: Arc::from(app_name),
            args: Arc::from(args.to_vec()),
            broadcaster,
            phase: None,
            started_at: Instant::now(),
            environment: None,
            container: None,
        }
    }

    pub fn phase(&self) -> Option<Phase> {
        self.phase
    }

    pub fn set_environment(&mut self, environment: Arc<Environment>) {
        self.environment = Some(environment);
    }

    pub fn set_container(&mut self, container: Arc<Container>) {
        self.container = Some(container);
    }

    /// Move to `phase` and broadcast it. A listener error moves the machine
    /// to `Failed` and is returned.
    pub fn advance(&mut self, ctx: &Context, phase: Phase) -> Result<(), LifecycleError> {
        if phase == Phase::Failed || !Phase::can_transition(self.phase, phase) {
            return Err(LifecycleError::IllegalTransition {
                from: self.phase,
                to: phase,
            });
        }
        if phase == Phase::Starting {
            self.started_at = Instant::now();
        }
        self.phase = Some(phase);

        let elapsed = matches!(phase, Phase::Started | Phase::Ready)
            .then(|| self.started_at.elapsed());
        tracing::info!(
            app = %self.app_name,
            phase = %phase,
            elapsed_ms = elapsed.map(|d| d.as_millis() as u64),
            "Application phase changed"
        );
        if phase == Phase::Ready {
            if let Some(elapsed) = elapsed {
                metrics::record_startup(elapsed);
            }
        }

        let event = self.event(ctx, phase, elapsed, None);
        if let Err(e) = self.broadcaster.broadcast(&event) {
            self.fail(ctx, &e);
            return Err(e);
        }
        Ok(())
    }

    /// Move to `Failed` and broadcast it. Ignored once terminal.
    pub fn fail(&mut self, ctx: &Context, error: &dyn std::fmt::Display) {
        if !Phase::can_transition(self.phase, Phase::Failed) {
            tracing::debug!(error = %error, "Failure after terminal phase ignored");
            return;
        }
        let from = self.phase;
        self.phase = Some(Phase::Failed);
        tracing::error!(
            app = %self.app_name,
            from = from.map(|p| p.as_str()).unwrap_or("initial"),
            error = %error,
            "Application startup failed"
        );

        let event = self.event(ctx, Phase::Failed, Some(self.started_at.elapsed()), Some(error.to_string()));
        if let Err(e) = self.broadcaster.broadcast(&event) {
            tracing::warn!(error = %e, "Listener failed while handling startup failure");
        }
    }

    fn event(
        &self,
        ctx: &Context,
        phase: Phase,
        elapsed: Option<std::time::Duration>,
        error: Option<String>,
    ) -> StartupEvent {
        StartupEvent {
            phase,
            app_name: self.app_name.clone(),
            args: self.args.clone(),
            context: ctx.clone(),
            timestamp: SystemTime::now(),
            elapsed,
            environment: self.environment.clone(),
            container: self.container.clone(),
            error,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::BoxError;
    use parking_lot::Mutex;

    fn recording() -> (EventBroadcaster, Arc<Mutex<Vec<(Phase, bool)>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let mut broadcaster = EventBroadcaster::new();
        broadcaster.subscribe(move |e: &StartupEvent| -> Result<(), BoxError> {
            sink.lock().push((e.phase, e.elapsed.is_some()));
            Ok(())
        });
        (broadcaster, seen)
    }

    #[test]
    fn runs_through_every_phase() {
        let (broadcaster, seen) = recording();
        let mut machine = StartupMachine::new("app", &[], broadcaster);
        let ctx = Context::background();

        for phase in [
            Phase::Starting,
            Phase::EnvironmentPrepared,
            Phase::ContextPrepared,
            Phase::ContextLoaded,
            Phase::Started,
            Phase::Ready,
        ] {
            machine.advance(&ctx, phase).unwrap();
        }

        assert_eq!(
            *seen.lock(),
            vec![
                (Phase::Starting, false),
                (Phase::EnvironmentPrepared, false),
                (Phase::ContextPrepared, false),
                (Phase::ContextLoaded, false),
                (Phase::Started, true),
                (Phase::Ready, true),
            ]
        );
    }

    #[test]
    fn skipping_a_phase_is_rejected() {
        let (broadcaster, _) = recording();
        let mut machine = StartupMachine::new("app", &[], broadcaster);
        let ctx = Context::background();
        machine.advance(&ctx, Phase::Starting).unwrap();

        let err = machine.advance(&ctx, Phase::Started).unwrap_err();
        assert!(matches!(err, LifecycleError::IllegalTransition { .. }));
        assert_eq!(machine.phase(), Some(Phase::Starting));
    }

    #[test]
    fn listener_error_fails_startup_once() {
        let (mut broadcaster, seen) = recording();
        broadcaster.subscribe_to(Phase::EnvironmentPrepared, |_: &StartupEvent| -> Result<(), BoxError> {
            Err("bad environment".into())
        });
        let mut machine = StartupMachine::new("app", &[], broadcaster);
        let ctx = Context::background();

        machine.advance(&ctx, Phase::Starting).unwrap();
        assert!(machine.advance(&ctx, Phase::EnvironmentPrepared).is_err());
        assert_eq!(machine.phase(), Some(Phase::Failed));

        machine.fail(&ctx, &"again");
        let phases: Vec<Phase> = seen.lock().iter().map(|(p, _)| *p).collect();
        assert_eq!(phases, vec![Phase::Starting, Phase::EnvironmentPrepared, Phase::Failed]);
    }
}
