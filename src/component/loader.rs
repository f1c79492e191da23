//! Conditional, multi-pass component loading.
//!
//! # Responsibilities
//! - Register the definitions of components whose conditions all match
//! - Retry skipped components while the previous pass made progress
//!
//! # Design Decisions
//! - A pass registers matching components immediately, so later components
//!   in the same pass already see them
//! - Loading stops when nothing is skipped or the skipped set stopped
//!   shrinking; leftovers are unsatisfiable here, not an error
//! - Loading the same components twice is a no-op the second time

use std::sync::Arc;

use crate::component::condition::ConditionContext;
use crate::component::container::Container;
use crate::component::error::ContainerError;
use crate::component::registry::Component;
use crate::context::Context;
use crate::env::Environment;

/// Outcome of one [`ConditionalLoader::load`] call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadReport {
    /// Names newly registered, in registration order.
    pub registered: Vec<String>,
    /// Names whose conditions never matched.
    pub skipped: Vec<String>,
    pub passes: usize,
}

pub struct ConditionalLoader<'a> {
    container: &'a Container,
    environment: &'a Environment,
}

impl<'a> ConditionalLoader<'a> {
    pub fn new(container: &'a Container, environment: &'a Environment) -> Self {
        Self {
            container,
            environment,
        }
    }

    pub fn load(&self, ctx: &Context, components: &[Component]) -> Result<LoadReport, ContainerError> {
        let mut report = LoadReport::default();
        let mut pending: Vec<&Component> = components.iter().collect();

        loop {
            report.passes += 1;
            let before = pending.len();
            let mut skipped = Vec::new();

            for component in pending {
                if self.matches(ctx, component) {
                    if self.register(component)? {
                        report.registered.push(component.name().to_string());
                    }
                } else {
                    skipped.push(component);
                }
            }

            tracing::debug!(
                pass = report.passes,
                registered = before - skipped.len(),
                skipped = skipped.len(),
                "Component loading pass finished"
            );

            let stalled = skipped.len() >= before;
            pending = skipped;
            if pending.is_empty() || stalled {
                break;
            }
        }

        for component in &pending {
            tracing::debug!(name = %component.name(), "Component skipped, conditions not met");
        }
        report.skipped = pending.iter().map(|c| c.name().to_string()).collect();
        Ok(report)
    }

    fn matches(&self, ctx: &Context, component: &Component) -> bool {
        let cx = ConditionContext::new(ctx, self.container, self.environment);
        component.conditions().all(|condition| condition.matches(&cx))
    }

    /// Returns `false` when this exact definition is already registered.
    fn register(&self, component: &Component) -> Result<bool, ContainerError> {
        match self.container.definition(component.name()) {
            Some(existing) if Arc::ptr_eq(&existing, component.definition()) => Ok(false),
            Some(_) => Err(ContainerError::DefinitionAlreadyExists(
                component.name().to_string(),
            )),
            None => {
                self.container.register_definition(component.definition().clone())?;
                Ok(true)
            }
        }
    }
}
