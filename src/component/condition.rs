//! Registration conditions.
//!
//! # Responsibilities
//! - Define the [`Condition`] predicate evaluated by the conditional loader
//! - Provide the built-in instance, type, profile and property conditions
//!
//! # Design Decisions
//! - `matches == true` means the component is registered
//! - Every built-in condition answers `false` once the context is cancelled
//! - Conditions only read the container and environment; they never create
//!   instances

use std::fmt;

use crate::component::container::Container;
use crate::component::types::TypeKey;
use crate::context::Context;
use crate::env::Environment;

/// What a condition can inspect while it is evaluated.
pub struct ConditionContext<'a> {
    ctx: &'a Context,
    container: &'a Container,
    environment: &'a Environment,
}

impl<'a> ConditionContext<'a> {
    pub fn new(ctx: &'a Context, container: &'a Container, environment: &'a Environment) -> Self {
        Self {
            ctx,
            container,
            environment,
        }
    }

    pub fn context(&self) -> &Context {
        self.ctx
    }

    pub fn container(&self) -> &Container {
        self.container
    }

    pub fn environment(&self) -> &Environment {
        self.environment
    }

    pub fn is_cancelled(&self) -> bool {
        self.ctx.is_cancelled()
    }
}

/// Predicate gating the registration of a component.
pub trait Condition: Send + Sync + fmt::Debug {
    fn matches(&self, cx: &ConditionContext<'_>) -> bool;
}

/// A singleton or definition named `name` is registered.
#[derive(Debug, Clone)]
pub struct OnInstance(pub String);

impl OnInstance {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }
}

impl Condition for OnInstance {
    fn matches(&self, cx: &ConditionContext<'_>) -> bool {
        !cx.is_cancelled() && cx.container().contains(&self.0)
    }
}

/// Neither a singleton nor a definition named `name` is registered.
#[derive(Debug, Clone)]
pub struct OnMissingInstance(pub String);

impl OnMissingInstance {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }
}

impl Condition for OnMissingInstance {
    fn matches(&self, cx: &ConditionContext<'_>) -> bool {
        !cx.is_cancelled() && !cx.container().contains(&self.0)
    }
}

/// Some singleton or definition produces a value assignable to the type.
#[derive(Debug, Clone, Copy)]
pub struct OnType(pub TypeKey);

impl OnType {
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self(TypeKey::of::<T>())
    }
}

impl Condition for OnType {
    fn matches(&self, cx: &ConditionContext<'_>) -> bool {
        !cx.is_cancelled() && cx.container().contains_type(self.0.id())
    }
}

/// No singleton or definition produces a value assignable to the type.
#[derive(Debug, Clone, Copy)]
pub struct OnMissingType(pub TypeKey);

impl OnMissingType {
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self(TypeKey::of::<T>())
    }
}

impl Condition for OnMissingType {
    fn matches(&self, cx: &ConditionContext<'_>) -> bool {
        !cx.is_cancelled() && !cx.container().contains_type(self.0.id())
    }
}

/// Every listed profile is active.
#[derive(Debug, Clone)]
pub struct OnProfile(pub Vec<String>);

impl OnProfile {
    pub fn new<I, S>(profiles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(profiles.into_iter().map(Into::into).collect())
    }
}

impl Condition for OnProfile {
    fn matches(&self, cx: &ConditionContext<'_>) -> bool {
        if cx.is_cancelled() {
            return false;
        }
        let active = cx.environment().active_profiles();
        self.0.iter().all(|p| active.iter().any(|a| a == p))
    }
}

/// The named property resolves, optionally to an expected value.
///
/// Values that parse as booleans compare as booleans, so `TRUE` equals
/// `true`. Without an expected value a boolean property must be `true` and
/// any other value matches.
#[derive(Debug, Clone)]
pub struct OnProperty {
    name: String,
    having_value: Option<String>,
    match_if_missing: bool,
}

impl OnProperty {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            having_value: None,
            match_if_missing: false,
        }
    }

    pub fn having_value(mut self, value: impl Into<String>) -> Self {
        self.having_value = Some(value.into());
        self
    }

    pub fn match_if_missing(mut self, matches: bool) -> Self {
        self.match_if_missing = matches;
        self
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" => Some(true),
        "false" => Some(false),
        _ => None,
    }
}

impl Condition for OnProperty {
    fn matches(&self, cx: &ConditionContext<'_>) -> bool {
        if cx.is_cancelled() {
            return false;
        }
        let Some(actual) = cx.environment().property(&self.name) else {
            return self.match_if_missing;
        };

        match &self.having_value {
            Some(expected) => match (parse_bool(&actual), parse_bool(expected)) {
                (Some(a), Some(e)) => a == e,
                _ => actual == *expected,
            },
            None => parse_bool(&actual).unwrap_or(true),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::definition::Definition;
    use crate::env::MapPropertySource;

    trait Store: Send + Sync {}
    struct Memory;
    impl Store for Memory {}

    fn container_with_memory() -> Container {
        let container = Container::new();
        container
            .register_definition(
                Definition::builder::<Memory>("memory")
                    .implements::<dyn Store>(|it| it)
                    .constructor(|_| Ok(Memory))
                    .build()
                    .unwrap(),
            )
            .unwrap();
        container
    }

    fn env_with(pairs: &[(&str, &str)]) -> Environment {
        let env = Environment::new();
        env.property_sources().add_last(MapPropertySource::from_pairs("test", pairs.iter().copied()));
        env
    }

    #[test]
    fn instance_and_type_conditions() {
        let container = container_with_memory();
        let env = Environment::new();
        let ctx = Context::background();
        let cx = ConditionContext::new(&ctx, &container, &env);

        assert!(OnInstance::new("memory").matches(&cx));
        assert!(!OnMissingInstance::new("memory").matches(&cx));
        assert!(OnMissingInstance::new("disk").matches(&cx));
        assert!(OnType::of::<dyn Store>().matches(&cx));
        assert!(!OnMissingType::of::<dyn Store>().matches(&cx));
        assert!(OnMissingType::of::<String>().matches(&cx));
    }

    #[test]
    fn property_condition_rules() {
        let container = Container::new();
        let env = env_with(&[("feature.x.enabled", "false"), ("mode", "fast"), ("flag", "TRUE")]);
        let ctx = Context::background();
        let cx = ConditionContext::new(&ctx, &container, &env);

        assert!(!OnProperty::new("feature.x.enabled").having_value("true").matches(&cx));
        assert!(OnProperty::new("feature.x.enabled").having_value("false").matches(&cx));
        assert!(!OnProperty::new("feature.x.enabled").matches(&cx));
        assert!(OnProperty::new("flag").matches(&cx));
        assert!(OnProperty::new("flag").having_value("true").matches(&cx));
        assert!(OnProperty::new("mode").matches(&cx));
        assert!(!OnProperty::new("mode").having_value("slow").matches(&cx));
        assert!(!OnProperty::new("missing").matches(&cx));
        assert!(OnProperty::new("missing").match_if_missing(true).matches(&cx));
    }

    #[test]
    fn profile_condition_requires_all() {
        let container = Container::new();
        let env = Environment::new();
        env.set_active_profiles(["dev", "local"]);
        let ctx = Context::background();
        let cx = ConditionContext::new(&ctx, &container, &env);

        assert!(OnProfile::new(["dev"]).matches(&cx));
        assert!(OnProfile::new(["dev", "local"]).matches(&cx));
        assert!(!OnProfile::new(["dev", "prod"]).matches(&cx));
    }

    #[test]
    fn cancelled_context_never_matches() {
        let container = container_with_memory();
        let env = Environment::new();
        let ctx = Context::background().with_cancel();
        ctx.cancel();
        let cx = ConditionContext::new(&ctx, &container, &env);

        assert!(!OnInstance::new("memory").matches(&cx));
        assert!(!OnMissingInstance::new("disk").matches(&cx));
        assert!(!OnProperty::new("missing").match_if_missing(true).matches(&cx));
    }
}
