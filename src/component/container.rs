//! The component container.
//!
//! # Responsibilities
//! - Hold definitions, singletons, custom scopes, processors and ambient
//!   resolvables, each behind its own lock
//! - Resolve instances by name, by type and as collections
//! - Wire constructor arguments and run the initialization pipeline
//! - Finalize singletons on close
//!
//! # Design Decisions
//! - Singletons are created through a per-name exclusive get-or-create;
//!   prototypes bypass every cache; custom scopes receive the prototype path
//!   as their factory
//! - Cycles are detected with the creation state carried by the [`Context`],
//!   so nested resolutions within one call share it and nothing global is
//!   locked; cycles split across concurrent calls are caught by the singleton
//!   registry's owner/waiter check
//! - No container lock is held while a constructor, processor or `Init` hook
//!   runs
//! - Collection candidates are ordered: pure singletons in registration
//!   order, then definitions in registration order

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use parking_lot::RwLock;

use crate::component::definition::{Arg, ArgValue, Args, Definition, ScopeName};
use crate::component::error::{BoxError, ContainerError};
use crate::component::processor::InstanceProcessor;
use crate::component::scope::{Scope, ScopeRegistry};
use crate::component::singleton::SingletonRegistry;
use crate::component::types::{
    downcast_erased, instance_type_id, Erased, Instance, TypeInfo, TypeKey,
};
use crate::context::Context;
use crate::observability::metrics;

type Producer = Arc<dyn Fn() -> Erased + Send + Sync>;

#[derive(Default)]
struct DefinitionTable {
    by_name: HashMap<String, Arc<Definition>>,
    order: Vec<String>,
}

/// Dependency-injection container.
#[derive(Default)]
pub struct Container {
    definitions: RwLock<DefinitionTable>,
    singletons: SingletonRegistry,
    scopes: ScopeRegistry,
    pre_processors: RwLock<Vec<Arc<dyn InstanceProcessor>>>,
    post_processors: RwLock<Vec<Arc<dyn InstanceProcessor>>>,
    resolvables: RwLock<HashMap<TypeId, Producer>>,
    closed: AtomicBool,
}

impl Container {
    pub fn new() -> Self {
        Self::default()
    }

    // ---- registration ----

    /// Register a definition. Fails if the name is taken.
    pub fn register_definition(
        &self,
        definition: impl Into<Arc<Definition>>,
    ) -> Result<(), ContainerError> {
        let definition = definition.into();
        let name = definition.name().to_string();

        let mut table = self.definitions.write();
        if table.by_name.contains_key(&name) {
            return Err(ContainerError::DefinitionAlreadyExists(name));
        }
        table.order.push(name.clone());
        table.by_name.insert(name.clone(), definition.clone());
        drop(table);

        tracing::debug!(
            name = %name,
            scope = %definition.scope(),
            out_type = %definition.out_type(),
            "Definition registered"
        );
        Ok(())
    }

    /// Register a ready-made singleton whose only type is `T`.
    pub fn register_singleton<T: Any + Send + Sync>(
        &self,
        name: &str,
        instance: Arc<T>,
    ) -> Result<(), ContainerError> {
        self.register_instance(name, instance, TypeInfo::of::<T>())
    }

    /// Register a ready-made singleton with an explicit type record, e.g. one
    /// declaring the interfaces it implements.
    pub fn register_instance(
        &self,
        name: &str,
        instance: Instance,
        type_info: TypeInfo,
    ) -> Result<(), ContainerError> {
        if instance_type_id(&instance) != type_info.concrete().id() {
            return Err(ContainerError::InvalidInstance(format!(
                "'{name}' is not a {}",
                type_info.concrete()
            )));
        }
        self.singletons.register(name, instance, Arc::new(type_info))?;
        tracing::debug!(name = %name, "Singleton registered");
        Ok(())
    }

    /// Pre-bind an ambient value used to satisfy by-type arguments of exactly
    /// type `T`, ahead of any registered component.
    pub fn register_resolvable<T>(&self, value: Arc<T>)
    where
        T: ?Sized + Send + Sync + 'static,
    {
        let producer: Producer = Arc::new(move || Box::new(value.clone()) as Erased);
        self.resolvables.write().insert(TypeId::of::<T>(), producer);
    }

    pub fn register_scope(&self, name: &str, scope: Arc<dyn Scope>) -> Result<(), ContainerError> {
        self.scopes.register(name, scope)
    }

    pub fn use_pre_processor(&self, processor: impl InstanceProcessor + 'static) {
        self.pre_processors.write().push(Arc::new(processor));
    }

    pub fn use_post_processor(&self, processor: impl InstanceProcessor + 'static) {
        self.post_processors.write().push(Arc::new(processor));
    }

    // ---- queries ----

    pub fn definition(&self, name: &str) -> Option<Arc<Definition>> {
        self.definitions.read().by_name.get(name).cloned()
    }

    pub fn contains_definition(&self, name: &str) -> bool {
        self.definitions.read().by_name.contains_key(name)
    }

    /// Definition names in registration order.
    pub fn definition_names(&self) -> Vec<String> {
        self.definitions.read().order.clone()
    }

    /// Definitions in registration order.
    pub fn definitions(&self) -> Vec<Arc<Definition>> {
        let table = self.definitions.read();
        table
            .order
            .iter()
            .filter_map(|name| table.by_name.get(name).cloned())
            .collect()
    }

    pub fn contains_singleton(&self, name: &str) -> bool {
        self.singletons.contains(name)
    }

    /// Singleton names in creation/registration order.
    pub fn singleton_names(&self) -> Vec<String> {
        self.singletons.names()
    }

    /// A singleton or a definition with this name exists.
    pub fn contains(&self, name: &str) -> bool {
        self.contains_singleton(name) || self.contains_definition(name)
    }

    /// Some singleton or definition produces a value assignable to the type.
    pub fn contains_type(&self, type_id: TypeId) -> bool {
        if !self.singletons.names_for(type_id).is_empty() {
            return true;
        }
        self.definitions
            .read()
            .by_name
            .values()
            .any(|def| def.type_info().is_assignable_to(type_id))
    }

    pub fn is_singleton(&self, name: &str) -> bool {
        match self.definition(name) {
            Some(def) => def.is_singleton(),
            None => self.contains_singleton(name),
        }
    }

    pub fn is_prototype(&self, name: &str) -> bool {
        self.definition(name).is_some_and(|def| def.is_prototype())
    }

    pub fn scope(&self, name: &str) -> Option<Arc<dyn Scope>> {
        self.scopes.get(name)
    }

    // ---- resolution ----

    /// Resolve the instance registered under `name`.
    pub fn resolve(&self, ctx: &Context, name: &str) -> Result<Instance, ContainerError> {
        self.resolve_named(ctx, name).map(|(instance, _)| instance)
    }

    /// Resolve `name` and view it as `T`.
    pub fn resolve_as<T: ?Sized + 'static>(
        &self,
        ctx: &Context,
        name: &str,
    ) -> Result<Arc<T>, ContainerError> {
        let key = TypeKey::of::<T>();
        let erased = self.resolve_named_as(ctx, name, key)?;
        typed(erased, name, key)
    }

    /// Resolve the unique instance assignable to `T`.
    pub fn resolve_type<T: ?Sized + 'static>(&self, ctx: &Context) -> Result<Arc<T>, ContainerError> {
        let key = TypeKey::of::<T>();
        let erased = self.resolve_by_type(ctx, key)?;
        typed(erased, key.name(), key)
    }

    /// Resolve every instance assignable to `T`: singletons without a
    /// definition first, then definitions, each in registration order.
    pub fn resolve_all<T: ?Sized + 'static>(
        &self,
        ctx: &Context,
    ) -> Result<Vec<Arc<T>>, ContainerError> {
        let key = TypeKey::of::<T>();
        self.resolve_all_erased(ctx, key)?
            .into_iter()
            .map(|erased| typed(erased, key.name(), key))
            .collect()
    }

    /// Eagerly create every singleton definition, in registration order.
    pub fn pre_instantiate_singletons(&self, ctx: &Context) -> Result<(), ContainerError> {
        for def in self.definitions() {
            if def.is_singleton() && !self.singletons.contains(def.name()) {
                self.resolve(ctx, def.name())?;
            }
        }
        Ok(())
    }

    /// Finalize singletons in reverse creation order and empty the registry.
    /// Finalizer errors are logged. Calling `close` again does nothing.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        let records = self.singletons.drain_reverse();
        let count = records.len();
        for record in records {
            if !record.type_info.has_finalize() {
                continue;
            }
            if let Err(e) = record.type_info.run_finalize(&record.instance) {
                tracing::warn!(name = %record.name, error = %e, "Finalizer failed");
            }
        }
        tracing::debug!(singletons = count, "Container closed");
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn resolve_named(
        &self,
        ctx: &Context,
        name: &str,
    ) -> Result<(Instance, Arc<TypeInfo>), ContainerError> {
        if let Some(record) = self.singletons.get(name) {
            return Ok((record.instance, record.type_info));
        }
        let def = self
            .definition(name)
            .ok_or_else(|| ContainerError::DefinitionNotFound(name.to_string()))?;

        let (ctx, state) = ctx.ensure_creation_state();
        let in_preparation = || ContainerError::InstanceInPreparation(name.to_string());

        let instance = match def.scope() {
            ScopeName::Singleton => {
                let _guard = state.enter(name).ok_or_else(in_preparation)?;
                let (instance, created) = self.singletons.get_or_create(name, state.id(), || {
                    self.create(&ctx, &def)
                        .map(|instance| (instance, def.type_info().clone()))
                })?;
                if !created {
                    tracing::trace!(name = %name, "Singleton created concurrently");
                }
                instance
            }
            ScopeName::Prototype => {
                let _guard = state.enter(name).ok_or_else(in_preparation)?;
                self.create(&ctx, &def)?
            }
            ScopeName::Custom(scope_name) => {
                let scope = self
                    .scopes
                    .get(scope_name)
                    .ok_or_else(|| ContainerError::ScopeNotFound(scope_name.clone()))?;
                let factory = || {
                    let _guard = state.enter(name).ok_or_else(in_preparation)?;
                    self.create(&ctx, &def)
                };
                scope.get(name, &factory)?
            }
        };
        Ok((instance, def.type_info().clone()))
    }

    fn resolve_named_as(
        &self,
        ctx: &Context,
        name: &str,
        key: TypeKey,
    ) -> Result<Erased, ContainerError> {
        let (instance, type_info) = self.resolve_named(ctx, name)?;
        type_info
            .cast(&instance, key.id())
            .ok_or_else(|| ContainerError::TypeMismatch {
                name: name.to_string(),
                type_name: key.name(),
            })
    }

    fn resolve_by_type(&self, ctx: &Context, key: TypeKey) -> Result<Erased, ContainerError> {
        if let Some(produce) = self.resolvables.read().get(&key.id()).cloned() {
            return Ok(produce());
        }
        let mut names = self.candidate_names(key.id());
        match names.len() {
            0 => Err(ContainerError::InstanceNotFound(key.name().to_string())),
            1 => {
                let name = names.remove(0);
                self.resolve_named_as(ctx, &name, key)
            }
            _ => Err(ContainerError::MultipleInstancesFound {
                type_name: key.name(),
                names,
            }),
        }
    }

    fn resolve_all_erased(&self, ctx: &Context, key: TypeKey) -> Result<Vec<Erased>, ContainerError> {
        let (ctx, state) = ctx.ensure_creation_state();
        self.candidate_names(key.id())
            .iter()
            .filter(|name| !state.contains(name))
            .map(|name| self.resolve_named_as(&ctx, name, key))
            .collect()
    }

    fn candidate_names(&self, type_id: TypeId) -> Vec<String> {
        let table = self.definitions.read();
        let mut names: Vec<String> = self
            .singletons
            .names_for(type_id)
            .into_iter()
            .filter(|name| !table.by_name.contains_key(name))
            .collect();
        names.extend(
            table
                .order
                .iter()
                .filter(|name| {
                    table
                        .by_name
                        .get(*name)
                        .is_some_and(|def| def.type_info().is_assignable_to(type_id))
                })
                .cloned(),
        );
        names
    }

    // ---- creation ----

    fn create(&self, ctx: &Context, def: &Definition) -> Result<Instance, ContainerError> {
        let started = Instant::now();
        let name = def.name();

        let args = self
            .resolve_args(ctx, def)
            .map_err(|e| e.creating(name))?;
        let instance = def
            .construct(&args)
            .map_err(|source| ContainerError::Constructor {
                name: name.to_string(),
                source,
            })?;
        let instance = self.initialize(ctx, name, def.type_info(), instance)?;

        metrics::record_component_creation(def.scope().as_str());
        tracing::debug!(
            name = %name,
            scope = %def.scope(),
            elapsed_us = started.elapsed().as_micros() as u64,
            "Component created"
        );
        Ok(instance)
    }

    fn resolve_args(&self, ctx: &Context, def: &Definition) -> Result<Args, ContainerError> {
        let mut values = Vec::with_capacity(def.args().len());
        for arg in def.args() {
            match self.resolve_arg(ctx, arg) {
                Ok(value) => values.push(value),
                Err(e) if arg.is_optional() => {
                    tracing::debug!(
                        name = %def.name(),
                        index = arg.index(),
                        error = %e,
                        "Optional argument left empty"
                    );
                    values.push(ArgValue::Missing);
                }
                Err(e) => return Err(e),
            }
        }
        Ok(Args::new(def.name(), values))
    }

    fn resolve_arg(&self, ctx: &Context, arg: &Arg) -> Result<ArgValue, ContainerError> {
        let key = arg.type_key();
        if arg.is_collection() {
            return self.resolve_all_erased(ctx, key).map(ArgValue::All);
        }
        match arg.name() {
            Some(name) => self.resolve_named_as(ctx, name, key).map(ArgValue::One),
            None => self.resolve_by_type(ctx, key).map(ArgValue::One),
        }
    }

    fn initialize(
        &self,
        ctx: &Context,
        name: &str,
        type_info: &TypeInfo,
        mut instance: Instance,
    ) -> Result<Instance, ContainerError> {
        let pre = self.pre_processors.read().clone();
        for processor in &pre {
            instance = apply(processor.as_ref(), ctx, name, type_info, instance)?;
        }

        type_info
            .run_init(&instance, ctx)
            .map_err(|source| ContainerError::Initializer {
                name: name.to_string(),
                source,
            })?;

        let post = self.post_processors.read().clone();
        for processor in &post {
            instance = apply(processor.as_ref(), ctx, name, type_info, instance)?;
        }
        Ok(instance)
    }
}

fn apply(
    processor: &dyn InstanceProcessor,
    ctx: &Context,
    name: &str,
    type_info: &TypeInfo,
    instance: Instance,
) -> Result<Instance, ContainerError> {
    let failed = |source: BoxError| ContainerError::Processor {
        name: name.to_string(),
        source,
    };
    match processor.process(ctx, name, instance) {
        Ok(Some(next)) if instance_type_id(&next) == type_info.concrete().id() => Ok(next),
        Ok(Some(_)) => Err(failed(
            format!("processor replaced the instance with a type other than {}", type_info.concrete()).into(),
        )),
        Ok(None) => Err(failed("processor returned no instance".into())),
        Err(source) => Err(failed(source)),
    }
}

fn typed<T: ?Sized + 'static>(
    erased: Erased,
    name: &str,
    key: TypeKey,
) -> Result<Arc<T>, ContainerError> {
    downcast_erased::<T>(erased).ok_or_else(|| ContainerError::TypeMismatch {
        name: name.to_string(),
        type_name: key.name(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::error::ErrorKind;
    use crate::component::scope::CachingScope;
    use crate::component::types::{Finalize, Init};
    use parking_lot::Mutex;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    trait Greeter: Send + Sync {
        fn greet(&self) -> String;
    }

    struct English;
    impl Greeter for English {
        fn greet(&self) -> String {
            "hello".into()
        }
    }

    struct French;
    impl Greeter for French {
        fn greet(&self) -> String {
            "bonjour".into()
        }
    }

    struct Counter(usize);

    fn english() -> Definition {
        Definition::builder::<English>("english")
            .implements::<dyn Greeter>(|it| it)
            .constructor(|_| Ok(English))
            .build()
            .unwrap()
    }

    fn french() -> Definition {
        Definition::builder::<French>("french")
            .implements::<dyn Greeter>(|it| it)
            .constructor(|_| Ok(French))
            .build()
            .unwrap()
    }

    #[test]
    fn duplicate_definition_is_rejected() {
        let container = Container::new();
        container.register_definition(english()).unwrap();
        let err = container.register_definition(english()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DefinitionAlreadyExists);
    }

    #[test]
    fn unknown_name_is_definition_not_found() {
        let container = Container::new();
        let err = container.resolve(&Context::background(), "ghost").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DefinitionNotFound);
    }

    #[test]
    fn resolve_type_requires_a_unique_candidate() {
        let container = Container::new();
        let ctx = Context::background();

        let err = container.resolve_type::<dyn Greeter>(&ctx).err().unwrap();
        assert_eq!(err.kind(), ErrorKind::InstanceNotFound);

        container.register_definition(english()).unwrap();
        assert_eq!(container.resolve_type::<dyn Greeter>(&ctx).unwrap().greet(), "hello");

        container.register_definition(french()).unwrap();
        match container.resolve_type::<dyn Greeter>(&ctx).err().unwrap() {
            ContainerError::MultipleInstancesFound { names, .. } => {
                assert_eq!(names, vec!["english", "french"]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn resolve_as_checks_assignability() {
        let container = Container::new();
        let ctx = Context::background();
        container.register_definition(english()).unwrap();

        assert_eq!(container.resolve_as::<dyn Greeter>(&ctx, "english").unwrap().greet(), "hello");
        let err = container.resolve_as::<French>(&ctx, "english").err().unwrap();
        assert_eq!(err.kind(), ErrorKind::TypeMismatch);
    }

    #[test]
    fn resolve_all_puts_pure_singletons_first() {
        let container = Container::new();
        let ctx = Context::background();
        container.register_definition(english()).unwrap();
        container
            .register_instance(
                "manual",
                Arc::new(French),
                TypeInfo::builder::<French>().implements::<dyn Greeter>(|it| it).build(),
            )
            .unwrap();
        container.register_definition(french()).unwrap();

        let greetings: Vec<String> = container
            .resolve_all::<dyn Greeter>(&ctx)
            .unwrap()
            .iter()
            .map(|g| g.greet())
            .collect();
        assert_eq!(greetings, vec!["bonjour", "hello", "bonjour"]);
    }

    #[test]
    fn register_instance_checks_concrete_type() {
        let container = Container::new();
        let err = container
            .register_instance("wrong", Arc::new(English), TypeInfo::of::<French>())
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInstance);
    }

    #[test]
    fn resolvable_takes_precedence_over_definitions() {
        let container = Container::new();
        let ctx = Context::background();
        container.register_definition(english()).unwrap();
        container.register_resolvable::<dyn Greeter>(Arc::new(French));

        assert_eq!(container.resolve_type::<dyn Greeter>(&ctx).unwrap().greet(), "bonjour");
    }

    #[test]
    fn optional_argument_becomes_missing() {
        struct Consumer(Option<Arc<dyn Greeter>>);
        let container = Container::new();
        container
            .register_definition(
                Definition::builder::<Consumer>("consumer")
                    .arg(Arg::of::<dyn Greeter>().optional())
                    .constructor(|args| Ok(Consumer(args.optional::<dyn Greeter>(0)?)))
                    .build()
                    .unwrap(),
            )
            .unwrap();

        let consumer = container
            .resolve_as::<Consumer>(&Context::background(), "consumer")
            .unwrap();
        assert!(consumer.0.is_none());
    }

    #[test]
    fn qualified_argument_resolves_by_name() {
        struct Consumer(Arc<dyn Greeter>);
        let container = Container::new();
        container.register_definition(english()).unwrap();
        container.register_definition(french()).unwrap();
        container
            .register_definition(
                Definition::builder::<Consumer>("consumer")
                    .arg(Arg::named::<dyn Greeter>("french"))
                    .constructor(|args| Ok(Consumer(args.get::<dyn Greeter>(0)?)))
                    .build()
                    .unwrap(),
            )
            .unwrap();

        let consumer = container
            .resolve_as::<Consumer>(&Context::background(), "consumer")
            .unwrap();
        assert_eq!(consumer.0.greet(), "bonjour");
    }

    #[test]
    fn constructor_error_is_wrapped_and_not_cached() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let seen = attempts.clone();
        let container = Container::new();
        container
            .register_definition(
                Definition::builder::<Counter>("flaky")
                    .constructor(move |_| {
                        seen.fetch_add(1, Ordering::SeqCst);
                        Err::<Counter, BoxError>("boom".into())
                    })
                    .build()
                    .unwrap(),
            )
            .unwrap();

        let ctx = Context::background();
        for _ in 0..2 {
            let err = container.resolve(&ctx, "flaky").unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Constructor);
        }
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
        assert!(!container.contains_singleton("flaky"));
    }

    #[test]
    fn cycle_split_across_threads_fails_instead_of_hanging() {
        struct Gate;
        struct Left;
        struct Right;

        let container = Arc::new(Container::new());
        container
            .register_definition(
                Definition::builder::<Gate>("gate")
                    .prototype()
                    .constructor(|_| {
                        std::thread::sleep(Duration::from_millis(100));
                        Ok(Gate)
                    })
                    .build()
                    .unwrap(),
            )
            .unwrap();
        container
            .register_definition(
                Definition::builder::<Left>("left")
                    .arg(Arg::of::<Gate>())
                    .arg(Arg::of::<Right>())
                    .constructor(|_| Ok(Left))
                    .build()
                    .unwrap(),
            )
            .unwrap();
        container
            .register_definition(
                Definition::builder::<Right>("right")
                    .arg(Arg::of::<Gate>())
                    .arg(Arg::of::<Left>())
                    .constructor(|_| Ok(Right))
                    .build()
                    .unwrap(),
            )
            .unwrap();

        let (tx, rx) = std::sync::mpsc::channel();
        for name in ["left", "right"] {
            let container = container.clone();
            let tx = tx.clone();
            std::thread::spawn(move || {
                let kind = container
                    .resolve(&Context::background(), name)
                    .err()
                    .map(|e| e.kind());
                let _ = tx.send((name, kind));
            });
        }
        drop(tx);

        for _ in 0..2 {
            let (name, kind) = rx
                .recv_timeout(Duration::from_secs(5))
                .expect("resolution did not return");
            assert_eq!(kind, Some(ErrorKind::InstanceInPreparation), "{name}");
        }
        assert!(!container.contains_singleton("left"));
        assert!(!container.contains_singleton("right"));
    }

    #[test]
    fn processors_run_around_init() {
        struct Tracked(Arc<Mutex<Vec<&'static str>>>);
        impl Init for Tracked {
            fn init(&self, _ctx: &Context) -> Result<(), BoxError> {
                self.0.lock().push("init");
                Ok(())
            }
        }

        let log = Arc::new(Mutex::new(Vec::new()));
        let container = Container::new();
        let pre_log = log.clone();
        container.use_pre_processor(move |_: &Context, _: &str, instance: Instance| -> Result<Option<Instance>, BoxError> {
            pre_log.lock().push("pre");
            Ok(Some(instance))
        });
        let post_log = log.clone();
        container.use_post_processor(move |_: &Context, _: &str, instance: Instance| -> Result<Option<Instance>, BoxError> {
            post_log.lock().push("post");
            Ok(Some(instance))
        });
        let shared = log.clone();
        container
            .register_definition(
                Definition::builder::<Tracked>("tracked")
                    .with_init()
                    .constructor(move |_| Ok(Tracked(shared.clone())))
                    .build()
                    .unwrap(),
            )
            .unwrap();

        container.resolve(&Context::background(), "tracked").unwrap();
        assert_eq!(*log.lock(), vec!["pre", "init", "post"]);
    }

    #[test]
    fn processor_returning_none_fails_creation() {
        let container = Container::new();
        container.use_pre_processor(|_: &Context, _: &str, _: Instance| -> Result<Option<Instance>, BoxError> {
            Ok(None)
        });
        container.register_definition(english()).unwrap();

        let err = container.resolve(&Context::background(), "english").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Processor);
        assert!(!container.contains_singleton("english"));
    }

    #[test]
    fn processor_must_keep_concrete_type() {
        let container = Container::new();
        container.use_post_processor(|_: &Context, _: &str, _: Instance| -> Result<Option<Instance>, BoxError> {
            Ok(Some(Arc::new(French) as Instance))
        });
        container.register_definition(english()).unwrap();

        let err = container.resolve(&Context::background(), "english").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Processor);
    }

    #[test]
    fn custom_scope_caches_per_scope() {
        let container = Container::new();
        let scope = Arc::new(CachingScope::new());
        container.register_scope("request", scope.clone()).unwrap();
        container
            .register_definition(
                Definition::builder::<Counter>("per-request")
                    .scope("request")
                    .constructor(|_| Ok(Counter(0)))
                    .build()
                    .unwrap(),
            )
            .unwrap();

        let ctx = Context::background();
        let first = container.resolve(&ctx, "per-request").unwrap();
        let second = container.resolve(&ctx, "per-request").unwrap();
        assert!(Arc::ptr_eq(&first, &second));

        scope.clear();
        let third = container.resolve(&ctx, "per-request").unwrap();
        assert!(!Arc::ptr_eq(&first, &third));
        assert!(!container.contains_singleton("per-request"));
    }

    #[test]
    fn unknown_scope_is_reported() {
        let container = Container::new();
        container
            .register_definition(
                Definition::builder::<Counter>("session-bound")
                    .scope("session")
                    .constructor(|_| Ok(Counter(0)))
                    .build()
                    .unwrap(),
            )
            .unwrap();

        let err = container.resolve(&Context::background(), "session-bound").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ScopeNotFound);
    }

    #[test]
    fn close_finalizes_in_reverse_creation_order() {
        struct Closing(&'static str, Arc<Mutex<Vec<&'static str>>>);
        impl Finalize for Closing {
            fn finalize(&self) -> Result<(), BoxError> {
                self.1.lock().push(self.0);
                if self.0 == "first" {
                    return Err("already closed".into());
                }
                Ok(())
            }
        }

        let log = Arc::new(Mutex::new(Vec::new()));
        let container = Container::new();
        for name in ["first", "second"] {
            let log = log.clone();
            container
                .register_definition(
                    Definition::builder::<Closing>(name)
                        .with_finalize()
                        .constructor(move |_| Ok(Closing(name, log.clone())))
                        .build()
                        .unwrap(),
                )
                .unwrap();
        }

        container.pre_instantiate_singletons(&Context::background()).unwrap();
        container.close();
        container.close();
        assert_eq!(*log.lock(), vec!["second", "first"]);
        assert!(container.singleton_names().is_empty());
        assert!(container.is_closed());
    }
}
