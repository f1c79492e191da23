//! Application bootstrap.
//!
//! # Responsibilities
//! - Collect components, endpoints, listeners and config settings
//! - Drive startup: environment, config files, container, endpoints
//! - Serve HTTP until shutdown, then close the container
//!
//! # Data Flow
//! ```text
//! Application::builder() ... build()
//!     → refresh()
//!         Starting
//!         → command line + defaults + config files → Environment
//!         → bind + validate ApplicationConfig, init logging
//!         EnvironmentPrepared
//!         → Container + ambient resolvables
//!         ContextPrepared
//!         → ConditionalLoader → pre-instantiate singletons
//!         → endpoints + RouteConfigurer components → Dispatcher
//!         ContextLoaded
//!     → ApplicationContext::run() / start(listener)
//!         Started → Ready → serve → shutdown → close
//! ```
//!
//! # Design Decisions
//! - Any startup error moves the lifecycle to `Failed` before it is returned
//! - The global component registry is opt-in; explicit registration on the
//!   builder is the primary path
//! - The container is not registered as a resolvable of itself

use std::net::SocketAddr;
use std::sync::Arc;

use thiserror::Error;
use tokio::net::TcpListener;

use crate::component::{registered_components, Component, ConditionalLoader, Container, ContainerError};
use crate::config::{validate_config, ApplicationConfig, ConfigError, ConfigResolver};
use crate::context::Context;
use crate::env::{CommandLinePropertySource, EnvError, Environment, MapPropertySource, SystemEnvironmentPropertySource};
use crate::http::{Dispatcher, Endpoint, EndpointRegistry, HttpServer, RouteConfigurer};
use crate::lifecycle::{signals, EventBroadcaster, LifecycleError, Phase, Shutdown, StartupListener, StartupMachine};
use crate::observability;
use crate::routing::RouteError;

/// Name of the source holding properties set on the builder.
pub const DEFAULT_PROPERTIES_SOURCE_NAME: &str = "defaultProperties";

pub const DEFAULT_APPLICATION_NAME: &str = "application";

#[derive(Debug, Error)]
pub enum ApplicationError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Environment(#[from] EnvError),

    #[error(transparent)]
    Container(#[from] ContainerError),

    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),

    #[error(transparent)]
    Route(#[from] RouteError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub struct Application {
    name: String,
    args: Vec<String>,
    components: Vec<Component>,
    endpoints: Vec<Endpoint>,
    configurers: Vec<Arc<dyn RouteConfigurer>>,
    broadcaster: EventBroadcaster,
    resolver: ConfigResolver,
    properties: Vec<(String, String)>,
    profiles: Vec<String>,
    global_components: bool,
    system_environment: bool,
    init_logging: bool,
    handle_signals: bool,
}

impl Application {
    pub fn builder() -> ApplicationBuilder {
        ApplicationBuilder {
            app: Application {
                name: DEFAULT_APPLICATION_NAME.to_string(),
                args: Vec::new(),
                components: Vec::new(),
                endpoints: Vec::new(),
                configurers: Vec::new(),
                broadcaster: EventBroadcaster::new(),
                resolver: ConfigResolver::default(),
                properties: Vec::new(),
                profiles: Vec::new(),
                global_components: false,
                system_environment: false,
                init_logging: true,
                handle_signals: true,
            },
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Run startup up to `ContextLoaded`.
    pub fn refresh(self, ctx: &Context) -> Result<ApplicationContext, ApplicationError> {
        let mut machine = StartupMachine::new(&self.name, &self.args, self.broadcaster.clone());
        match self.prepare(ctx, &mut machine) {
            Ok(parts) => Ok(ApplicationContext::new(parts, machine)),
            Err(e) => {
                machine.fail(ctx, &e);
                Err(e)
            }
        }
    }

    /// Refresh, bind `server.address:server.port` and serve until shutdown.
    pub async fn run(self, ctx: &Context) -> Result<(), ApplicationError> {
        self.refresh(ctx)?.run(ctx).await
    }

    fn prepare(self, ctx: &Context, machine: &mut StartupMachine) -> Result<Parts, ApplicationError> {
        machine.advance(ctx, Phase::Starting)?;

        let environment = Arc::new(self.prepare_environment()?);
        let config = ApplicationConfig::bind(&environment)?;
        validate_config(&config).map_err(ConfigError::Validation)?;
        if self.init_logging && observability::init_logging(&config.logging) {
            tracing::debug!(level = %config.logging.level, "Logging initialized");
        }
        let config = Arc::new(config);
        machine.set_environment(Arc::clone(&environment));
        machine.advance(ctx, Phase::EnvironmentPrepared)?;

        let container = Arc::new(Container::new());
        let endpoints = Arc::new(EndpointRegistry::new());
        let shutdown = Arc::new(Shutdown::new());
        container.register_resolvable(Arc::clone(&environment));
        container.register_resolvable(Arc::clone(&endpoints));
        container.register_resolvable(Arc::clone(&config));
        container.register_resolvable(Arc::clone(&shutdown));
        machine.set_container(Arc::clone(&container));
        machine.advance(ctx, Phase::ContextPrepared)?;

        let mut components = self.components;
        if self.global_components {
            components.extend(registered_components());
        }
        let report = ConditionalLoader::new(&container, &environment).load(ctx, &components)?;
        tracing::info!(
            registered = report.registered.len(),
            skipped = report.skipped.len(),
            passes = report.passes,
            "Components loaded"
        );
        container.pre_instantiate_singletons(ctx)?;

        for endpoint in self.endpoints {
            endpoints.register(endpoint)?;
        }
        for configurer in &self.configurers {
            configurer.configure(&endpoints)?;
        }
        for configurer in container.resolve_all::<dyn RouteConfigurer>(ctx)? {
            configurer.configure(&endpoints)?;
        }
        let dispatcher = Arc::new(Dispatcher::new(&endpoints)?.with_root_context(ctx.with_cancel()));
        machine.advance(ctx, Phase::ContextLoaded)?;

        Ok(Parts {
            container,
            environment,
            endpoints,
            dispatcher,
            config,
            shutdown,
            handle_signals: self.handle_signals,
        })
    }

    fn prepare_environment(&self) -> Result<Environment, ApplicationError> {
        let environment = Environment::new();
        let sources = environment.property_sources();
        if !self.args.is_empty() {
            sources.add_last(CommandLinePropertySource::parse(&self.args));
        }
        if self.system_environment {
            sources.add_last(SystemEnvironmentPropertySource::new());
        }
        if !self.properties.is_empty() {
            sources.add_last(MapPropertySource::from_pairs(
                DEFAULT_PROPERTIES_SOURCE_NAME,
                self.properties.iter().cloned(),
            ));
        }
        if !self.profiles.is_empty() {
            environment.set_active_profiles(self.profiles.iter());
        }

        let loaded = self.resolver.load_into(&environment)?;
        tracing::info!(
            app = %self.name,
            profiles = ?environment.active_profiles(),
            config_sources = loaded.len(),
            "Environment prepared"
        );
        Ok(environment)
    }
}

pub struct ApplicationBuilder {
    app: Application,
}

impl ApplicationBuilder {
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.app.name = name.into();
        self
    }

    /// Command-line arguments, without the program name.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.app.args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn component(mut self, component: impl Into<Component>) -> Self {
        self.app.components.push(component.into());
        self
    }

    pub fn components<I, C>(mut self, components: I) -> Self
    where
        I: IntoIterator<Item = C>,
        C: Into<Component>,
    {
        self.app.components.extend(components.into_iter().map(Into::into));
        self
    }

    pub fn endpoint(mut self, endpoint: Endpoint) -> Self {
        self.app.endpoints.push(endpoint);
        self
    }

    pub fn route_configurer(mut self, configurer: Arc<dyn RouteConfigurer>) -> Self {
        self.app.configurers.push(configurer);
        self
    }

    pub fn listener(mut self, listener: impl StartupListener + 'static) -> Self {
        self.app.broadcaster.subscribe(listener);
        self
    }

    pub fn listener_for(mut self, phase: Phase, listener: impl StartupListener + 'static) -> Self {
        self.app.broadcaster.subscribe_to(phase, listener);
        self
    }

    pub fn config_resolver(mut self, resolver: ConfigResolver) -> Self {
        self.app.resolver = resolver;
        self
    }

    /// Lowest-precedence property, overridden by config files and arguments.
    pub fn property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.app.properties.push((key.into(), value.into()));
        self
    }

    pub fn profiles<I, S>(mut self, profiles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.app.profiles = profiles.into_iter().map(Into::into).collect();
        self
    }

    /// Also load components from the process-wide registry.
    pub fn with_global_components(mut self, enabled: bool) -> Self {
        self.app.global_components = enabled;
        self
    }

    /// Expose process environment variables as properties.
    pub fn with_system_environment(mut self, enabled: bool) -> Self {
        self.app.system_environment = enabled;
        self
    }

    pub fn with_logging(mut self, enabled: bool) -> Self {
        self.app.init_logging = enabled;
        self
    }

    /// Trigger shutdown on Ctrl-C / SIGTERM while serving.
    pub fn with_signal_handling(mut self, enabled: bool) -> Self {
        self.app.handle_signals = enabled;
        self
    }

    pub fn build(self) -> Application {
        self.app
    }
}

struct Parts {
    container: Arc<Container>,
    environment: Arc<Environment>,
    endpoints: Arc<EndpointRegistry>,
    dispatcher: Arc<Dispatcher>,
    config: Arc<ApplicationConfig>,
    shutdown: Arc<Shutdown>,
    handle_signals: bool,
}

/// A refreshed application, ready to serve.
pub struct ApplicationContext {
    parts: Parts,
    machine: StartupMachine,
}

impl ApplicationContext {
    fn new(parts: Parts, machine: StartupMachine) -> Self {
        Self { parts, machine }
    }

    pub fn container(&self) -> &Arc<Container> {
        &self.parts.container
    }

    pub fn environment(&self) -> &Arc<Environment> {
        &self.parts.environment
    }

    pub fn endpoints(&self) -> &Arc<EndpointRegistry> {
        &self.parts.endpoints
    }

    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.parts.dispatcher
    }

    pub fn config(&self) -> &Arc<ApplicationConfig> {
        &self.parts.config
    }

    pub fn shutdown(&self) -> &Arc<Shutdown> {
        &self.parts.shutdown
    }

    pub fn phase(&self) -> Option<Phase> {
        self.machine.phase()
    }

    /// Rebuild the router after endpoints were added to the registry.
    pub fn reload_routes(&self) -> Result<(), RouteError> {
        self.parts.dispatcher.reload(&self.parts.endpoints)
    }

    /// Bind the configured address and serve until shutdown.
    pub async fn run(mut self, ctx: &Context) -> Result<(), ApplicationError> {
        let addr = self.parts.config.server.bind_address();
        let listener = match TcpListener::bind(&addr).await {
            Ok(listener) => listener,
            Err(e) => {
                tracing::error!(address = %addr, error = %e, "Failed to bind listener");
                let error = ApplicationError::Io(e);
                self.machine.fail(ctx, &error);
                self.close();
                return Err(error);
            }
        };
        self.start(ctx, listener).await
    }

    /// Serve on `listener` until shutdown. Emits `Started` and `Ready`.
    pub async fn start(mut self, ctx: &Context, listener: TcpListener) -> Result<(), ApplicationError> {
        let metrics = &self.parts.config.metrics;
        if metrics.enabled {
            match metrics.address.parse::<SocketAddr>() {
                Ok(addr) => observability::init_metrics(addr),
                Err(e) => tracing::error!(address = %metrics.address, error = %e, "Invalid metrics address"),
            }
        }

        if let Err(e) = self.announce(ctx) {
            self.close();
            return Err(e.into());
        }

        let signal_watcher = self
            .parts
            .handle_signals
            .then(|| signals::watch_signals(Arc::clone(&self.parts.shutdown)));

        let server = HttpServer::new(Arc::clone(&self.parts.dispatcher), self.parts.config.server.clone());
        let served = server.run(listener, Arc::clone(&self.parts.shutdown)).await;

        if let Some(watcher) = signal_watcher {
            watcher.abort();
        }
        self.close();
        served.map_err(ApplicationError::from)
    }

    fn announce(&mut self, ctx: &Context) -> Result<(), LifecycleError> {
        self.machine.advance(ctx, Phase::Started)?;
        self.machine.advance(ctx, Phase::Ready)
    }

    /// Trigger shutdown and finalize singletons. Idempotent.
    pub fn close(&self) {
        self.parts.shutdown.trigger();
        self.parts.dispatcher.cancel_all();
        self.parts.container.close();
    }
}

impl std::fmt::Debug for ApplicationContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApplicationContext")
            .field("phase", &self.machine.phase())
            .field("dispatcher", &self.parts.dispatcher)
            .finish_non_exhaustive()
    }
}
