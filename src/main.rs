//! Procyon demo service.
//!
//! Wires a couple of components and endpoints through the runtime:
//!
//! ```text
//!   args / resources/procyon*.yml ──▶ Environment ──▶ ApplicationConfig
//!                                          │
//!   components ──▶ ConditionalLoader ──▶ Container ──▶ RouteConfigurer
//!                                                          │
//!   endpoints ───────────────────────────────────────▶ EndpointRegistry
//!                                                          │
//!   client ──▶ axum ──▶ Dispatcher ──▶ radix Router ──▶ handler
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use axum::http::StatusCode;
use clap::{Parser, Subcommand};
use serde::Serialize;

use procyon::component::{Arg, BoxError, Component, Definition, Init, OnProperty};
use procyon::config::ConfigResolver;
use procyon::env::Environment;
use procyon::http::{Endpoint, EndpointRegistry, RouteConfigurer};
use procyon::routing::RouteError;
use procyon::{Application, Context};

#[derive(Parser)]
#[command(name = "procyon")]
#[command(about = "Procyon application runtime demo", long_about = None)]
struct Cli {
    /// Comma-separated config directories
    #[arg(short, long)]
    config_location: Option<String>,

    /// Active profiles
    #[arg(short, long)]
    profile: Vec<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server (default)
    Serve {
        /// Extra `--key=value` properties
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },
    /// Print the mounted routes and exit
    Routes,
}

struct GreetingService {
    greeting: String,
    served: AtomicU64,
}

impl GreetingService {
    fn greet(&self, name: &str) -> String {
        self.served.fetch_add(1, Ordering::Relaxed);
        format!("{}, {}!", self.greeting, name)
    }
}

impl Init for GreetingService {
    fn init(&self, _ctx: &Context) -> Result<(), BoxError> {
        tracing::info!(greeting = %self.greeting, "Greeting service ready");
        Ok(())
    }
}

struct GreetingRoutes {
    service: Arc<GreetingService>,
}

impl RouteConfigurer for GreetingRoutes {
    fn configure(&self, registry: &EndpointRegistry) -> Result<(), RouteError> {
        let service = Arc::clone(&self.service);
        registry.register(
            Endpoint::builder("/hello/{name}")
                .tag("greeting")
                .handler(move |ctx| {
                    let service = Arc::clone(&service);
                    Box::pin(async move {
                        let message = service.greet(ctx.param("name").unwrap_or("stranger"));
                        ctx.text(StatusCode::OK, message);
                        Ok(())
                    })
                })
                .build()?,
        )?;
        Ok(())
    }
}

fn components() -> Result<Vec<Component>, BoxError> {
    let service = Definition::builder::<GreetingService>("greetingService")
        .arg(Arg::of::<Environment>())
        .with_init()
        .constructor(|args| {
            let env = args.get::<Environment>(0)?;
            Ok(GreetingService {
                greeting: env.property("greeting.prefix").unwrap_or_else(|| "Hello".to_string()),
                served: AtomicU64::new(0),
            })
        })
        .build()?;

    let routes = Definition::builder::<GreetingRoutes>("greetingRoutes")
        .arg(Arg::named::<GreetingService>("greetingService"))
        .implements::<dyn RouteConfigurer>(|it| it)
        .constructor(|args| {
            Ok(GreetingRoutes {
                service: args.get::<GreetingService>(0)?,
            })
        })
        .build()?;

    Ok(vec![
        Component::new(service),
        Component::new(routes).when(OnProperty::new("greeting.enabled").match_if_missing(true)),
    ])
}

#[derive(Serialize)]
struct Health {
    status: &'static str,
}

fn endpoints() -> Result<Vec<Endpoint>, RouteError> {
    let health = Endpoint::builder("/health")
        .tag("ops")
        .handler(|ctx| {
            Box::pin(async move {
                ctx.json_response(StatusCode::OK, &Health { status: "UP" })?;
                Ok(())
            })
        })
        .build()?;

    let assets = Endpoint::builder("/static/**")
        .middleware(|ctx, next| {
            Box::pin(async move {
                if ctx.param("**").is_some_and(|rest| rest.split('/').any(|s| s == "..")) {
                    ctx.abort_with_status(StatusCode::BAD_REQUEST);
                    return Ok(());
                }
                next.run(ctx).await
            })
        })
        .handler(|ctx| {
            Box::pin(async move {
                let file = ctx.param("**").unwrap_or_default().to_string();
                ctx.set_header("cache-control", "no-cache")?;
                ctx.text(StatusCode::OK, format!("asset: /{file}"));
                Ok(())
            })
        })
        .build()?;

    Ok(vec![health, assets])
}

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    let cli = Cli::parse();

    let mut resolver = ConfigResolver::new();
    if let Some(locations) = &cli.config_location {
        resolver = resolver.with_locations(locations.split(',').map(str::trim));
    }

    let (args, list_only) = match cli.command {
        Some(Commands::Serve { args }) => (args, false),
        Some(Commands::Routes) => (Vec::new(), true),
        None => (Vec::new(), false),
    };

    let mut builder = Application::builder()
        .name("procyon-demo")
        .args(args)
        .profiles(cli.profile)
        .config_resolver(resolver)
        .components(components()?)
        .with_global_components(true);
    for endpoint in endpoints()? {
        builder = builder.endpoint(endpoint);
    }
    let app = builder.build();

    let ctx = Context::background();
    let refreshed = app.refresh(&ctx)?;

    if list_only {
        for endpoint in refreshed.endpoints().endpoints() {
            println!("{:<24} {}", endpoint.methods().join(","), endpoint.pattern());
        }
        refreshed.close();
        return Ok(());
    }

    tracing::info!(
        address = %refreshed.config().server.bind_address(),
        routes = refreshed.dispatcher().route_count(),
        "Starting procyon-demo"
    );
    refreshed.run(&ctx).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use procyon::application::ApplicationBuilder;

    fn demo_builder(args: &[&str]) -> ApplicationBuilder {
        Application::builder()
            .name("procyon-demo-test")
            .config_resolver(ConfigResolver::new().with_locations(["./does-not-exist"]))
            .args(args.iter().map(|a| a.to_string()))
            .with_system_environment(false)
            .with_logging(false)
            .with_signal_handling(false)
            .components(components().unwrap())
    }

    fn patterns(app: &procyon::ApplicationContext) -> Vec<String> {
        app.endpoints()
            .endpoints()
            .iter()
            .map(|e| e.pattern().to_string())
            .collect()
    }

    #[test]
    fn greeting_components_are_wired() {
        let app = demo_builder(&["--greeting.prefix=Hi"])
            .build()
            .refresh(&Context::background())
            .unwrap();

        let service = app
            .container()
            .resolve_as::<GreetingService>(&Context::background(), "greetingService")
            .unwrap();
        assert_eq!(service.greet("ada"), "Hi, ada!");
        assert!(patterns(&app).iter().any(|p| p == "/hello/{name}"));
        app.close();
    }

    #[test]
    fn greeting_routes_follow_the_enabled_flag() {
        let app = demo_builder(&["--greeting.enabled=false"])
            .build()
            .refresh(&Context::background())
            .unwrap();

        assert!(app.container().contains("greetingService"));
        assert!(!app.container().contains("greetingRoutes"));
        assert!(!patterns(&app).iter().any(|p| p.starts_with("/hello")));
        app.close();
    }
}
