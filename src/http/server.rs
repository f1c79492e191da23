//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the axum `Router` that hands every request to the dispatcher
//! - Wire up middleware (request timeout, tracing)
//! - Serve on a listener until shutdown, draining in-flight requests
//!
//! # Design Decisions
//! - axum only provides HTTP/1.1 and HTTP/2 framing; route matching is done
//!   by the dispatcher's own router
//! - Shutdown is driven by the `Shutdown` broadcast so the application and
//!   OS signals use the same path

use std::sync::Arc;
use std::time::Duration;

use axum::{body::Body, extract::State, http::Request, response::Response, routing::any, Router};
use tokio::net::TcpListener;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::config::ServerConfig;
use crate::http::dispatcher::Dispatcher;
use crate::lifecycle::Shutdown;

/// State injected into the catch-all handler.
#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Arc<Dispatcher>,
    pub max_body_size: usize,
}

pub struct HttpServer {
    router: Router,
    config: ServerConfig,
    dispatcher: Arc<Dispatcher>,
}

impl HttpServer {
    pub fn new(dispatcher: Arc<Dispatcher>, config: ServerConfig) -> Self {
        let state = AppState {
            dispatcher: Arc::clone(&dispatcher),
            max_body_size: config.max_body_size,
        };
        let router = Self::build_router(&config, state);
        Self {
            router,
            config,
            dispatcher,
        }
    }

    /// Build the axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &ServerConfig, state: AppState) -> Router {
        Router::new()
            .route("/", any(dispatch_handler))
            .route("/{*path}", any(dispatch_handler))
            .with_state(state)
            .layer(TimeoutLayer::new(Duration::from_secs(config.request_timeout_secs)))
            .layer(TraceLayer::new_for_http())
    }

    /// Run until `shutdown` fires, then stop accepting and drain.
    pub async fn run(self, listener: TcpListener, shutdown: Arc<Shutdown>) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let dispatcher = Arc::clone(&self.dispatcher);
        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move { shutdown.wait().await })
            .await?;

        dispatcher.cancel_all();
        tracing::info!("HTTP server stopped");
        Ok(())
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }
}

async fn dispatch_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    state.dispatcher.dispatch(request, state.max_body_size).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::endpoint::{Endpoint, EndpointRegistry};
    use axum::body::to_bytes;
    use axum::http::StatusCode;
    use tower::ServiceExt;

    fn server() -> HttpServer {
        let registry = EndpointRegistry::new();
        registry
            .register(
                Endpoint::builder("/")
                    .handler(|ctx| {
                        Box::pin(async move {
                            ctx.text(StatusCode::OK, "root");
                            Ok(())
                        })
                    })
                    .build()
                    .unwrap(),
            )
            .unwrap();
        registry
            .register(
                Endpoint::builder("/items/{id}")
                    .method("PATCH")
                    .handler(|ctx| {
                        Box::pin(async move {
                            let id = ctx.param("id").unwrap_or_default().to_string();
                            ctx.text(StatusCode::ACCEPTED, id);
                            Ok(())
                        })
                    })
                    .build()
                    .unwrap(),
            )
            .unwrap();
        let dispatcher = Arc::new(Dispatcher::new(&registry).unwrap());
        HttpServer::new(dispatcher, ServerConfig::default())
    }

    async fn call(server: &HttpServer, method: &str, uri: &str) -> (StatusCode, String) {
        let request = Request::builder().method(method).uri(uri).body(Body::empty()).unwrap();
        let response = server.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8_lossy(&body).into_owned())
    }

    #[tokio::test]
    async fn every_path_reaches_the_dispatcher() {
        let server = server();
        assert_eq!(call(&server, "GET", "/").await, (StatusCode::OK, "root".to_string()));
        assert_eq!(
            call(&server, "PATCH", "/items/42").await,
            (StatusCode::ACCEPTED, "42".to_string())
        );
        assert_eq!(call(&server, "GET", "/items/42").await.0, StatusCode::NOT_FOUND);
    }
}
