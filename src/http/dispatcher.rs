//! Request dispatcher.
//!
//! # Responsibilities
//! - Take a context from the pool and fill it from the incoming request
//! - Match the route, run the endpoint chain or the not-found handler
//! - Turn handler errors into responses (a `DispatchError` keeps its own
//!   status, anything else is a 500), record metrics, recycle the context
//!
//! # Design Decisions
//! - The compiled router sits behind `ArcSwap`: `reload` swaps it whole and
//!   in-flight requests finish on the tree they started with
//! - Each request runs inside a `request` span carrying its request id
//! - A panicking handler is caught and answered like any other handler error
//! - Request contexts derive from a root context that is cancelled at
//!   shutdown

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

use arc_swap::ArcSwap;
use axum::body::Body;
use axum::http::header::HeaderValue;
use axum::http::{Request, StatusCode};
use axum::response::Response;
use futures_util::FutureExt;
use tracing::Instrument;

use crate::component::BoxError;
use crate::context::Context;
use crate::http::context::{ContextPool, RequestContext, DEFAULT_POOL_CAPACITY};
use crate::http::endpoint::{Endpoint, EndpointRegistry};
use crate::http::error::DispatchError;
use crate::http::handler::{handler_fn, Handler};
use crate::http::request::{request_id, X_REQUEST_ID};
use crate::observability::metrics;
use crate::routing::{RouteError, Router};

/// Route label for requests that matched nothing.
const UNMATCHED_ROUTE: &str = "none";

pub struct Dispatcher {
    router: ArcSwap<Router<Arc<Endpoint>>>,
    pool: ContextPool,
    not_found: Arc<dyn Handler>,
    root: Context,
}

impl Dispatcher {
    pub fn new(registry: &EndpointRegistry) -> Result<Self, RouteError> {
        let router = registry.build_router()?;
        tracing::info!(routes = router.len(), "Router compiled");
        Ok(Self {
            router: ArcSwap::from_pointee(router),
            pool: ContextPool::new(DEFAULT_POOL_CAPACITY),
            not_found: default_not_found(),
            root: Context::background().with_cancel(),
        })
    }

    pub fn with_not_found(mut self, handler: Arc<dyn Handler>) -> Self {
        self.not_found = handler;
        self
    }

    pub fn with_pool_capacity(mut self, capacity: usize) -> Self {
        self.pool = ContextPool::new(capacity);
        self
    }

    /// Derive request contexts from `root` instead of a fresh background.
    pub fn with_root_context(mut self, root: Context) -> Self {
        self.root = root;
        self
    }

    /// Rebuild the router from `registry` and swap it in. On error the
    /// current router stays.
    pub fn reload(&self, registry: &EndpointRegistry) -> Result<(), RouteError> {
        let router = registry.build_router()?;
        tracing::info!(routes = router.len(), "Router reloaded");
        self.router.store(Arc::new(router));
        Ok(())
    }

    pub fn route_count(&self) -> usize {
        self.router.load().len()
    }

    pub fn pool(&self) -> &ContextPool {
        &self.pool
    }

    /// Cancel every in-flight request context.
    pub fn cancel_all(&self) {
        self.root.cancel();
    }

    /// Serve one HTTP request, reading at most `max_body` bytes of body.
    pub async fn dispatch(&self, request: Request<Body>, max_body: usize) -> Response {
        let started = Instant::now();
        let (parts, body) = request.into_parts();
        let id = request_id(&parts.headers);
        let span = tracing::debug_span!(
            "request",
            request_id = %id,
            method = %parts.method,
            path = %parts.uri.path()
        );

        async move {
            let mut ctx = self.pool.acquire();
            ctx.prepare(
                self.root.with_cancel(),
                parts.method,
                parts.uri.path(),
                parts.uri.query(),
                parts.headers,
            );
            ctx.set_request_id(id);

            match axum::body::to_bytes(body, max_body).await {
                Ok(bytes) => {
                    ctx.set_body(bytes);
                    self.serve(&mut ctx).await;
                }
                Err(e) => {
                    let error = body_error(e, max_body);
                    tracing::debug!(error = %error, "Rejected request body");
                    ctx.text(error.status(), error.to_string());
                }
            }

            let route = ctx
                .endpoint()
                .map(|e| e.pattern().to_string())
                .unwrap_or_else(|| UNMATCHED_ROUTE.to_string());
            let method = ctx.method().as_str().to_string();
            let mut response = ctx.response_mut().take_response();
            if let Ok(value) = HeaderValue::from_str(ctx.request_id()) {
                response.headers_mut().insert(X_REQUEST_ID, value);
            }
            let status = response.status();
            self.pool.release(ctx);

            metrics::record_request(&method, status.as_u16(), &route, started);
            tracing::debug!(
                status = status.as_u16(),
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Request completed"
            );
            response
        }
        .instrument(span)
        .await
    }

    /// Route an already prepared context and run its chain. The response is
    /// left staged in the context.
    pub async fn serve(&self, ctx: &mut RequestContext) {
        let hit = {
            let router = self.router.load();
            router
                .lookup(ctx.method().as_str(), ctx.path())
                .map(|m| (Arc::clone(m.value()), *m.spans()))
        };

        let chain = async {
            match hit {
                Some((endpoint, params)) => {
                    ctx.set_route(Arc::clone(&endpoint), params);
                    endpoint.invoke(ctx).await
                }
                None => self.not_found.call(ctx).await,
            }
        };
        let result = AssertUnwindSafe(chain)
            .catch_unwind()
            .await
            .unwrap_or_else(|panic| Err(panic_error(panic.as_ref())));

        if let Err(e) = result {
            if ctx.response_mut().discard() {
                tracing::warn!(error = %e, "Handler failed");
                let status = e
                    .downcast_ref::<DispatchError>()
                    .map_or(StatusCode::INTERNAL_SERVER_ERROR, DispatchError::status);
                ctx.text(status, e.to_string());
            } else {
                tracing::warn!(error = %e, "Handler failed after the response was committed");
            }
        } else if !ctx.response().is_committed() {
            ctx.response_mut().commit();
        }
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("routes", &self.route_count())
            .field("idle_contexts", &self.pool.idle())
            .finish()
    }
}

fn default_not_found() -> Arc<dyn Handler> {
    handler_fn(|ctx| {
        Box::pin(async move {
            ctx.text(StatusCode::NOT_FOUND, "Not Found");
            Ok(())
        })
    })
}

fn panic_error(payload: &(dyn Any + Send)) -> BoxError {
    let message = payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic payload");
    tracing::error!(panic = %message, "Handler panicked");
    BoxError::from(format!("handler panicked: {message}"))
}

fn body_error(error: axum::Error, limit: usize) -> DispatchError {
    let mut cause: Option<&(dyn std::error::Error + 'static)> = Some(&error);
    while let Some(e) = cause {
        if e.to_string().contains("length limit") {
            return DispatchError::BodyTooLarge { limit };
        }
        cause = e.source();
    }
    DispatchError::BodyRead(error.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::handler::HandlerResult;
    use axum::http::{HeaderMap, Method};

    fn registry() -> EndpointRegistry {
        let registry = EndpointRegistry::new();
        let hello = Endpoint::builder("/hello/{name}")
            .handler(|ctx| {
                Box::pin(async move {
                    let greeting = format!("hello {}", ctx.param("name").unwrap_or("?"));
                    ctx.text(StatusCode::OK, greeting);
                    Ok(())
                })
            })
            .build()
            .unwrap();
        let fails = Endpoint::builder("/fail")
            .handler(|_ctx| Box::pin(async { Err(BoxError::from("boom")) }))
            .build()
            .unwrap();
        registry.register(hello).unwrap();
        registry.register(fails).unwrap();
        registry
    }

    async fn serve(dispatcher: &Dispatcher, method: Method, path: &str) -> (StatusCode, String) {
        let mut ctx = RequestContext::new();
        ctx.prepare(Context::background(), method, path, None, HeaderMap::new());
        dispatcher.serve(&mut ctx).await;
        let body = String::from_utf8_lossy(ctx.response().body()).into_owned();
        (ctx.response().status(), body)
    }

    #[tokio::test]
    async fn routes_to_handler() {
        let dispatcher = Dispatcher::new(&registry()).unwrap();
        assert_eq!(
            serve(&dispatcher, Method::GET, "/hello/ada").await,
            (StatusCode::OK, "hello ada".to_string())
        );
        assert_eq!(serve(&dispatcher, Method::POST, "/hello/ada").await.0, StatusCode::NOT_FOUND);
        assert_eq!(serve(&dispatcher, Method::GET, "/nowhere").await.0, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn handler_error_becomes_500() {
        let dispatcher = Dispatcher::new(&registry()).unwrap();
        assert_eq!(
            serve(&dispatcher, Method::GET, "/fail").await,
            (StatusCode::INTERNAL_SERVER_ERROR, "boom".to_string())
        );
    }

    fn explode() -> HandlerResult {
        panic!("kaboom")
    }

    #[tokio::test]
    async fn panics_and_dispatch_errors_are_answered() {
        let registry = EndpointRegistry::new();
        let panics = Endpoint::builder("/panic")
            .handler(|_ctx| Box::pin(async { explode() }))
            .build()
            .unwrap();
        let bad_json = Endpoint::builder("/json")
            .handler(|ctx| {
                Box::pin(async move {
                    let _: serde_json::Value = ctx.json()?;
                    Ok(())
                })
            })
            .build()
            .unwrap();
        registry.register(panics).unwrap();
        registry.register(bad_json).unwrap();
        let dispatcher = Dispatcher::new(&registry).unwrap();

        let (status, body) = serve(&dispatcher, Method::GET, "/panic").await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body.contains("kaboom"), "{body}");

        assert_eq!(serve(&dispatcher, Method::GET, "/json").await.0, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn reload_swaps_routes() {
        let registry = registry();
        let dispatcher = Dispatcher::new(&registry).unwrap();
        assert_eq!(dispatcher.route_count(), 2);

        let extra = Endpoint::builder("/extra")
            .handler(|ctx| {
                Box::pin(async move {
                    ctx.text(StatusCode::OK, "extra");
                    Ok(())
                })
            })
            .build()
            .unwrap();
        registry.register(extra).unwrap();
        dispatcher.reload(&registry).unwrap();

        assert_eq!(dispatcher.route_count(), 3);
        assert_eq!(serve(&dispatcher, Method::GET, "/extra").await.0, StatusCode::OK);
    }

    #[tokio::test]
    async fn dispatch_recycles_contexts_and_sets_request_id() {
        let dispatcher = Dispatcher::new(&registry()).unwrap();
        let request = Request::builder()
            .uri("/hello/bob?x=1")
            .header(X_REQUEST_ID, "req-1")
            .body(Body::empty())
            .unwrap();
        let response = dispatcher.dispatch(request, 1024).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[X_REQUEST_ID], "req-1");
        assert_eq!(dispatcher.pool().idle(), 1);
    }

    #[tokio::test]
    async fn oversized_body_is_rejected() {
        let dispatcher = Dispatcher::new(&registry()).unwrap();
        let request = Request::builder()
            .method(Method::POST)
            .uri("/hello/bob")
            .body(Body::from(vec![b'x'; 64]))
            .unwrap();
        let response = dispatcher.dispatch(request, 8).await;
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }
}
