//! HTTP endpoints and their registry.
//!
//! # Responsibilities
//! - Describe one mounted endpoint: pattern, methods, handler, middleware,
//!   tags
//! - Collect endpoints from application code and from components
//! - Compile the registry into a router
//!
//! # Design Decisions
//! - Patterns are validated when the endpoint is built, so a bad pattern
//!   fails at registration rather than at router build
//! - An endpoint without methods answers `GET`
//! - Duplicate `(method, pattern)` pairs are rejected on registration

use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::http::context::RequestContext;
use crate::http::handler::{BoxFuture, Handler, HandlerResult, Middleware, Next};
use crate::routing::{pattern, RouteError, Router};

pub struct Endpoint {
    pattern: String,
    methods: Vec<String>,
    handler: Arc<dyn Handler>,
    middleware: Vec<Arc<dyn Middleware>>,
    tags: Vec<String>,
    param_names: Box<[Box<str>]>,
}

impl Endpoint {
    pub fn builder(pattern: impl Into<String>) -> EndpointBuilder {
        EndpointBuilder {
            pattern: pattern.into(),
            methods: Vec::new(),
            handler: None,
            middleware: Vec::new(),
            tags: Vec::new(),
        }
    }

    /// Normalized pattern.
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn methods(&self) -> &[String] {
        &self.methods
    }

    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }

    pub fn handler(&self) -> &Arc<dyn Handler> {
        &self.handler
    }

    pub fn middleware(&self) -> &[Arc<dyn Middleware>] {
        &self.middleware
    }

    pub fn param_names(&self) -> impl Iterator<Item = &str> {
        self.param_names.iter().map(|n| &**n)
    }

    pub fn param_index(&self, name: &str) -> Option<usize> {
        self.param_names.iter().position(|n| &**n == name)
    }

    /// Run middleware in declaration order, then the handler.
    pub fn invoke<'a>(&'a self, ctx: &'a mut RequestContext) -> BoxFuture<'a, HandlerResult> {
        Next::new(&self.middleware, &*self.handler).run(ctx)
    }
}

impl fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Endpoint")
            .field("pattern", &self.pattern)
            .field("methods", &self.methods)
            .field("middleware", &self.middleware.len())
            .field("tags", &self.tags)
            .finish()
    }
}

pub struct EndpointBuilder {
    pattern: String,
    methods: Vec<String>,
    handler: Option<Arc<dyn Handler>>,
    middleware: Vec<Arc<dyn Middleware>>,
    tags: Vec<String>,
}

impl EndpointBuilder {
    pub fn method(mut self, method: &str) -> Self {
        let method = method.trim().to_ascii_uppercase();
        if !self.methods.contains(&method) {
            self.methods.push(method);
        }
        self
    }

    pub fn get(self) -> Self {
        self.method("GET")
    }

    pub fn post(self) -> Self {
        self.method("POST")
    }

    pub fn put(self) -> Self {
        self.method("PUT")
    }

    pub fn patch(self) -> Self {
        self.method("PATCH")
    }

    pub fn delete(self) -> Self {
        self.method("DELETE")
    }

    pub fn handler<F>(mut self, f: F) -> Self
    where
        F: for<'a> Fn(&'a mut RequestContext) -> BoxFuture<'a, HandlerResult> + Send + Sync + 'static,
    {
        self.handler = Some(Arc::new(f));
        self
    }

    /// Use a handler implemented by a type, typically a component.
    pub fn handler_arc(mut self, handler: Arc<dyn Handler>) -> Self {
        self.handler = Some(handler);
        self
    }

    pub fn middleware<F>(mut self, f: F) -> Self
    where
        F: for<'a> Fn(&'a mut RequestContext, Next<'a>) -> BoxFuture<'a, HandlerResult> + Send + Sync + 'static,
    {
        self.middleware.push(Arc::new(f));
        self
    }

    pub fn layer(mut self, middleware: Arc<dyn Middleware>) -> Self {
        self.middleware.push(middleware);
        self
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    pub fn build(self) -> Result<Endpoint, RouteError> {
        if self.pattern.trim().is_empty() {
            return Err(RouteError::invalid(&self.pattern, "pattern must not be empty"));
        }
        let Some(handler) = self.handler else {
            return Err(RouteError::invalid(&self.pattern, "endpoint has no handler"));
        };
        let normalized = pattern::normalize(&self.pattern);
        let (_, names) = pattern::parse(pattern::key_of(&normalized), &self.pattern)?;
        let methods = if self.methods.is_empty() {
            vec!["GET".to_string()]
        } else {
            self.methods
        };
        Ok(Endpoint {
            pattern: normalized,
            methods,
            handler,
            middleware: self.middleware,
            tags: self.tags,
            param_names: names.into_boxed_slice(),
        })
    }
}

/// Contributes endpoints after components are loaded. Register a component
/// implementing it with `implements::<dyn RouteConfigurer>`.
pub trait RouteConfigurer: Send + Sync {
    fn configure(&self, registry: &EndpointRegistry) -> Result<(), RouteError>;
}

/// Endpoints in registration order.
#[derive(Default)]
pub struct EndpointRegistry {
    endpoints: RwLock<Vec<Arc<Endpoint>>>,
}

impl EndpointRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, endpoint: Endpoint) -> Result<Arc<Endpoint>, RouteError> {
        let mut endpoints = self.endpoints.write();
        for existing in endpoints.iter().filter(|e| e.pattern == endpoint.pattern) {
            if let Some(method) = endpoint.methods.iter().find(|m| existing.methods.contains(m)) {
                return Err(RouteError::DuplicateRoute {
                    method: method.clone(),
                    pattern: endpoint.pattern.clone(),
                });
            }
        }
        tracing::debug!(pattern = %endpoint.pattern, methods = ?endpoint.methods, "Endpoint registered");
        let endpoint = Arc::new(endpoint);
        endpoints.push(Arc::clone(&endpoint));
        Ok(endpoint)
    }

    pub fn endpoints(&self) -> Vec<Arc<Endpoint>> {
        self.endpoints.read().clone()
    }

    pub fn tagged(&self, tag: &str) -> Vec<Arc<Endpoint>> {
        self.endpoints.read().iter().filter(|e| e.has_tag(tag)).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.endpoints.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.endpoints.read().is_empty()
    }

    /// One route per `(method, endpoint)`.
    pub fn build_router(&self) -> Result<Router<Arc<Endpoint>>, RouteError> {
        let mut router = Router::new();
        for endpoint in self.endpoints.read().iter() {
            for method in &endpoint.methods {
                router.insert(method, &endpoint.pattern, Arc::clone(endpoint))?;
            }
        }
        Ok(router)
    }
}

impl fmt::Debug for EndpointRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EndpointRegistry").field("endpoints", &self.len()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn endpoint(pattern: &str) -> EndpointBuilder {
        Endpoint::builder(pattern).handler(|_ctx| Box::pin(async { Ok(()) }))
    }

    #[test]
    fn defaults_to_get() {
        let e = endpoint("/users/{id}/").build().unwrap();
        assert_eq!(e.methods(), ["GET".to_string()]);
        assert_eq!(e.pattern(), "/users/{id}");
        assert_eq!(e.param_index("id"), Some(0));
        assert_eq!(e.param_names().collect::<Vec<_>>(), vec!["id"]);
    }

    #[test]
    fn rejects_bad_endpoints() {
        assert!(endpoint("").build().is_err());
        assert!(Endpoint::builder("/x").build().is_err());
        assert!(matches!(
            endpoint("/x/{").build(),
            Err(RouteError::UnclosedParam { .. })
        ));
    }

    #[test]
    fn registry_rejects_overlapping_methods() {
        let registry = EndpointRegistry::new();
        registry.register(endpoint("/a").get().post().build().unwrap()).unwrap();
        registry.register(endpoint("/a").delete().build().unwrap()).unwrap();
        let err = registry.register(endpoint("/a/").post().build().unwrap()).unwrap_err();
        assert!(matches!(err, RouteError::DuplicateRoute { ref method, .. } if method == "POST"));
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn builds_router_for_every_method() {
        let registry = EndpointRegistry::new();
        registry
            .register(endpoint("/items/{id}").get().put().tag("items").build().unwrap())
            .unwrap();
        registry.register(endpoint("/health").build().unwrap()).unwrap();

        let router = registry.build_router().unwrap();
        assert_eq!(router.len(), 3);
        let hit = router.lookup("PUT", "/items/9").unwrap();
        assert_eq!(hit.value().pattern(), "/items/{id}");
        assert!(router.lookup("POST", "/items/9").is_none());
        assert_eq!(registry.tagged("items").len(), 1);
    }
}
