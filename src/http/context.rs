//! Per-request context and its pool.
//!
//! # Responsibilities
//! - Carry request data, captured route parameters, a key/value store and
//!   the staged response through the handler chain
//! - Recycle contexts between requests
//!
//! # Design Decisions
//! - Parameter values are spans into the owned path; names come from the
//!   matched endpoint, so setting them up does not allocate
//! - `reset` clears every per-request field but keeps buffer capacity
//! - The pool is bounded; surplus contexts are dropped

use std::any::Any;
use std::borrow::Cow;
use std::collections::HashMap;
use std::sync::Arc;

use axum::http::header::{HeaderName, HeaderValue};
use axum::http::{HeaderMap, Method, StatusCode};
use bytes::Bytes;
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use url::form_urlencoded;

use crate::context::Context;
use crate::http::endpoint::Endpoint;
use crate::http::error::DispatchError;
use crate::http::response::ResponseWriter;
use crate::routing::Params;

pub struct RequestContext {
    ctx: Context,
    method: Method,
    path: String,
    query: String,
    headers: HeaderMap,
    body: Bytes,
    request_id: String,
    endpoint: Option<Arc<Endpoint>>,
    params: Params,
    values: HashMap<String, Box<dyn Any + Send + Sync>>,
    aborted: bool,
    response: ResponseWriter,
}

impl RequestContext {
    pub fn new() -> Self {
        Self {
            ctx: Context::background(),
            method: Method::GET,
            path: String::new(),
            query: String::new(),
            headers: HeaderMap::new(),
            body: Bytes::new(),
            request_id: String::new(),
            endpoint: None,
            params: Params::new(),
            values: HashMap::new(),
            aborted: false,
            response: ResponseWriter::new(),
        }
    }

    /// Fill the request side. Path and query reuse their buffers.
    pub fn prepare(&mut self, ctx: Context, method: Method, path: &str, query: Option<&str>, headers: HeaderMap) {
        self.ctx = ctx;
        self.method = method;
        self.path.clear();
        self.path.push_str(path);
        self.query.clear();
        self.query.push_str(query.unwrap_or_default());
        self.headers = headers;
    }

    pub(crate) fn set_body(&mut self, body: Bytes) {
        self.body = body;
    }

    pub(crate) fn set_request_id(&mut self, id: String) {
        self.request_id = id;
    }

    pub(crate) fn set_route(&mut self, endpoint: Arc<Endpoint>, params: Params) {
        self.endpoint = Some(endpoint);
        self.params = params;
    }

    /// Clear per-request state before the context goes back to the pool.
    pub fn reset(&mut self) {
        self.ctx = Context::background();
        self.method = Method::GET;
        self.path.clear();
        self.query.clear();
        self.headers.clear();
        self.body = Bytes::new();
        self.request_id.clear();
        self.endpoint = None;
        self.params = Params::new();
        self.values.clear();
        self.aborted = false;
        self.response.reset();
    }

    /// Cancellation and deadline of this request.
    pub fn context(&self) -> &Context {
        &self.ctx
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Raw query string without the `?`; empty when absent.
    pub fn query(&self) -> &str {
        &self.query
    }

    /// First value of a query parameter, percent- and `+`-decoded.
    pub fn query_param(&self, name: &str) -> Option<Cow<'_, str>> {
        form_urlencoded::parse(self.query.as_bytes())
            .find(|(key, _)| key == name)
            .map(|(_, value)| value)
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T, DispatchError> {
        Ok(serde_json::from_slice(&self.body)?)
    }

    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    pub fn endpoint(&self) -> Option<&Arc<Endpoint>> {
        self.endpoint.as_ref()
    }

    /// Captured path parameter. The catch-all remainder is named `**`.
    pub fn param(&self, name: &str) -> Option<&str> {
        let index = self.endpoint.as_ref()?.param_index(name)?;
        let span = self.params.get(index)?;
        self.path.get(span.start..span.end)
    }

    /// `(name, value)` pairs in pattern order.
    pub fn params(&self) -> impl Iterator<Item = (&str, &str)> + '_ {
        let names = self.endpoint.iter().flat_map(|e| e.param_names());
        names
            .zip(self.params.spans())
            .map(|(name, span)| (name, self.path.get(span.start..span.end).unwrap_or_default()))
    }

    pub fn param_count(&self) -> usize {
        self.params.len()
    }

    pub fn set<T: Any + Send + Sync>(&mut self, key: impl Into<String>, value: T) {
        self.values.insert(key.into(), Box::new(value));
    }

    /// `None` if absent or stored with another type.
    pub fn get<T: Any + Send + Sync>(&self, key: &str) -> Option<&T> {
        self.values.get(key)?.downcast_ref::<T>()
    }

    pub fn remove(&mut self, key: &str) -> bool {
        self.values.remove(key).is_some()
    }

    /// Skip the remaining chain elements.
    pub fn abort(&mut self) {
        self.aborted = true;
    }

    pub fn is_aborted(&self) -> bool {
        self.aborted
    }

    /// Answer with `status` and abort.
    pub fn abort_with_status(&mut self, status: StatusCode) {
        self.response.set_status(status);
        self.response.commit();
        self.aborted = true;
    }

    pub fn response(&self) -> &ResponseWriter {
        &self.response
    }

    pub fn response_mut(&mut self) -> &mut ResponseWriter {
        &mut self.response
    }

    pub fn status(&mut self, status: StatusCode) -> bool {
        self.response.set_status(status)
    }

    pub fn set_header(&mut self, name: &str, value: &str) -> Result<bool, DispatchError> {
        let invalid = || DispatchError::InvalidHeader { name: name.to_string() };
        let name = HeaderName::try_from(name).map_err(|_| invalid())?;
        let value = HeaderValue::try_from(value).map_err(|_| invalid())?;
        Ok(self.response.set_header(name, value))
    }

    pub fn text(&mut self, status: StatusCode, body: impl AsRef<str>) {
        self.response.set_status(status);
        self.response.default_content_type("text/plain; charset=utf-8");
        self.response.write(body.as_ref().as_bytes());
    }

    pub fn json_response<T: Serialize>(&mut self, status: StatusCode, value: &T) -> Result<(), DispatchError> {
        let body = serde_json::to_vec(value)?;
        self.response.set_status(status);
        self.response.default_content_type("application/json");
        self.response.write(&body);
        Ok(())
    }

    pub fn redirect(&mut self, status: StatusCode, location: &str) -> Result<(), DispatchError> {
        self.response.redirect(status, location)
    }
}

impl Default for RequestContext {
    fn default() -> Self {
        Self::new()
    }
}

pub const DEFAULT_POOL_CAPACITY: usize = 1024;

/// Bounded free list of request contexts.
pub struct ContextPool {
    free: Mutex<Vec<Box<RequestContext>>>,
    capacity: usize,
}

impl ContextPool {
    pub fn new(capacity: usize) -> Self {
        Self {
            free: Mutex::new(Vec::new()),
            capacity,
        }
    }

    pub fn acquire(&self) -> Box<RequestContext> {
        self.free.lock().pop().unwrap_or_default()
    }

    pub fn release(&self, mut ctx: Box<RequestContext>) {
        ctx.reset();
        let mut free = self.free.lock();
        if free.len() < self.capacity {
            free.push(ctx);
        }
    }

    /// Contexts waiting for reuse.
    pub fn idle(&self) -> usize {
        self.free.lock().len()
    }
}

impl Default for ContextPool {
    fn default() -> Self {
        Self::new(DEFAULT_POOL_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_params() {
        let mut ctx = RequestContext::new();
        ctx.prepare(Context::background(), Method::GET, "/s", Some("q=rust&flag&page=2"), HeaderMap::new());
        assert_eq!(ctx.query_param("q").as_deref(), Some("rust"));
        assert_eq!(ctx.query_param("flag").as_deref(), Some(""));
        assert_eq!(ctx.query_param("page").as_deref(), Some("2"));
        assert_eq!(ctx.query_param("missing"), None);
    }

    #[test]
    fn query_params_are_decoded() {
        let mut ctx = RequestContext::new();
        ctx.prepare(
            Context::background(),
            Method::GET,
            "/s",
            Some("q=a%20b&sum=1+2&caf%C3%A9=yes"),
            HeaderMap::new(),
        );
        assert_eq!(ctx.query_param("q").as_deref(), Some("a b"));
        assert_eq!(ctx.query_param("sum").as_deref(), Some("1 2"));
        assert_eq!(ctx.query_param("café").as_deref(), Some("yes"));
        assert_eq!(ctx.query(), "q=a%20b&sum=1+2&caf%C3%A9=yes");
    }

    #[test]
    fn typed_values() {
        let mut ctx = RequestContext::new();
        ctx.set("user", 42u64);
        assert_eq!(ctx.get::<u64>("user"), Some(&42));
        assert_eq!(ctx.get::<String>("user"), None);
        assert!(ctx.remove("user"));
        assert_eq!(ctx.get::<u64>("user"), None);
    }

    #[test]
    fn pool_resets_contexts() {
        let pool = ContextPool::new(1);
        let mut ctx = pool.acquire();
        ctx.prepare(Context::background(), Method::POST, "/a/b", Some("x=1"), HeaderMap::new());
        ctx.set("k", 1u8);
        ctx.abort();
        ctx.text(StatusCode::CREATED, "hi");
        pool.release(ctx);
        assert_eq!(pool.idle(), 1);

        let ctx = pool.acquire();
        assert_eq!(ctx.path(), "");
        assert_eq!(ctx.query(), "");
        assert_eq!(*ctx.method(), Method::GET);
        assert!(!ctx.is_aborted());
        assert!(ctx.get::<u8>("k").is_none());
        assert!(!ctx.response().is_committed());
        assert_eq!(ctx.param_count(), 0);
        assert!(ctx.endpoint().is_none());
    }

    #[test]
    fn pool_is_bounded() {
        let pool = ContextPool::new(1);
        pool.release(Box::default());
        pool.release(Box::default());
        assert_eq!(pool.idle(), 1);
    }
}
