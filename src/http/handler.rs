//! Handler and middleware contracts.
//!
//! # Responsibilities
//! - Define the async callables an endpoint runs
//! - Chain middleware in declaration order with an explicit continuation
//!
//! # Design Decisions
//! - Both traits return a boxed future borrowing the request context, so a
//!   handler can keep `&mut RequestContext` across awaits
//! - A middleware short-circuits by not calling `next`, or by calling
//!   `RequestContext::abort`; `Next::run` on an aborted context is a no-op

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::component::BoxError;
use crate::http::context::RequestContext;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// `Ok` means the handler answered through the context. An `Err` that
/// reaches the dispatcher with an uncommitted response becomes a 500.
pub type HandlerResult = Result<(), BoxError>;

pub trait Handler: Send + Sync + 'static {
    fn call<'a>(&'a self, ctx: &'a mut RequestContext) -> BoxFuture<'a, HandlerResult>;
}

impl<F> Handler for F
where
    F: for<'a> Fn(&'a mut RequestContext) -> BoxFuture<'a, HandlerResult> + Send + Sync + 'static,
{
    fn call<'a>(&'a self, ctx: &'a mut RequestContext) -> BoxFuture<'a, HandlerResult> {
        self(ctx)
    }
}

pub trait Middleware: Send + Sync + 'static {
    fn handle<'a>(&'a self, ctx: &'a mut RequestContext, next: Next<'a>) -> BoxFuture<'a, HandlerResult>;
}

impl<F> Middleware for F
where
    F: for<'a> Fn(&'a mut RequestContext, Next<'a>) -> BoxFuture<'a, HandlerResult> + Send + Sync + 'static,
{
    fn handle<'a>(&'a self, ctx: &'a mut RequestContext, next: Next<'a>) -> BoxFuture<'a, HandlerResult> {
        self(ctx, next)
    }
}

/// The rest of the chain after the current middleware.
#[derive(Clone, Copy)]
pub struct Next<'a> {
    middleware: &'a [Arc<dyn Middleware>],
    handler: &'a dyn Handler,
}

impl<'a> Next<'a> {
    pub fn new(middleware: &'a [Arc<dyn Middleware>], handler: &'a dyn Handler) -> Self {
        Self { middleware, handler }
    }

    /// Run the next element of the chain.
    pub fn run(self, ctx: &'a mut RequestContext) -> BoxFuture<'a, HandlerResult> {
        if ctx.is_aborted() {
            return Box::pin(async { Ok(()) });
        }
        match self.middleware.split_first() {
            Some((first, rest)) => first.handle(
                ctx,
                Next {
                    middleware: rest,
                    handler: self.handler,
                },
            ),
            None => self.handler.call(ctx),
        }
    }

    /// Elements left, handler included.
    pub fn remaining(&self) -> usize {
        self.middleware.len() + 1
    }
}

/// Pin a handler closure into an `Arc<dyn Handler>`. The explicit bound
/// lets closures infer the higher-ranked signature.
pub fn handler_fn<F>(f: F) -> Arc<dyn Handler>
where
    F: for<'a> Fn(&'a mut RequestContext) -> BoxFuture<'a, HandlerResult> + Send + Sync + 'static,
{
    Arc::new(f)
}

pub fn middleware_fn<F>(f: F) -> Arc<dyn Middleware>
where
    F: for<'a> Fn(&'a mut RequestContext, Next<'a>) -> BoxFuture<'a, HandlerResult> + Send + Sync + 'static,
{
    Arc::new(f)
}
