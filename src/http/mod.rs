//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (axum, timeout + trace layers)
//!     → dispatcher.rs (pooled RequestContext, request id, body limit)
//!     → routing::Router lookup (endpoint + parameter spans)
//!     → endpoint.rs chain: middleware… → handler (handler.rs)
//!     → response.rs (staged status/headers/body → axum Response)
//!     → Send to client, context back to the pool
//! ```

pub mod context;
pub mod dispatcher;
pub mod endpoint;
pub mod error;
pub mod handler;
pub mod request;
pub mod response;
pub mod server;

pub use context::{ContextPool, RequestContext};
pub use dispatcher::Dispatcher;
pub use endpoint::{Endpoint, EndpointBuilder, EndpointRegistry, RouteConfigurer};
pub use error::DispatchError;
pub use handler::{handler_fn, middleware_fn, BoxFuture, Handler, HandlerResult, Middleware, Next};
pub use request::X_REQUEST_ID;
pub use response::ResponseWriter;
pub use server::HttpServer;
