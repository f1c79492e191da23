//! Procyon application runtime.
//!
//! A dependency-injection container with conditional component loading,
//! profile-aware configuration, a startup lifecycle and an HTTP dispatcher
//! built on an allocation-free radix router.

pub mod application;
pub mod component;
pub mod config;
pub mod context;
pub mod env;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod routing;

pub use application::{Application, ApplicationContext, ApplicationError};
pub use component::{Component, Container, ContainerError, Definition};
pub use config::ApplicationConfig;
pub use context::Context;
pub use env::Environment;
pub use http::{Endpoint, HttpServer, RequestContext};
pub use lifecycle::Shutdown;
pub use routing::Router;
