//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Route registration (at startup):
//!     (method, pattern, value)
//!     → pattern.rs (normalize, split into static / {param} / ** pieces)
//!     → tree.rs (insert into the radix tree, reject duplicates)
//!
//! Request lookup:
//!     (method, path)
//!     → tree.rs (walk: static → param → catch-all, with backtracking)
//!     → method.rs (pick the route for the method at the final node)
//!     → RouteMatch { route, params (spans into the path) }
//! ```
//!
//! # Design Decisions
//! - Routes are built once and swapped whole; the tree is never mutated
//!   while serving
//! - No regex and no allocation in the lookup path
//! - Deterministic precedence: static over param over catch-all

pub mod error;
pub mod method;
pub mod params;
pub mod pattern;
pub mod tree;

pub use error::RouteError;
pub use params::{ParamSpan, Params, CATCH_ALL, MAX_PARAMS};
pub use pattern::normalize;
pub use tree::{Route, RouteMatch, Router};
