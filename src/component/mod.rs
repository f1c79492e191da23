//! Component container subsystem.
//!
//! # Data Flow
//! ```text
//! Definition::builder (name, scope, args, interfaces, conditions)
//!     → Component (definition + extra conditions)
//!     → loader.rs (evaluate conditions, multi-pass)
//!     → container.rs (definition table)
//!
//! resolve(ctx, name | type)
//!     → singleton.rs (cached instance?)
//!     → container.rs (scope dispatch, creation-state guard)
//!     → arguments resolved recursively
//!     → constructor → pre-processors → Init → post-processors
//!     → singleton.rs / scope.rs (cache per scope)
//! ```
//!
//! # Design Decisions
//! - Constructors are typed closures over positional [`Args`]; argument
//!   descriptors carry type tokens instead of relying on reflection
//! - Interfaces are declared per definition (`implements::<dyn Trait>`), which
//!   is what by-type resolution and collections match against
//! - Every registry owns its lock; user callbacks never run under one

pub mod condition;
pub mod container;
pub mod definition;
pub mod error;
pub mod filter;
pub mod loader;
pub mod processor;
pub mod registry;
pub mod scope;
pub mod singleton;
pub mod types;

pub use condition::{
    Condition, ConditionContext, OnInstance, OnMissingInstance, OnMissingType, OnProfile,
    OnProperty, OnType,
};
pub use container::Container;
pub use definition::{Arg, Args, Definition, DefinitionBuilder, ScopeName};
pub use error::{BoxError, ContainerError, ErrorKind};
pub use filter::Filter;
pub use loader::{ConditionalLoader, LoadReport};
pub use processor::InstanceProcessor;
pub use registry::{register_component, registered_components, Component};
pub use scope::{CachingScope, Scope, ScopeRegistry};
pub use singleton::{SingletonRecord, SingletonRegistry};
pub use types::{downcast_erased, Erased, Finalize, Init, Instance, TypeInfo, TypeKey};
