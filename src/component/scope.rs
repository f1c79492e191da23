//! Custom scopes.
//!
//! `singleton` and `prototype` are handled inline by the container and their
//! names are reserved. Every other scope name maps to a [`Scope`] registered
//! on the container; the scope decides caching and lifetime.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use crate::component::definition::ScopeName;
use crate::component::error::ContainerError;
use crate::component::types::Instance;

/// Factory handed to a scope; runs the prototype creation path.
pub type ScopeFactory<'a> = &'a dyn Fn() -> Result<Instance, ContainerError>;

/// Caching policy for a custom scope name.
pub trait Scope: Send + Sync {
    /// Return the cached instance for `name` or create one with `factory`.
    fn get(&self, name: &str, factory: ScopeFactory<'_>) -> Result<Instance, ContainerError>;

    /// Drop the cached instance for `name`, returning it.
    fn remove(&self, name: &str) -> Option<Instance>;
}

/// Per-container registry of custom scopes.
#[derive(Default)]
pub struct ScopeRegistry {
    scopes: RwLock<HashMap<String, Arc<dyn Scope>>>,
}

impl ScopeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register or replace a custom scope.
    pub fn register(&self, name: &str, scope: Arc<dyn Scope>) -> Result<(), ContainerError> {
        if name.trim().is_empty() {
            return Err(ContainerError::InvalidScopeName(name.to_string()));
        }
        if ScopeName::is_reserved(name) {
            return Err(ContainerError::ScopeReplacementNotAllowed(name.to_string()));
        }
        self.scopes.write().insert(name.to_string(), scope);
        tracing::debug!(scope = %name, "Scope registered");
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Scope>> {
        self.scopes.read().get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.scopes.read().contains_key(name)
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.scopes.read().keys().cloned().collect();
        names.sort();
        names
    }
}

/// Map-backed scope: one instance per name until removed or cleared.
///
/// Suitable for request- or session-like lifetimes where the owner calls
/// [`CachingScope::clear`] at the end of the unit of work.
#[derive(Default)]
pub struct CachingScope {
    instances: Mutex<HashMap<String, Instance>>,
}

impl CachingScope {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.instances.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.instances.lock().clear();
    }
}

impl Scope for CachingScope {
    fn get(&self, name: &str, factory: ScopeFactory<'_>) -> Result<Instance, ContainerError> {
        if let Some(instance) = self.instances.lock().get(name) {
            return Ok(instance.clone());
        }

        // The factory may resolve other components in this scope.
        let created = factory()?;

        let mut instances = self.instances.lock();
        Ok(instances
            .entry(name.to_string())
            .or_insert(created)
            .clone())
    }

    fn remove(&self, name: &str) -> Option<Instance> {
        self.instances.lock().remove(name)
    }
}
