//! Named singleton store.
//!
//! # Responsibilities
//! - Hold `(name, instance, type info)` records in registration order
//! - Index names by every type token the instance is assignable to
//! - Provide a per-name exclusive `get_or_create`
//!
//! # Design Decisions
//! - The record map and the type index each sit behind their own lock
//! - Creation is serialized per name, not globally, so independent singletons
//!   can be constructed in parallel
//! - No lock is held while the creation callback runs, except the per-name one
//! - Every held per-name lock is recorded against the creation call that owns
//!   it; a caller about to wait on a lock first walks the owner/waiter chain
//!   and fails with `InstanceInPreparation` if the chain leads back to itself

use std::any::TypeId;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use parking_lot::{Mutex, MutexGuard, RwLock};

use crate::component::error::ContainerError;
use crate::component::filter::Filter;
use crate::component::types::{Instance, TypeInfo};

/// One registered singleton.
#[derive(Clone)]
pub struct SingletonRecord {
    pub name: String,
    pub instance: Instance,
    pub type_info: Arc<TypeInfo>,
}

impl std::fmt::Debug for SingletonRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SingletonRecord")
            .field("name", &self.name)
            .field("type", &self.type_info.concrete())
            .finish()
    }
}

/// Thread-safe singleton registry.
#[derive(Default)]
pub struct SingletonRegistry {
    records: RwLock<HashMap<String, SingletonRecord>>,
    order: RwLock<Vec<String>>,
    type_index: RwLock<HashMap<TypeId, Vec<String>>>,
    creation_locks: DashMap<String, Arc<Mutex<()>>>,
    waits: Mutex<WaitGraph>,
}

/// Interval after which a blocked creator re-checks for a cross-call cycle.
const WAIT_RECHECK: Duration = Duration::from_millis(25);

/// Who holds each per-name creation lock and what each blocked owner waits on.
#[derive(Default)]
struct WaitGraph {
    owners: HashMap<String, u64>,
    waiting: HashMap<u64, String>,
}

impl WaitGraph {
    /// True if `owner` waiting on `name` would close a wait cycle.
    fn closes_cycle(&self, owner: u64, name: &str) -> bool {
        let mut current = name;
        for _ in 0..=self.owners.len() {
            let Some(&holder) = self.owners.get(current) else {
                return false;
            };
            if holder == owner {
                return true;
            }
            match self.waiting.get(&holder) {
                Some(next) => current = next,
                None => return false,
            }
        }
        false
    }
}

/// Clears the ownership record of a per-name lock on drop.
struct Ownership<'a> {
    waits: &'a Mutex<WaitGraph>,
    name: &'a str,
}

impl Drop for Ownership<'_> {
    fn drop(&mut self) {
        self.waits.lock().owners.remove(self.name);
    }
}

impl SingletonRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install a finished instance under `name`.
    pub fn register(
        &self,
        name: &str,
        instance: Instance,
        type_info: Arc<TypeInfo>,
    ) -> Result<(), ContainerError> {
        if name.trim().is_empty() {
            return Err(ContainerError::InvalidInstance(
                "singleton name must not be blank".to_string(),
            ));
        }

        let mut records = self.records.write();
        if records.contains_key(name) {
            return Err(ContainerError::InstanceAlreadyExists(name.to_string()));
        }

        {
            let mut index = self.type_index.write();
            for key in type_info.assignable_types() {
                index.entry(key.id()).or_default().push(name.to_string());
            }
        }
        self.order.write().push(name.to_string());
        records.insert(
            name.to_string(),
            SingletonRecord {
                name: name.to_string(),
                instance,
                type_info,
            },
        );
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<SingletonRecord> {
        self.records.read().get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.records.read().contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Names in registration order.
    pub fn names(&self) -> Vec<String> {
        self.order.read().clone()
    }

    /// Names assignable to the type, in registration order.
    pub fn names_for(&self, type_id: TypeId) -> Vec<String> {
        self.type_index
            .read()
            .get(&type_id)
            .cloned()
            .unwrap_or_default()
    }

    /// Records matching `filter`, in registration order.
    pub fn find(&self, filter: &Filter) -> Vec<SingletonRecord> {
        let candidates = match (filter.name(), filter.type_id()) {
            (Some(name), _) => vec![name.to_string()],
            (None, Some(id)) => self.names_for(id),
            (None, None) => self.names(),
        };
        let records = self.records.read();
        candidates
            .iter()
            .filter_map(|name| records.get(name))
            .filter(|record| filter.matches(&record.name, &record.type_info))
            .cloned()
            .collect()
    }

    /// Return the singleton named `name`, creating it with `create` if absent.
    ///
    /// Callers racing on the same name block on a per-name lock; the loser
    /// observes the winner's instance. A failed creation caches nothing.
    /// `owner` identifies the calling creation tree; if waiting for the lock
    /// would make two trees wait on each other, the call fails with
    /// `InstanceInPreparation` instead of blocking.
    pub fn get_or_create<F>(
        &self,
        name: &str,
        owner: u64,
        create: F,
    ) -> Result<(Instance, bool), ContainerError>
    where
        F: FnOnce() -> Result<(Instance, Arc<TypeInfo>), ContainerError>,
    {
        if let Some(record) = self.get(name) {
            return Ok((record.instance, false));
        }

        let lock = self
            .creation_locks
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let _held = match lock.try_lock() {
            Some(guard) => guard,
            None => self.wait_for(&lock, name, owner)?,
        };
        let _owned = self.own(name, owner);

        if let Some(record) = self.get(name) {
            return Ok((record.instance, false));
        }

        let (instance, type_info) = create()?;
        self.register(name, instance.clone(), type_info)?;
        Ok((instance, true))
    }

    fn wait_for<'l>(
        &self,
        lock: &'l Mutex<()>,
        name: &str,
        owner: u64,
    ) -> Result<MutexGuard<'l, ()>, ContainerError> {
        loop {
            {
                let mut waits = self.waits.lock();
                if waits.closes_cycle(owner, name) {
                    tracing::debug!(name = %name, "Cross-call creation cycle detected");
                    return Err(ContainerError::InstanceInPreparation(name.to_string()));
                }
                waits.waiting.insert(owner, name.to_string());
            }
            let acquired = lock.try_lock_for(WAIT_RECHECK);
            self.waits.lock().waiting.remove(&owner);
            if let Some(guard) = acquired {
                return Ok(guard);
            }
        }
    }

    fn own<'a>(&'a self, name: &'a str, owner: u64) -> Ownership<'a> {
        self.waits.lock().owners.insert(name.to_string(), owner);
        Ownership {
            waits: &self.waits,
            name,
        }
    }

    /// Remove and return the record named `name`.
    pub fn remove(&self, name: &str) -> Option<SingletonRecord> {
        let record = self.records.write().remove(name)?;
        self.order.write().retain(|n| n != name);
        let mut index = self.type_index.write();
        for key in record.type_info.assignable_types() {
            if let Some(names) = index.get_mut(&key.id()) {
                names.retain(|n| n != name);
                if names.is_empty() {
                    index.remove(&key.id());
                }
            }
        }
        Some(record)
    }

    /// Empty the registry, returning records newest first.
    pub fn drain_reverse(&self) -> Vec<SingletonRecord> {
        let mut records = self.records.write();
        let order = std::mem::take(&mut *self.order.write());
        self.type_index.write().clear();
        order
            .iter()
            .rev()
            .filter_map(|name| records.remove(name))
            .collect()
    }
}
