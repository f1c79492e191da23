//! Runtime type tokens and assignability.
//!
//! Rust has no runtime reflection over trait implementations, so every
//! registered instance carries a [`TypeInfo`]: its concrete type plus one
//! caster per interface token it can be viewed as. Assignability queries are
//! lookups in that table.
//!
//! Casters produce an [`Erased`] value, a boxed `Arc<T>` where `T` may be a
//! `dyn Trait`. [`downcast_erased`] turns it back into `Arc<T>`.

use std::any::{Any, TypeId};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use crate::component::error::BoxError;
use crate::context::Context;

/// A shared, type-erased component instance.
pub type Instance = Arc<dyn Any + Send + Sync>;

/// A boxed `Arc<T>` for some `T: ?Sized`.
pub type Erased = Box<dyn Any + Send + Sync>;

type Caster = Arc<dyn Fn(&Instance) -> Option<Erased> + Send + Sync>;
type InitHook = Arc<dyn Fn(&Instance, &Context) -> Result<(), BoxError> + Send + Sync>;
type FinalizeHook = Arc<dyn Fn(&Instance) -> Result<(), BoxError> + Send + Sync>;

/// Identifies a type, sized or not. Equality is by `TypeId` only.
#[derive(Clone, Copy)]
pub struct TypeKey {
    id: TypeId,
    name: &'static str,
}

impl TypeKey {
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }

    pub fn id(&self) -> TypeId {
        self.id
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl PartialEq for TypeKey {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TypeKey {}

impl Hash for TypeKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

impl fmt::Display for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// Hook run on a freshly created instance, after pre-processors.
pub trait Init: Send + Sync + 'static {
    fn init(&self, ctx: &Context) -> Result<(), BoxError>;
}

/// Hook run on singletons when the container closes.
pub trait Finalize: Send + Sync + 'static {
    fn finalize(&self) -> Result<(), BoxError>;
}

/// Runtime type record of an instance: concrete type, interface casters and
/// lifecycle hooks.
pub struct TypeInfo {
    concrete: TypeKey,
    casts: Vec<(TypeKey, Caster)>,
    init: Option<InitHook>,
    finalize: Option<FinalizeHook>,
}

impl TypeInfo {
    /// Type record for a plain `T` with no interfaces or hooks.
    pub fn of<T: Any + Send + Sync>() -> Self {
        Self::builder::<T>().build()
    }

    pub fn builder<T: Any + Send + Sync>() -> TypeInfoBuilder<T> {
        TypeInfoBuilder::new()
    }

    /// The concrete type of instances described by this record.
    pub fn concrete(&self) -> TypeKey {
        self.concrete
    }

    /// Every type token instances can be viewed as, concrete type first.
    pub fn assignable_types(&self) -> impl Iterator<Item = TypeKey> + '_ {
        self.casts.iter().map(|(key, _)| *key)
    }

    pub fn is_assignable_to(&self, id: TypeId) -> bool {
        self.casts.iter().any(|(key, _)| key.id == id)
    }

    /// View `instance` as the type identified by `id`.
    pub fn cast(&self, instance: &Instance, id: TypeId) -> Option<Erased> {
        self.casts
            .iter()
            .find(|(key, _)| key.id == id)
            .and_then(|(_, caster)| caster(instance))
    }

    pub fn has_init(&self) -> bool {
        self.init.is_some()
    }

    pub fn has_finalize(&self) -> bool {
        self.finalize.is_some()
    }

    pub(crate) fn run_init(&self, instance: &Instance, ctx: &Context) -> Result<(), BoxError> {
        match &self.init {
            Some(hook) => hook(instance, ctx),
            None => Ok(()),
        }
    }

    pub(crate) fn run_finalize(&self, instance: &Instance) -> Result<(), BoxError> {
        match &self.finalize {
            Some(hook) => hook(instance),
            None => Ok(()),
        }
    }
}

impl fmt::Debug for TypeInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeInfo")
            .field("concrete", &self.concrete)
            .field("assignable", &self.casts.iter().map(|(k, _)| k).collect::<Vec<_>>())
            .field("init", &self.init.is_some())
            .field("finalize", &self.finalize.is_some())
            .finish()
    }
}

/// Builds a [`TypeInfo`] for a concrete `T`.
pub struct TypeInfoBuilder<T> {
    casts: Vec<(TypeKey, Caster)>,
    init: Option<InitHook>,
    finalize: Option<FinalizeHook>,
    _marker: std::marker::PhantomData<fn() -> T>,
}

impl<T: Any + Send + Sync> TypeInfoBuilder<T> {
    fn new() -> Self {
        let concrete: Caster = Arc::new(|instance: &Instance| {
            instance
                .clone()
                .downcast::<T>()
                .ok()
                .map(|typed| Box::new(typed) as Erased)
        });
        Self {
            casts: vec![(TypeKey::of::<T>(), concrete)],
            init: None,
            finalize: None,
            _marker: std::marker::PhantomData,
        }
    }

    /// Declare that `T` can be viewed as `I`, usually a `dyn Trait`:
    /// `.implements::<dyn Greeter>(|it| it)`.
    pub fn implements<I>(mut self, cast: fn(Arc<T>) -> Arc<I>) -> Self
    where
        I: ?Sized + Send + Sync + 'static,
    {
        let key = TypeKey::of::<I>();
        if self.casts.iter().any(|(k, _)| *k == key) {
            return self;
        }
        let caster: Caster = Arc::new(move |instance: &Instance| {
            instance
                .clone()
                .downcast::<T>()
                .ok()
                .map(|typed| Box::new(cast(typed)) as Erased)
        });
        self.casts.push((key, caster));
        self
    }

    /// Run [`Init::init`] after creation.
    pub fn with_init(mut self) -> Self
    where
        T: Init,
    {
        self.init = Some(Arc::new(|instance: &Instance, ctx: &Context| {
            match instance.downcast_ref::<T>() {
                Some(typed) => typed.init(ctx),
                None => Ok(()),
            }
        }));
        self
    }

    /// Run [`Finalize::finalize`] when the container closes.
    pub fn with_finalize(mut self) -> Self
    where
        T: Finalize,
    {
        self.finalize = Some(Arc::new(|instance: &Instance| {
            match instance.downcast_ref::<T>() {
                Some(typed) => typed.finalize(),
                None => Ok(()),
            }
        }));
        self
    }

    pub fn build(self) -> TypeInfo {
        TypeInfo {
            concrete: TypeKey::of::<T>(),
            casts: self.casts,
            init: self.init,
            finalize: self.finalize,
        }
    }
}

/// Recover the `Arc<T>` boxed by a caster.
pub fn downcast_erased<T: ?Sized + 'static>(erased: Erased) -> Option<Arc<T>> {
    erased.downcast::<Arc<T>>().ok().map(|boxed| *boxed)
}

/// Concrete type of a type-erased instance.
pub(crate) fn instance_type_id(instance: &Instance) -> TypeId {
    Any::type_id(&**instance)
}
