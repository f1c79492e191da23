//! Component definitions.
//!
//! A [`Definition`] describes how to construct one value: its name, scope,
//! produced type, constructor arguments and registration conditions.
//! Definitions are immutable once built; the builder is typed by the produced
//! type so the out-type and the constructor's return type cannot disagree.
//!
//! # Example
//! ```ignore
//! let def = Definition::builder::<Another>("another")
//!     .arg(Arg::of::<Dependent>())
//!     .constructor(|args| Ok(Another::new(args.get::<Dependent>(0)?)))
//!     .build()?;
//! ```

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use crate::component::condition::Condition;
use crate::component::error::{BoxError, ContainerError};
use crate::component::types::{Erased, Finalize, Init, Instance, TypeInfo, TypeInfoBuilder, TypeKey};

pub const SINGLETON: &str = "singleton";
pub const PROTOTYPE: &str = "prototype";

/// Caching policy of a definition.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum ScopeName {
    /// One instance per name per container, created on first request.
    #[default]
    Singleton,
    /// A fresh instance on every request, never cached.
    Prototype,
    /// Delegated to a scope registered under this name.
    Custom(String),
}

impl ScopeName {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Singleton => SINGLETON,
            Self::Prototype => PROTOTYPE,
            Self::Custom(name) => name,
        }
    }

    pub fn is_reserved(name: &str) -> bool {
        name == SINGLETON || name == PROTOTYPE
    }
}

impl From<&str> for ScopeName {
    fn from(name: &str) -> Self {
        match name {
            SINGLETON => Self::Singleton,
            PROTOTYPE => Self::Prototype,
            other => Self::Custom(other.to_string()),
        }
    }
}

impl From<String> for ScopeName {
    fn from(name: String) -> Self {
        Self::from(name.as_str())
    }
}

impl fmt::Display for ScopeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Descriptor of one positional constructor argument.
#[derive(Debug, Clone)]
pub struct Arg {
    index: usize,
    type_key: TypeKey,
    name: Option<String>,
    optional: bool,
    collect: bool,
}

impl Arg {
    /// Resolve by type.
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            index: 0,
            type_key: TypeKey::of::<T>(),
            name: None,
            optional: false,
            collect: false,
        }
    }

    /// Resolve by name; the instance must still be assignable to `T`.
    pub fn named<T: ?Sized + 'static>(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::of::<T>()
        }
    }

    /// Collect every instance assignable to `T`.
    pub fn all<T: ?Sized + 'static>() -> Self {
        Self {
            collect: true,
            ..Self::of::<T>()
        }
    }

    /// Substitute `None` when resolution fails.
    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn type_key(&self) -> TypeKey {
        self.type_key
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn is_optional(&self) -> bool {
        self.optional
    }

    pub fn is_collection(&self) -> bool {
        self.collect
    }
}

pub(crate) enum ArgValue {
    One(Erased),
    Missing,
    All(Vec<Erased>),
}

/// Resolved constructor arguments, read back by position.
pub struct Args {
    owner: String,
    values: Vec<ArgValue>,
}

impl Args {
    pub(crate) fn new(owner: &str, values: Vec<ArgValue>) -> Self {
        Self {
            owner: owner.to_string(),
            values,
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// The required argument at `index`.
    pub fn get<T: ?Sized + 'static>(&self, index: usize) -> Result<Arc<T>, ContainerError> {
        match self.optional::<T>(index)? {
            Some(value) => Ok(value),
            None => Err(self.invalid(format!("argument {index} was not resolved"))),
        }
    }

    /// The argument at `index`, `None` when it was optional and unresolved.
    pub fn optional<T: ?Sized + 'static>(&self, index: usize) -> Result<Option<Arc<T>>, ContainerError> {
        match self.values.get(index) {
            Some(ArgValue::One(erased)) => erased
                .downcast_ref::<Arc<T>>()
                .cloned()
                .map(Some)
                .ok_or_else(|| self.mismatch::<T>(index)),
            Some(ArgValue::Missing) => Ok(None),
            Some(ArgValue::All(_)) => Err(self.invalid(format!(
                "argument {index} is a collection, read it with Args::all"
            ))),
            None => Err(self.out_of_range(index)),
        }
    }

    /// The collected instances at `index`, in resolution order.
    pub fn all<T: ?Sized + 'static>(&self, index: usize) -> Result<Vec<Arc<T>>, ContainerError> {
        match self.values.get(index) {
            Some(ArgValue::All(items)) => items
                .iter()
                .map(|erased| {
                    erased
                        .downcast_ref::<Arc<T>>()
                        .cloned()
                        .ok_or_else(|| self.mismatch::<T>(index))
                })
                .collect(),
            Some(_) => Err(self.invalid(format!("argument {index} is not a collection"))),
            None => Err(self.out_of_range(index)),
        }
    }

    fn invalid(&self, reason: String) -> ContainerError {
        ContainerError::InvalidConstructor {
            name: self.owner.clone(),
            reason,
        }
    }

    fn out_of_range(&self, index: usize) -> ContainerError {
        self.invalid(format!(
            "argument index {index} out of range ({} declared)",
            self.values.len()
        ))
    }

    fn mismatch<T: ?Sized + 'static>(&self, index: usize) -> ContainerError {
        self.invalid(format!(
            "argument {index} is not {}",
            std::any::type_name::<T>()
        ))
    }
}

type ConstructorFn = Arc<dyn Fn(&Args) -> Result<Instance, BoxError> + Send + Sync>;

/// Immutable description of how to construct one component.
#[derive(Clone)]
pub struct Definition {
    name: String,
    scope: ScopeName,
    type_info: Arc<TypeInfo>,
    args: Vec<Arg>,
    constructor: ConstructorFn,
    conditions: Vec<Arc<dyn Condition>>,
}

impl Definition {
    pub fn builder<T: Any + Send + Sync>(name: impl Into<String>) -> DefinitionBuilder<T> {
        DefinitionBuilder {
            name: name.into(),
            scope: ScopeName::Singleton,
            type_info: TypeInfo::builder::<T>(),
            args: Vec::new(),
            constructor: None,
            conditions: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn scope(&self) -> &ScopeName {
        &self.scope
    }

    pub fn out_type(&self) -> TypeKey {
        self.type_info.concrete()
    }

    pub fn type_info(&self) -> &Arc<TypeInfo> {
        &self.type_info
    }

    pub fn args(&self) -> &[Arg] {
        &self.args
    }

    pub fn conditions(&self) -> &[Arc<dyn Condition>] {
        &self.conditions
    }

    pub fn is_singleton(&self) -> bool {
        self.scope == ScopeName::Singleton
    }

    pub fn is_prototype(&self) -> bool {
        self.scope == ScopeName::Prototype
    }

    pub(crate) fn construct(&self, args: &Args) -> Result<Instance, BoxError> {
        (self.constructor)(args)
    }
}

impl fmt::Debug for Definition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Definition")
            .field("name", &self.name)
            .field("scope", &self.scope)
            .field("out_type", &self.out_type())
            .field("args", &self.args)
            .field("conditions", &self.conditions.len())
            .finish()
    }
}

/// Builder for [`Definition`], typed by the produced value.
pub struct DefinitionBuilder<T> {
    name: String,
    scope: ScopeName,
    type_info: TypeInfoBuilder<T>,
    args: Vec<Arg>,
    constructor: Option<ConstructorFn>,
    conditions: Vec<Arc<dyn Condition>>,
}

impl<T: Any + Send + Sync> DefinitionBuilder<T> {
    pub fn scope(mut self, scope: impl Into<ScopeName>) -> Self {
        self.scope = scope.into();
        self
    }

    pub fn prototype(self) -> Self {
        self.scope(ScopeName::Prototype)
    }

    /// Append the next positional argument.
    pub fn arg(mut self, mut arg: Arg) -> Self {
        arg.index = self.args.len();
        self.args.push(arg);
        self
    }

    /// See [`TypeInfoBuilder::implements`].
    pub fn implements<I>(mut self, cast: fn(Arc<T>) -> Arc<I>) -> Self
    where
        I: ?Sized + Send + Sync + 'static,
    {
        self.type_info = self.type_info.implements(cast);
        self
    }

    pub fn with_init(mut self) -> Self
    where
        T: Init,
    {
        self.type_info = self.type_info.with_init();
        self
    }

    pub fn with_finalize(mut self) -> Self
    where
        T: Finalize,
    {
        self.type_info = self.type_info.with_finalize();
        self
    }

    /// Only register the definition when `condition` matches.
    pub fn conditional_on(mut self, condition: impl Condition + 'static) -> Self {
        self.conditions.push(Arc::new(condition));
        self
    }

    pub fn constructor<F>(mut self, constructor: F) -> Self
    where
        F: Fn(&Args) -> Result<T, BoxError> + Send + Sync + 'static,
    {
        self.constructor = Some(Arc::new(move |args: &Args| {
            constructor(args).map(|value| Arc::new(value) as Instance)
        }));
        self
    }

    pub fn build(self) -> Result<Definition, ContainerError> {
        if self.name.trim().is_empty() {
            return Err(ContainerError::InvalidDefinition(
                "definition name must not be blank".to_string(),
            ));
        }
        if let ScopeName::Custom(scope) = &self.scope {
            if scope.trim().is_empty() {
                return Err(ContainerError::InvalidScopeName(scope.clone()));
            }
        }
        let constructor = self
            .constructor
            .ok_or_else(|| ContainerError::NilConstructor(self.name.clone()))?;

        Ok(Definition {
            name: self.name,
            scope: self.scope,
            type_info: Arc::new(self.type_info.build()),
            args: self.args,
            constructor,
            conditions: self.conditions,
        })
    }
}
