//! Container error taxonomy.

use thiserror::Error;

/// Error type returned by user callbacks (constructors, hooks, processors).
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Root classification of a [`ContainerError`], independent of wrapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    DefinitionAlreadyExists,
    DefinitionNotFound,
    InvalidDefinition,
    InstanceAlreadyExists,
    InstanceNotFound,
    MultipleInstancesFound,
    InstanceInPreparation,
    InvalidInstance,
    TypeMismatch,
    ScopeNotFound,
    InvalidScopeName,
    ScopeReplacementNotAllowed,
    NilConstructor,
    InvalidConstructor,
    Constructor,
    Initializer,
    Processor,
}

/// Errors raised while registering or resolving components.
#[derive(Debug, Error)]
pub enum ContainerError {
    #[error("definition '{0}' already exists")]
    DefinitionAlreadyExists(String),

    #[error("no definition named '{0}'")]
    DefinitionNotFound(String),

    #[error("invalid definition: {0}")]
    InvalidDefinition(String),

    #[error("instance '{0}' already exists")]
    InstanceAlreadyExists(String),

    #[error("no instance found for {0}")]
    InstanceNotFound(String),

    #[error("multiple instances of {type_name} found: {}", names.join(", "))]
    MultipleInstancesFound {
        type_name: &'static str,
        names: Vec<String>,
    },

    #[error("instance '{0}' is currently in preparation, check for a dependency cycle")]
    InstanceInPreparation(String),

    #[error("invalid instance registration: {0}")]
    InvalidInstance(String),

    #[error("instance '{name}' is not assignable to {type_name}")]
    TypeMismatch {
        name: String,
        type_name: &'static str,
    },

    #[error("scope '{0}' not found")]
    ScopeNotFound(String),

    #[error("invalid scope name '{0}'")]
    InvalidScopeName(String),

    #[error("scope '{0}' is reserved and cannot be replaced")]
    ScopeReplacementNotAllowed(String),

    #[error("definition '{0}' has no constructor")]
    NilConstructor(String),

    #[error("invalid constructor for '{name}': {reason}")]
    InvalidConstructor { name: String, reason: String },

    #[error("constructor of '{name}' failed: {source}")]
    Constructor { name: String, source: BoxError },

    #[error("initialization of '{name}' failed: {source}")]
    Initializer { name: String, source: BoxError },

    #[error("processor failed for '{name}': {source}")]
    Processor { name: String, source: BoxError },

    #[error("cannot create '{name}': {source}")]
    Creation {
        name: String,
        source: Box<ContainerError>,
    },
}

impl ContainerError {
    /// The root kind, looking through `Creation` wrappers.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::DefinitionAlreadyExists(_) => ErrorKind::DefinitionAlreadyExists,
            Self::DefinitionNotFound(_) => ErrorKind::DefinitionNotFound,
            Self::InvalidDefinition(_) => ErrorKind::InvalidDefinition,
            Self::InstanceAlreadyExists(_) => ErrorKind::InstanceAlreadyExists,
            Self::InstanceNotFound(_) => ErrorKind::InstanceNotFound,
            Self::MultipleInstancesFound { .. } => ErrorKind::MultipleInstancesFound,
            Self::InstanceInPreparation(_) => ErrorKind::InstanceInPreparation,
            Self::InvalidInstance(_) => ErrorKind::InvalidInstance,
            Self::TypeMismatch { .. } => ErrorKind::TypeMismatch,
            Self::ScopeNotFound(_) => ErrorKind::ScopeNotFound,
            Self::InvalidScopeName(_) => ErrorKind::InvalidScopeName,
            Self::ScopeReplacementNotAllowed(_) => ErrorKind::ScopeReplacementNotAllowed,
            Self::NilConstructor(_) => ErrorKind::NilConstructor,
            Self::InvalidConstructor { .. } => ErrorKind::InvalidConstructor,
            Self::Constructor { .. } => ErrorKind::Constructor,
            Self::Initializer { .. } => ErrorKind::Initializer,
            Self::Processor { .. } => ErrorKind::Processor,
            Self::Creation { source, .. } => source.kind(),
        }
    }

    /// Wrap `self` with the name of the definition being created.
    pub(crate) fn creating(self, name: &str) -> Self {
        Self::Creation {
            name: name.to_string(),
            source: Box::new(self),
        }
    }
}
