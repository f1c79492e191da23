//! Components and the process-wide component registry.
//!
//! Applications normally hand their components to the application builder.
//! The global registry is a shortcut for modules that want to contribute
//! components without access to the builder; the builder pulls them in when
//! asked to.

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::component::condition::Condition;
use crate::component::definition::Definition;
use crate::component::error::ContainerError;

/// A definition plus the conditions gating its registration.
#[derive(Clone)]
pub struct Component {
    definition: Arc<Definition>,
    conditions: Vec<Arc<dyn Condition>>,
}

impl Component {
    pub fn new(definition: Definition) -> Self {
        Self {
            definition: Arc::new(definition),
            conditions: Vec::new(),
        }
    }

    /// Add a condition on top of the ones carried by the definition.
    pub fn when(mut self, condition: impl Condition + 'static) -> Self {
        self.conditions.push(Arc::new(condition));
        self
    }

    pub fn name(&self) -> &str {
        self.definition.name()
    }

    pub fn definition(&self) -> &Arc<Definition> {
        &self.definition
    }

    /// Definition conditions followed by component conditions.
    pub fn conditions(&self) -> impl Iterator<Item = &Arc<dyn Condition>> {
        self.definition.conditions().iter().chain(self.conditions.iter())
    }
}

impl From<Definition> for Component {
    fn from(definition: Definition) -> Self {
        Self::new(definition)
    }
}

impl fmt::Debug for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Component")
            .field("name", &self.name())
            .field("conditions", &self.conditions().collect::<Vec<_>>())
            .finish()
    }
}

static COMPONENTS: Mutex<Vec<Component>> = Mutex::new(Vec::new());

/// Add a component to the process-wide registry. Names must be unique.
pub fn register_component(component: impl Into<Component>) -> Result<(), ContainerError> {
    let component = component.into();
    let mut components = COMPONENTS.lock();
    if components.iter().any(|c| c.name() == component.name()) {
        return Err(ContainerError::DefinitionAlreadyExists(
            component.name().to_string(),
        ));
    }
    tracing::debug!(name = %component.name(), "Component registered globally");
    components.push(component);
    Ok(())
}

/// Snapshot of the process-wide registry, in registration order.
pub fn registered_components() -> Vec<Component> {
    COMPONENTS.lock().clone()
}
