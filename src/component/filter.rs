//! By-name and by-type selectors over the singleton and definition registries.

use std::any::TypeId;

use crate::component::types::{TypeInfo, TypeKey};

/// Selects registry entries. An empty filter matches everything; every
/// criterion that is set must match.
#[derive(Debug, Clone, Default)]
pub struct Filter {
    name: Option<String>,
    type_key: Option<TypeKey>,
}

impl Filter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn by_name(name: impl Into<String>) -> Self {
        Self::default().and_name(name)
    }

    pub fn by_type<T: ?Sized + 'static>() -> Self {
        Self::default().and_type_key(TypeKey::of::<T>())
    }

    pub fn by_type_key(key: TypeKey) -> Self {
        Self::default().and_type_key(key)
    }

    pub fn and_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn and_type_key(mut self, key: TypeKey) -> Self {
        self.type_key = Some(key);
        self
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn type_id(&self) -> Option<TypeId> {
        self.type_key.map(|key| key.id())
    }

    pub fn matches(&self, name: &str, info: &TypeInfo) -> bool {
        if let Some(expected) = &self.name {
            if expected != name {
                return false;
            }
        }
        match &self.type_key {
            Some(key) => info.is_assignable_to(key.id()),
            None => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    trait Marker: Send + Sync {}
    struct Thing;
    impl Marker for Thing {}

    #[test]
    fn combines_name_and_type() {
        let info = TypeInfo::builder::<Thing>()
            .implements::<dyn Marker>(|it| it)
            .build();

        assert!(Filter::all().matches("thing", &info));
        assert!(Filter::by_name("thing").matches("thing", &info));
        assert!(!Filter::by_name("other").matches("thing", &info));
        assert!(Filter::by_type::<dyn Marker>().matches("thing", &info));
        assert!(!Filter::by_type::<String>().matches("thing", &info));
        assert!(!Filter::by_type::<Thing>().and_name("other").matches("thing", &info));
    }
}
