//! A ready-made, map-backed component system.
//!
//! [`DefaultComponentSystem`] stores components in an ordered map keyed by
//! entity and initialises every new component from a set of default
//! properties. Most plugins build their systems on top of it.

use std::collections::BTreeMap;
use std::sync::{PoisonError, RwLock};

use engine_component::{Component, ComponentHandle, ComponentType, EntityId, PropertyBag};
use tracing::debug;

use crate::error::ManagerError;
use crate::system::ComponentSystem;

/// Map-backed storage for components of one type.
#[derive(Debug)]
pub struct DefaultComponentSystem {
    component_type: ComponentType,
    base_type: Option<ComponentType>,
    defaults: PropertyBag,
    properties: PropertyBag,
    components: RwLock<BTreeMap<EntityId, ComponentHandle>>,
}

impl DefaultComponentSystem {
    /// Create a system for `component_type` with no defaults.
    #[must_use]
    pub fn new(component_type: ComponentType) -> Self {
        Self {
            component_type,
            base_type: None,
            defaults: PropertyBag::new(),
            properties: PropertyBag::new(),
            components: RwLock::new(BTreeMap::new()),
        }
    }

    /// Declare the base type of this system's components.
    #[must_use]
    pub fn with_base_type(mut self, base_type: ComponentType) -> Self {
        self.base_type = Some(base_type);
        self
    }

    /// Properties every new component starts with.
    #[must_use]
    pub fn with_defaults(mut self, defaults: PropertyBag) -> Self {
        self.defaults = defaults;
        self
    }

    /// System-wide properties.
    #[must_use]
    pub fn with_properties(mut self, properties: PropertyBag) -> Self {
        self.properties = properties;
        self
    }

    /// Returns the default component properties.
    #[must_use]
    pub fn defaults(&self) -> &PropertyBag {
        &self.defaults
    }

    /// Returns the number of stored components.
    #[must_use]
    pub fn len(&self) -> usize {
        self.components
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Returns `true` if no components are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns handles to every stored component, in entity order.
    #[must_use]
    pub fn components(&self) -> Vec<ComponentHandle> {
        self.components
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect()
    }
}

impl ComponentSystem for DefaultComponentSystem {
    fn component_type(&self) -> ComponentType {
        self.component_type.clone()
    }

    fn base_type(&self) -> Option<ComponentType> {
        self.base_type.clone()
    }

    fn has_component(&self, entity: EntityId) -> bool {
        self.components
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(&entity)
    }

    fn create_component(&self, entity: EntityId) -> Result<ComponentHandle, ManagerError> {
        let mut components = self
            .components
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        if components.contains_key(&entity) {
            return Err(ManagerError::DuplicateComponent {
                component_type: self.component_type.clone(),
                entity,
            });
        }
        let handle = ComponentHandle::new(Component::with_properties(
            self.component_type.clone(),
            entity,
            self.defaults.clone(),
        ));
        components.insert(entity, handle.clone());
        debug!(component_type = %self.component_type, %entity, "created component");
        Ok(handle)
    }

    fn delete_component(&self, entity: EntityId) -> bool {
        self.components
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&entity)
            .is_some()
    }

    fn get_component(&self, entity: EntityId) -> Option<ComponentHandle> {
        self.components
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&entity)
            .cloned()
    }

    fn entities(&self) -> Vec<EntityId> {
        self.components
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .copied()
            .collect()
    }

    fn properties(&self) -> PropertyBag {
        self.properties.clone()
    }
}
