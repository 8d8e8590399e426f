//! Component values.
//!
//! A [`Component`] is one entity's data for one component type: a
//! [`PropertyBag`] tagged with its type and owning entity. Component systems
//! own their components and hand out [`ComponentHandle`]s, shared handles that
//! allow in-place reads and writes without copying the bag.

use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::{Deserialize, Serialize};

use crate::entity::EntityId;
use crate::property::PropertyBag;
use crate::type_id::ComponentType;

/// One entity's attribute bag for one component type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Component {
    component_type: ComponentType,
    entity: EntityId,
    /// The component's properties.
    pub properties: PropertyBag,
}

impl Component {
    /// Create a component with an empty property bag.
    #[must_use]
    pub fn new(component_type: ComponentType, entity: EntityId) -> Self {
        Self::with_properties(component_type, entity, PropertyBag::new())
    }

    /// Create a component with initial properties.
    #[must_use]
    pub fn with_properties(
        component_type: ComponentType,
        entity: EntityId,
        properties: PropertyBag,
    ) -> Self {
        Self {
            component_type,
            entity,
            properties,
        }
    }

    /// Returns the component's type.
    #[must_use]
    pub fn component_type(&self) -> &ComponentType {
        &self.component_type
    }

    /// Returns the entity the component is attached to.
    #[must_use]
    pub fn entity(&self) -> EntityId {
        self.entity
    }
}

/// Shared handle to a component owned by a component system.
///
/// Cloning the handle does not clone the component.
#[derive(Debug, Clone)]
pub struct ComponentHandle(Arc<RwLock<Component>>);

impl ComponentHandle {
    /// Wrap a component in a new handle.
    #[must_use]
    pub fn new(component: Component) -> Self {
        Self(Arc::new(RwLock::new(component)))
    }

    /// Lock the component for reading.
    pub fn read(&self) -> RwLockReadGuard<'_, Component> {
        self.0.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Lock the component for writing.
    pub fn write(&self) -> RwLockWriteGuard<'_, Component> {
        self.0.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns a copy of the current component value.
    #[must_use]
    pub fn snapshot(&self) -> Component {
        self.read().clone()
    }

    /// Returns `true` if both handles refer to the same component.
    #[must_use]
    pub fn ptr_eq(&self, other: &ComponentHandle) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl From<Component> for ComponentHandle {
    fn from(component: Component) -> Self {
        Self::new(component)
    }
}
