//! The component system contract.
//!
//! A [`ComponentSystem`] owns every component of one component type. The
//! [`EntityManager`] holds one system per type and routes component requests
//! to it; rendering, physics, audio and the other engine subsystems plug in
//! by implementing this trait.
//!
//! All methods take `&self`. Systems are shared between the manager and the
//! message handlers they register, so implementations keep their stores behind
//! their own locks and must not hold those locks while calling back into the
//! manager.

use engine_component::{ComponentHandle, ComponentType, EntityId, PropertyBag};

use crate::error::ManagerError;
use crate::manager::EntityManager;

/// Owner, store and behaviour of all components of one type.
pub trait ComponentSystem: Send + Sync {
    /// The component type this system manages.
    fn component_type(&self) -> ComponentType;

    /// The type this system's components derive from, if any.
    ///
    /// Looking up a component of the base type with `search_derived` set
    /// returns components of this system.
    fn base_type(&self) -> Option<ComponentType> {
        None
    }

    /// Called once after the system has been created and configured, before
    /// it is added to a manager.
    fn finished(&self) {}

    /// Called after the system has been added to `manager`.
    fn on_added_to_entity_manager(&self, _manager: &EntityManager) {}

    /// Called before the system is removed from `manager`, and when the
    /// manager shuts down.
    fn on_remove_from_entity_manager(&self, _manager: &EntityManager) {}

    /// Returns `true` if the entity has a component in this system.
    fn has_component(&self, entity: EntityId) -> bool;

    /// Create a component for the entity.
    ///
    /// The manager checks that the entity exists before calling this.
    ///
    /// # Errors
    ///
    /// Returns [`ManagerError::DuplicateComponent`] if the entity already has
    /// a component of this type.
    fn create_component(&self, entity: EntityId) -> Result<ComponentHandle, ManagerError>;

    /// Delete the entity's component. Returns `false` if there was none.
    ///
    /// Prefer [`EntityManager::delete_component`], which also runs the
    /// deletion callbacks.
    fn delete_component(&self, entity: EntityId) -> bool;

    /// Returns the entity's component.
    fn get_component(&self, entity: EntityId) -> Option<ComponentHandle>;

    /// Returns every entity with a component in this system.
    fn entities(&self) -> Vec<EntityId>;

    /// System-wide properties, published with the system-added message.
    fn properties(&self) -> PropertyBag {
        PropertyBag::new()
    }
}

/// Observer notified right before a component is removed.
///
/// Used to invalidate wrappers (script handles, editor views) that refer to
/// the component.
pub trait ComponentDeletedCallback: Send + Sync {
    /// A component of `component_type` attached to `entity` is about to be
    /// deleted.
    fn component_deleted(&self, component_type: &ComponentType, entity: EntityId);
}

impl<F> ComponentDeletedCallback for F
where
    F: Fn(&ComponentType, EntityId) + Send + Sync,
{
    fn component_deleted(&self, component_type: &ComponentType, entity: EntityId) {
        self(component_type, entity);
    }
}
