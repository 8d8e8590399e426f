//! The [`EntityManager`] facade.
//!
//! One manager owns the entity registry, the component system registry with
//! its type hierarchy, the deletion callbacks and a [`MessagePump`]. Component
//! requests are routed to the system registered for the component type; a
//! missing system is started on demand through the
//! [`ComponentPluginManager`].
//!
//! Every registry sits behind its own lock, and no lock is held while a
//! system hook, a deletion callback or a message handler runs. Systems and
//! handlers may therefore call back into the manager. Handlers that need the
//! manager should capture [`EntityManager::downgrade`] rather than an `Arc`,
//! otherwise the manager is never dropped.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock, Weak};

use engine_component::{ComponentHandle, ComponentType, EntityId, MessageType};
use engine_message::{Message, MessageHandler, MessagePump, RegisterOptions};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::entity_registry::{Entity, EntityRegistry};
use crate::error::ManagerError;
use crate::hierarchy::{HierarchyError, TypeHierarchy};
use crate::plugin::ComponentPluginManager;
use crate::system::{ComponentDeletedCallback, ComponentSystem};

/// Random identifier of one manager instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ManagerId(Uuid);

impl ManagerId {
    fn random() -> Self {
        Self(Uuid::new_v4())
    }

    /// Returns the underlying UUID.
    #[must_use]
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for ManagerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Entities, component systems and messaging of one simulation.
pub struct EntityManager {
    id: ManagerId,
    self_ref: Weak<EntityManager>,
    entities: EntityRegistry,
    systems: RwLock<BTreeMap<ComponentType, Arc<dyn ComponentSystem>>>,
    hierarchy: RwLock<TypeHierarchy>,
    deletion_callbacks: RwLock<Vec<Arc<dyn ComponentDeletedCallback>>>,
    pump: MessagePump,
    plugins: Arc<ComponentPluginManager>,
}

impl EntityManager {
    /// Create a manager with an empty plugin manager.
    #[must_use]
    pub fn new() -> Arc<Self> {
        Self::with_plugin_manager(Arc::new(ComponentPluginManager::default()))
    }

    /// Create a manager that starts missing systems through `plugins`.
    #[must_use]
    pub fn with_plugin_manager(plugins: Arc<ComponentPluginManager>) -> Arc<Self> {
        let manager = Arc::new_cyclic(|self_ref| Self {
            id: ManagerId::random(),
            self_ref: self_ref.clone(),
            entities: EntityRegistry::new(),
            systems: RwLock::new(BTreeMap::new()),
            hierarchy: RwLock::new(TypeHierarchy::new()),
            deletion_callbacks: RwLock::new(Vec::new()),
            pump: MessagePump::new(),
            plugins,
        });
        info!(manager = %manager.id, "entity manager created");
        manager
    }

    /// Returns this manager's id.
    #[must_use]
    pub fn id(&self) -> ManagerId {
        self.id
    }

    /// Returns a weak reference to this manager, for handlers and systems
    /// that need to call back into it.
    #[must_use]
    pub fn downgrade(&self) -> Weak<EntityManager> {
        self.self_ref.clone()
    }

    /// Returns the plugin manager used for lazy system starts.
    #[must_use]
    pub fn plugin_manager(&self) -> &Arc<ComponentPluginManager> {
        &self.plugins
    }

    // ── Entities ────────────────────────────────────────────────────────────

    /// Create a new entity with no components.
    pub fn create_entity(&self) -> EntityId {
        self.entities.create(self.self_ref.clone())
    }

    /// Returns the entity with the given id.
    #[must_use]
    pub fn get_entity(&self, id: EntityId) -> Option<Entity> {
        self.entities.get(id)
    }

    /// Returns `true` if the entity exists.
    #[must_use]
    pub fn entity_exists(&self, id: EntityId) -> bool {
        self.entities.contains(id)
    }

    /// Returns the ids of all live entities in ascending order.
    #[must_use]
    pub fn entity_ids(&self) -> Vec<EntityId> {
        self.entities.ids()
    }

    /// Returns the number of live entities.
    #[must_use]
    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    /// Destroy an entity and every component attached to it.
    ///
    /// Deletion callbacks run for each component before it is deleted. Returns
    /// `false` without side effects if the entity does not exist.
    pub fn kill_entity(&self, id: EntityId) -> bool {
        if !self.entities.contains(id) {
            return false;
        }

        for system in self.entity_systems() {
            if !system.has_component(id) {
                continue;
            }
            let component_type = system.component_type();
            self.notify_component_deleted(&component_type, id);
            system.delete_component(id);
        }

        let removed = self.entities.remove(id);
        if removed {
            debug!(manager = %self.id, entity = %id, "killed entity");
        }
        removed
    }

    /// Destroy every entity, taking each out of the scene first. Returns how
    /// many were killed.
    pub fn kill_all_entities(&self) -> usize {
        self.entities
            .ids()
            .into_iter()
            .filter(|&id| {
                self.remove_from_scene(id);
                self.kill_entity(id)
            })
            .count()
    }

    /// Announce that the entity entered the scene by emitting
    /// `EntityAddedToSceneMessage`. Returns `false` if the entity does not
    /// exist.
    pub fn add_to_scene(&self, id: EntityId) -> bool {
        if !self.entities.contains(id) {
            warn!(manager = %self.id, entity = %id, "cannot add unknown entity to scene");
            return false;
        }
        self.pump.emit_message(&Message::entity_added_to_scene(id));
        true
    }

    /// Announce that the entity left the scene by emitting
    /// `EntityRemovedFromSceneMessage`. Returns `false` if the entity does not
    /// exist.
    pub fn remove_from_scene(&self, id: EntityId) -> bool {
        if !self.entities.contains(id) {
            warn!(manager = %self.id, entity = %id, "cannot remove unknown entity from scene");
            return false;
        }
        self.pump.emit_message(&Message::entity_removed_from_scene(id));
        true
    }

    // ── Entity systems ──────────────────────────────────────────────────────

    /// Returns `true` if a system is registered for the component type.
    #[must_use]
    pub fn has_entity_system(&self, component_type: &ComponentType) -> bool {
        self.systems
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(component_type)
    }

    /// Returns the system registered for the component type.
    #[must_use]
    pub fn get_entity_system(&self, component_type: &ComponentType) -> Option<Arc<dyn ComponentSystem>> {
        self.systems
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(component_type)
            .cloned()
    }

    /// Returns every registered system, ordered by component type.
    #[must_use]
    pub fn entity_systems(&self) -> Vec<Arc<dyn ComponentSystem>> {
        self.systems
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect()
    }

    /// Returns the component types of every registered system.
    #[must_use]
    pub fn entity_system_types(&self) -> Vec<ComponentType> {
        self.systems
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect()
    }

    /// Register a component system.
    ///
    /// On success the system's [`on_added_to_entity_manager`] hook runs and an
    /// `EntitySystemAddedMessage` is emitted.
    ///
    /// # Errors
    ///
    /// Returns [`ManagerError::DuplicateRegistration`] if a system for the
    /// type is already registered, and [`ManagerError::HierarchyCycle`] if the
    /// system's base type would make the type hierarchy cyclic. The registry is
    /// unchanged in both cases.
    ///
    /// [`on_added_to_entity_manager`]: ComponentSystem::on_added_to_entity_manager
    pub fn add_entity_system(&self, system: Arc<dyn ComponentSystem>) -> Result<(), ManagerError> {
        let component_type = system.component_type();
        {
            let mut systems = self.systems.write().unwrap_or_else(PoisonError::into_inner);
            if systems.contains_key(&component_type) {
                warn!(
                    manager = %self.id,
                    component_type = %component_type,
                    "entity system already registered"
                );
                return Err(ManagerError::DuplicateRegistration(component_type));
            }

            if let Some(base) = system.base_type().filter(|base| !base.is_none()) {
                let mut hierarchy = self.hierarchy.write().unwrap_or_else(PoisonError::into_inner);
                match hierarchy.link(&component_type, &base) {
                    Ok(()) => {}
                    Err(HierarchyError::Cycle { derived, base }) => {
                        warn!(manager = %self.id, %derived, %base, "rejected cyclic base type");
                        return Err(ManagerError::HierarchyCycle { derived, base });
                    }
                    Err(HierarchyError::AlreadyLinked { derived, .. }) => {
                        return Err(ManagerError::DuplicateRegistration(derived));
                    }
                }
            }

            systems.insert(component_type.clone(), Arc::clone(&system));
        }

        system.on_added_to_entity_manager(self);
        self.pump
            .emit_message(&Message::entity_system_added(&component_type, system.properties()));
        info!(manager = %self.id, component_type = %component_type, "added entity system");
        Ok(())
    }

    /// Unregister the system for the component type.
    ///
    /// The system's [`on_remove_from_entity_manager`] hook runs and an
    /// `EntitySystemRemovedMessage` is emitted before it is erased. Returns
    /// `false` if no system was registered.
    ///
    /// [`on_remove_from_entity_manager`]: ComponentSystem::on_remove_from_entity_manager
    pub fn remove_entity_system(&self, component_type: &ComponentType) -> bool {
        let Some(system) = self.get_entity_system(component_type) else {
            return false;
        };

        system.on_remove_from_entity_manager(self);
        self.pump
            .emit_message(&Message::entity_system_removed(component_type));

        let removed = self
            .systems
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(component_type)
            .is_some();
        self.hierarchy
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .unlink(component_type);

        if removed {
            info!(manager = %self.id, component_type = %component_type, "removed entity system");
        }
        removed
    }

    /// Returns the component types deriving directly or indirectly from
    /// `base`, in lookup order.
    #[must_use]
    pub fn derived_types(&self, base: &ComponentType) -> Vec<ComponentType> {
        self.hierarchy
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .descendants(base)
    }

    // ── Components ──────────────────────────────────────────────────────────

    /// Returns the entity's component of the given type.
    ///
    /// With `search_derived` set, a component of a type deriving from
    /// `component_type` is returned when the entity has none of the exact type.
    /// Derived types are searched depth first, in registration order.
    #[must_use]
    pub fn get_component(
        &self,
        id: EntityId,
        component_type: &ComponentType,
        search_derived: bool,
    ) -> Option<ComponentHandle> {
        let exact = self
            .get_entity_system(component_type)
            .and_then(|system| system.get_component(id));
        if exact.is_some() || !search_derived {
            return exact;
        }

        self.derived_types(component_type)
            .iter()
            .filter_map(|derived| self.get_entity_system(derived))
            .find_map(|system| system.get_component(id))
    }

    /// Returns `true` if [`get_component`](Self::get_component) would find a
    /// component.
    #[must_use]
    pub fn has_component(&self, id: EntityId, component_type: &ComponentType, search_derived: bool) -> bool {
        self.get_component(id, component_type, search_derived).is_some()
    }

    /// Returns every component attached to the entity, ordered by type.
    #[must_use]
    pub fn components(&self, id: EntityId) -> Vec<ComponentHandle> {
        self.entity_systems()
            .iter()
            .filter_map(|system| system.get_component(id))
            .collect()
    }

    /// Create a component of the given type for the entity.
    ///
    /// If no system is registered for the type but the plugin manager has a
    /// factory for it, the system is started first.
    ///
    /// # Errors
    ///
    /// - [`ManagerError::EntityNotFound`] if the entity does not exist.
    /// - [`ManagerError::NoSuchEntitySystem`] if no system is registered and
    ///   no factory can start one.
    /// - [`ManagerError::Plugin`] if starting the system failed.
    /// - [`ManagerError::DuplicateComponent`] if the entity already has one.
    pub fn create_component(
        &self,
        id: EntityId,
        component_type: &ComponentType,
    ) -> Result<ComponentHandle, ManagerError> {
        if !self.entities.contains(id) {
            return Err(ManagerError::EntityNotFound(id));
        }

        let system = match self.get_entity_system(component_type) {
            Some(system) => system,
            None => {
                if !self.plugins.factory_exists(component_type) {
                    return Err(ManagerError::NoSuchEntitySystem(component_type.clone()));
                }
                debug!(
                    manager = %self.id,
                    component_type = %component_type,
                    "starting entity system on demand"
                );
                self.plugins.start_entity_system(self, component_type)?;
                self.get_entity_system(component_type)
                    .ok_or_else(|| ManagerError::NoSuchEntitySystem(component_type.clone()))?
            }
        };

        system.create_component(id)
    }

    /// Delete the entity's component of the given type, running the deletion
    /// callbacks first. Returns `false` if there was no such component.
    pub fn delete_component(&self, id: EntityId, component_type: &ComponentType) -> bool {
        let Some(system) = self.get_entity_system(component_type) else {
            return false;
        };
        if !system.has_component(id) {
            return false;
        }
        self.notify_component_deleted(component_type, id);
        system.delete_component(id)
    }

    // ── Deletion callbacks ──────────────────────────────────────────────────

    /// Register a callback notified before any component is deleted.
    pub fn add_deletion_callback(&self, callback: Arc<dyn ComponentDeletedCallback>) {
        self.deletion_callbacks
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(callback);
    }

    /// Remove a previously added callback. Returns `false` if it was not
    /// registered.
    pub fn remove_deletion_callback(&self, callback: &Arc<dyn ComponentDeletedCallback>) -> bool {
        let mut callbacks = self
            .deletion_callbacks
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let Some(pos) = callbacks
            .iter()
            .position(|existing| std::ptr::addr_eq(Arc::as_ptr(existing), Arc::as_ptr(callback)))
        else {
            return false;
        };
        callbacks.remove(pos);
        true
    }

    fn notify_component_deleted(&self, component_type: &ComponentType, id: EntityId) {
        let callbacks = self
            .deletion_callbacks
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        for callback in callbacks {
            callback.component_deleted(component_type, id);
        }
    }

    // ── Messaging ───────────────────────────────────────────────────────────

    /// Returns the manager's message pump.
    #[must_use]
    pub fn message_pump(&self) -> &MessagePump {
        &self.pump
    }

    /// See [`MessagePump::register_for_messages`].
    pub fn register_for_messages(
        &self,
        message_type: MessageType,
        handler: MessageHandler,
        options: RegisterOptions,
    ) {
        self.pump.register_for_messages(message_type, handler, options);
    }

    /// See [`MessagePump::unregister_for_messages`].
    pub fn unregister_for_messages(&self, message_type: &MessageType, handler: &MessageHandler) -> bool {
        self.pump.unregister_for_messages(message_type, handler)
    }

    /// See [`MessagePump::emit_message`].
    pub fn emit_message(&self, message: &Message) -> usize {
        self.pump.emit_message(message)
    }

    /// See [`MessagePump::enqueue_message`].
    pub fn enqueue_message(&self, message: &Message, due: f64) {
        self.pump.enqueue_message(message, due);
    }

    /// See [`MessagePump::emit_queued_messages`].
    pub fn emit_queued_messages(&self, now: f64) -> usize {
        self.pump.emit_queued_messages(now)
    }

    // ── Shutdown ────────────────────────────────────────────────────────────

    /// Deliver every queued message regardless of its due time, then discard
    /// whatever those handlers enqueued in turn. Returns the number of
    /// messages delivered.
    ///
    /// Call this while the manager is still shared, so handlers holding a
    /// [`downgrade`](Self::downgrade) reference can still reach it. Dropping
    /// the manager runs the same step, but by then those references no longer
    /// upgrade. Calling it again only delivers messages queued since.
    pub fn shutdown(&self) -> usize {
        let flushed = self.pump.emit_queued_messages(f64::INFINITY);
        let discarded = self.pump.clear_queue();
        if discarded > 0 {
            warn!(manager = %self.id, discarded, "discarding messages queued during shutdown");
        }
        debug!(manager = %self.id, flushed, "flushed message queue");
        flushed
    }
}

impl fmt::Debug for EntityManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityManager")
            .field("id", &self.id)
            .field("entities", &self.entities.len())
            .field("systems", &self.entity_system_types())
            .finish_non_exhaustive()
    }
}

impl Drop for EntityManager {
    fn drop(&mut self) {
        let flushed = self.shutdown();

        for system in self.entity_systems() {
            system.on_remove_from_entity_manager(self);
        }

        let entities = self.entities.clear();
        let systems = {
            let mut systems = self.systems.write().unwrap_or_else(PoisonError::into_inner);
            let count = systems.len();
            systems.clear();
            count
        };
        *self.hierarchy.write().unwrap_or_else(PoisonError::into_inner) = TypeHierarchy::new();

        info!(manager = %self.id, flushed, entities, systems, "entity manager shut down");
    }
}
