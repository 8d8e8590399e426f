//! Built-in component plugins.
//!
//! The `core` plugin provides two systems:
//!
//! - `Transform`: a plain store of `position` vectors.
//! - `Physics` (depends on `Transform`): holds a `velocity` per entity and,
//!   on every tick, moves the entity's transform by `velocity * delta_sim_time`.
//!   Each moved entity is announced with a `TransformChangedMessage`.

use std::sync::{Arc, Mutex, PoisonError, Weak};

use engine_component::{ComponentHandle, ComponentType, EntityId, MessageType, PropertyBag, TypeId};
use engine_message::message::{PROP_DELTA_SIM_TIME, TICK};
use engine_message::{Message, MessageHandler, MessageRegistry, Order, RegisterOptions};
use engine_system::{
    ComponentPlugin, ComponentSystem, ComponentSystemFactory, DefaultComponentSystem, EntityManager,
    ManagerError, PluginTable, SystemFactory,
};
use glam::Vec3;
use tracing::{debug, warn};

/// Component type of the transform store.
pub const TRANSFORM: ComponentType = TypeId::from_static("Transform");

/// Component type of the physics system.
pub const PHYSICS: ComponentType = TypeId::from_static("Physics");

/// Emitted after the physics system moved an entity.
pub const TRANSFORM_CHANGED: MessageType = TypeId::from_static("TransformChangedMessage");

/// Transform property holding the entity position.
pub const PROP_POSITION: &str = "position";

/// Physics property holding the entity velocity.
pub const PROP_VELOCITY: &str = "velocity";

/// `TransformChangedMessage` property naming the moved entity.
pub const PROP_ENTITY: &str = "entity";

fn vec3_value(v: Vec3) -> Vec<f32> {
    v.to_array().to_vec()
}

/// Returns the table of every plugin compiled into the binary.
#[must_use]
pub fn builtin_table() -> PluginTable {
    PluginTable::new().with(CorePlugin)
}

/// Transform and physics systems.
#[derive(Debug, Default)]
pub struct CorePlugin;

impl ComponentPlugin for CorePlugin {
    fn name(&self) -> &str {
        "core"
    }

    fn register_messages(&self, registry: &MessageRegistry) {
        registry.register(
            TRANSFORM_CHANGED,
            PropertyBag::new()
                .with(PROP_ENTITY, 0)
                .with(PROP_POSITION, vec3_value(Vec3::ZERO)),
        );
    }

    fn create_factories(&self, factories: &mut Vec<Box<dyn ComponentSystemFactory>>) {
        factories.push(Box::new(SystemFactory::default_system(
            TRANSFORM.name(),
            PropertyBag::new().with(PROP_POSITION, vec3_value(Vec3::ZERO)),
        )));
        factories.push(Box::new(
            SystemFactory::new(PHYSICS.name(), |_| {
                let system: Arc<dyn ComponentSystem> = Arc::new(PhysicsSystem::new());
                Ok(system)
            })
            .depends_on(TRANSFORM),
        ));
    }
}

// ── Physics ─────────────────────────────────────────────────────────────────

/// Integrates velocities into transform positions on every tick.
#[derive(Debug)]
pub struct PhysicsSystem {
    store: DefaultComponentSystem,
    tick_handler: Mutex<Option<MessageHandler>>,
}

impl PhysicsSystem {
    /// Create the system. Components start at rest.
    #[must_use]
    pub fn new() -> Self {
        Self {
            store: DefaultComponentSystem::new(PHYSICS)
                .with_defaults(PropertyBag::new().with(PROP_VELOCITY, vec3_value(Vec3::ZERO)))
                .with_properties(PropertyBag::new().with("integrator", "euler")),
            tick_handler: Mutex::new(None),
        }
    }
}

impl Default for PhysicsSystem {
    fn default() -> Self {
        Self::new()
    }
}

/// Move every entity with a physics component by its velocity.
///
/// Returns the number of entities moved.
pub fn integrate(manager: &EntityManager, delta: f64) -> usize {
    let Some(physics) = manager.get_entity_system(&PHYSICS) else {
        return 0;
    };

    let mut moved = 0;
    for entity in physics.entities() {
        let Some(body) = physics.get_component(entity) else {
            continue;
        };
        let velocity: Vec3 = match body.read().properties.get_as(PROP_VELOCITY) {
            Ok(velocity) => velocity,
            Err(err) => {
                warn!(%entity, error = %err, "invalid velocity");
                continue;
            }
        };
        if velocity == Vec3::ZERO {
            continue;
        }

        let Some(transform) = manager.get_component(entity, &TRANSFORM, true) else {
            continue;
        };
        let Some(position) = advance(&transform, velocity * delta as f32) else {
            continue;
        };

        moved += 1;
        manager.emit_message(
            &Message::new(TRANSFORM_CHANGED)
                .with(PROP_ENTITY, entity.id())
                .with(PROP_POSITION, vec3_value(position)),
        );
    }
    moved
}

fn advance(transform: &ComponentHandle, offset: Vec3) -> Option<Vec3> {
    let mut component = transform.write();
    let position: Vec3 = component
        .properties
        .get_as(PROP_POSITION)
        .unwrap_or(Vec3::ZERO);
    let position = position + offset;
    match component.properties.set_from(PROP_POSITION, &position) {
        Ok(()) => Some(position),
        Err(err) => {
            warn!(error = %err, "could not store position");
            None
        }
    }
}

impl ComponentSystem for PhysicsSystem {
    fn component_type(&self) -> ComponentType {
        PHYSICS
    }

    fn on_added_to_entity_manager(&self, manager: &EntityManager) {
        let weak: Weak<EntityManager> = manager.downgrade();
        let handler = MessageHandler::new(move |message: &Message| {
            let Some(manager) = weak.upgrade() else {
                return;
            };
            let delta = message.properties.get_as::<f64>(PROP_DELTA_SIM_TIME).unwrap_or(0.0);
            let moved = integrate(&manager, delta);
            debug!(moved, delta, "physics step");
        });
        manager.register_for_messages(
            TICK,
            handler.clone(),
            RegisterOptions::new().order(Order::Early).named("physics"),
        );
        *self
            .tick_handler
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(handler);
    }

    fn on_remove_from_entity_manager(&self, manager: &EntityManager) {
        let handler = self
            .tick_handler
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handler) = handler {
            manager.unregister_for_messages(&TICK, &handler);
        }
    }

    fn has_component(&self, entity: EntityId) -> bool {
        self.store.has_component(entity)
    }

    fn create_component(&self, entity: EntityId) -> Result<ComponentHandle, ManagerError> {
        self.store.create_component(entity)
    }

    fn delete_component(&self, entity: EntityId) -> bool {
        self.store.delete_component(entity)
    }

    fn get_component(&self, entity: EntityId) -> Option<ComponentHandle> {
        self.store.get_component(entity)
    }

    fn entities(&self) -> Vec<EntityId> {
        self.store.entities()
    }

    fn properties(&self) -> PropertyBag {
        self.store.properties()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use engine_message::FrameTime;
    use engine_system::ComponentPluginManager;

    use super::*;

    fn core_manager() -> Arc<EntityManager> {
        let plugins = Arc::new(ComponentPluginManager::new(
            builtin_table(),
            Arc::new(MessageRegistry::with_core_messages()),
        ));
        assert_eq!(plugins.load_plugin("core", false).len(), 2);
        EntityManager::with_plugin_manager(plugins)
    }

    #[test]
    fn test_core_plugin_registers_schema() {
        let manager = core_manager();
        let registry = manager.plugin_manager().message_registry();
        let message = registry.create(&TRANSFORM_CHANGED).unwrap();
        assert!(message.properties.contains(PROP_POSITION));
    }

    #[test]
    fn test_physics_starts_transform_first() {
        let manager = core_manager();
        manager
            .plugin_manager()
            .start_entity_system(&manager, &PHYSICS)
            .unwrap();
        assert!(manager.has_entity_system(&TRANSFORM));
        assert!(manager.has_entity_system(&PHYSICS));
        assert_eq!(manager.message_pump().subscriber_count(&TICK), 1);
    }

    #[test]
    fn test_tick_moves_entities() {
        let manager = core_manager();
        let id = manager.create_entity();
        let body = manager.create_component(id, &PHYSICS).unwrap();
        let transform = manager.create_component(id, &TRANSFORM).unwrap();
        body.write()
            .properties
            .set_from(PROP_VELOCITY, &Vec3::new(2.0, 0.0, -1.0))
            .unwrap();

        let changed = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&changed);
        manager.register_for_messages(
            TRANSFORM_CHANGED,
            MessageHandler::new(move |message: &Message| {
                sink.lock().unwrap().push(message.properties.get_as::<u64>(PROP_ENTITY).unwrap());
            }),
            RegisterOptions::new(),
        );

        manager.emit_message(&Message::tick(&FrameTime {
            delta_sim_time: 0.5,
            delta_real_time: 0.5,
            simulation_time: 0.5,
            time_scale: 1.0,
            frame: 1,
        }));

        let position: Vec3 = transform.read().properties.get_as(PROP_POSITION).unwrap();
        assert_eq!(position, Vec3::new(1.0, 0.0, -0.5));
        assert_eq!(*changed.lock().unwrap(), vec![id.id()]);
    }

    #[test]
    fn test_entities_at_rest_do_not_move() {
        let manager = core_manager();
        let id = manager.create_entity();
        manager.create_component(id, &PHYSICS).unwrap();
        manager.create_component(id, &TRANSFORM).unwrap();
        assert_eq!(integrate(&manager, 1.0), 0);
    }

    #[test]
    fn test_removing_physics_unsubscribes() {
        let manager = core_manager();
        manager
            .plugin_manager()
            .start_entity_system(&manager, &PHYSICS)
            .unwrap();
        assert!(manager.remove_entity_system(&PHYSICS));
        assert_eq!(manager.message_pump().subscriber_count(&TICK), 0);
    }
}
