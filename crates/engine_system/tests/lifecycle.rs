//! End-to-end behaviour of the entity manager together with the plugin
//! manager and the message pump.

use std::sync::{Arc, Mutex};

use engine_component::{ComponentHandle, ComponentType, EntityId, PropertyBag, TypeId};
use engine_message::message::{ENTITY_SYSTEM_ADDED, ENTITY_SYSTEM_REMOVED};
use engine_message::{Message, MessageHandler, RegisterOptions};
use engine_system::{
    ComponentDeletedCallback, ComponentPluginManager, ComponentSystem, DefaultComponentSystem,
    EntityManager, ManagerError, PluginError, SystemFactory,
};
use proptest::prelude::*;

type Log = Arc<Mutex<Vec<String>>>;

fn default_factory(name: &str) -> SystemFactory {
    SystemFactory::default_system(name, PropertyBag::new())
}

fn manager_with(factories: Vec<SystemFactory>) -> Arc<EntityManager> {
    let plugins = Arc::new(ComponentPluginManager::default());
    for factory in factories {
        plugins.add_factory(Box::new(factory)).unwrap();
    }
    EntityManager::with_plugin_manager(plugins)
}

fn record_added(manager: &EntityManager) -> Log {
    let log: Log = Arc::default();
    let sink = Arc::clone(&log);
    manager.register_for_messages(
        ENTITY_SYSTEM_ADDED,
        MessageHandler::new(move |message: &Message| {
            if let Some(ty) = message.component_type() {
                sink.lock().unwrap().push(ty.name().to_owned());
            }
        }),
        RegisterOptions::new().named("added-recorder"),
    );
    log
}

/// Delegates storage to a [`DefaultComponentSystem`] and records its
/// lifecycle hooks.
struct RecordingSystem {
    inner: DefaultComponentSystem,
    log: Log,
}

impl RecordingSystem {
    fn new(name: &str, log: &Log) -> Self {
        Self {
            inner: DefaultComponentSystem::new(TypeId::new(name)),
            log: Arc::clone(log),
        }
    }

    fn push(&self, event: &str) {
        let name = self.inner.component_type();
        self.log.lock().unwrap().push(format!("{event} {name}"));
    }
}

impl ComponentSystem for RecordingSystem {
    fn component_type(&self) -> ComponentType {
        self.inner.component_type()
    }

    fn finished(&self) {
        self.push("finished");
    }

    fn on_added_to_entity_manager(&self, _manager: &EntityManager) {
        self.push("added");
    }

    fn on_remove_from_entity_manager(&self, _manager: &EntityManager) {
        self.push("removed");
    }

    fn has_component(&self, entity: EntityId) -> bool {
        self.inner.has_component(entity)
    }

    fn create_component(&self, entity: EntityId) -> Result<ComponentHandle, ManagerError> {
        self.inner.create_component(entity)
    }

    fn delete_component(&self, entity: EntityId) -> bool {
        self.inner.delete_component(entity)
    }

    fn get_component(&self, entity: EntityId) -> Option<ComponentHandle> {
        self.inner.get_component(entity)
    }

    fn entities(&self) -> Vec<EntityId> {
        self.inner.entities()
    }
}

// ── Scenarios ───────────────────────────────────────────────────────────────

#[test]
fn test_component_lifecycle_scenario() {
    let manager = EntityManager::new();
    let position = TypeId::new("Position");

    let id = manager.create_entity();
    assert_eq!(id, EntityId(1));

    let err = manager.create_component(id, &position).unwrap_err();
    assert!(matches!(err, ManagerError::NoSuchEntitySystem(ref ty) if *ty == position));

    manager
        .add_entity_system(Arc::new(DefaultComponentSystem::new(position.clone())))
        .unwrap();
    manager.create_component(id, &position).unwrap();

    let log: Log = Arc::default();
    let sink = Arc::clone(&log);
    let observer = Arc::downgrade(&manager);
    let callback: Arc<dyn ComponentDeletedCallback> =
        Arc::new(move |ty: &ComponentType, entity: EntityId| {
            let alive = observer
                .upgrade()
                .is_some_and(|manager| manager.get_entity(entity).is_some());
            sink.lock()
                .unwrap()
                .push(format!("{ty} {entity} alive={alive}"));
        });
    manager.add_deletion_callback(callback);

    assert!(manager.kill_entity(id));
    assert_eq!(*log.lock().unwrap(), vec!["Position Entity(1) alive=true"]);
    assert!(manager.get_entity(id).is_none());
    assert!(manager.get_component(id, &position, false).is_none());
}

#[test]
fn test_dependency_start_scenario() {
    let manager = manager_with(vec![
        default_factory("Physics").depends_on("Transform"),
        default_factory("Transform"),
    ]);
    let added = record_added(&manager);

    manager
        .plugin_manager()
        .start_entity_system(&manager, &TypeId::new("Physics"))
        .unwrap();

    assert!(manager.has_entity_system(&TypeId::new("Transform")));
    assert!(manager.has_entity_system(&TypeId::new("Physics")));
    assert_eq!(*added.lock().unwrap(), vec!["Transform", "Physics"]);

    // Starting again is a no-op.
    manager
        .plugin_manager()
        .start_entity_system(&manager, &TypeId::new("Physics"))
        .unwrap();
    assert_eq!(added.lock().unwrap().len(), 2);
}

#[test]
fn test_unsatisfied_dependency_starts_nothing() {
    let manager = manager_with(vec![default_factory("A").depends_on("B")]);
    let added = record_added(&manager);

    let err = manager
        .plugin_manager()
        .start_entity_system(&manager, &TypeId::new("A"))
        .unwrap_err();

    assert!(matches!(
        err,
        PluginError::UnsatisfiedDependency { ref system, ref dependency }
            if *system == TypeId::new("A") && *dependency == TypeId::new("B")
    ));
    assert!(!manager.has_entity_system(&TypeId::new("A")));
    assert!(added.lock().unwrap().is_empty());
}

#[test]
fn test_dependency_cycle_reported_through_create_component() {
    let manager = manager_with(vec![
        default_factory("A").depends_on("B"),
        default_factory("B").depends_on("A"),
    ]);
    let id = manager.create_entity();

    let err = manager.create_component(id, &TypeId::new("A")).unwrap_err();
    assert!(matches!(
        err,
        ManagerError::Plugin(PluginError::DependencyCycle(_))
    ));
    assert!(manager.entity_system_types().is_empty());
}

#[test]
fn test_no_factory_for_start() {
    let manager = EntityManager::new();
    let err = manager
        .plugin_manager()
        .start_entity_system(&manager, &TypeId::new("Ghost"))
        .unwrap_err();
    assert!(matches!(err, PluginError::NoSuchFactory(_)));
}

#[test]
fn test_lazy_start_on_create_component() {
    let manager = manager_with(vec![
        default_factory("Physics").depends_on("Transform"),
        default_factory("Transform"),
    ]);
    let id = manager.create_entity();

    manager.create_component(id, &TypeId::new("Physics")).unwrap();
    assert!(manager.has_entity_system(&TypeId::new("Transform")));

    // After removal the factory brings the system back on demand.
    assert!(manager.remove_entity_system(&TypeId::new("Physics")));
    assert!(!manager.has_entity_system(&TypeId::new("Physics")));
    let other = manager.create_entity();
    manager.create_component(other, &TypeId::new("Physics")).unwrap();
    assert!(manager.has_entity_system(&TypeId::new("Physics")));
}

#[test]
fn test_removed_system_without_factory_fails() {
    let manager = EntityManager::new();
    let position = TypeId::new("Position");
    manager
        .add_entity_system(Arc::new(DefaultComponentSystem::new(position.clone())))
        .unwrap();
    assert!(manager.remove_entity_system(&position));

    let id = manager.create_entity();
    let err = manager.create_component(id, &position).unwrap_err();
    assert!(matches!(err, ManagerError::NoSuchEntitySystem(_)));
}

#[test]
fn test_failed_start_rolls_back() {
    let broken = SystemFactory::new("Physics", |_| {
        let system: Arc<dyn ComponentSystem> =
            Arc::new(DefaultComponentSystem::new(TypeId::new("NotPhysics")));
        Ok(system)
    })
    .depends_on("Transform");
    let manager = manager_with(vec![broken, default_factory("Transform")]);

    let removed: Log = Arc::default();
    let sink = Arc::clone(&removed);
    manager.register_for_messages(
        ENTITY_SYSTEM_REMOVED,
        MessageHandler::new(move |message: &Message| {
            if let Some(ty) = message.component_type() {
                sink.lock().unwrap().push(ty.name().to_owned());
            }
        }),
        RegisterOptions::new(),
    );

    let err = manager
        .plugin_manager()
        .start_entity_system(&manager, &TypeId::new("Physics"))
        .unwrap_err();
    assert!(matches!(err, PluginError::FactoryTypeMismatch { .. }));
    assert!(!manager.has_entity_system(&TypeId::new("Transform")));
    assert_eq!(*removed.lock().unwrap(), vec!["Transform"]);
}

#[test]
fn test_create_failure_propagates() {
    let failing = SystemFactory::new("Audio", |_| {
        Err(PluginError::CreateFailed {
            component_type: TypeId::new("Audio"),
            reason: "no output device".to_owned(),
        })
    });
    let manager = manager_with(vec![failing]);
    let id = manager.create_entity();
    let err = manager.create_component(id, &TypeId::new("Audio")).unwrap_err();
    assert!(matches!(
        err,
        ManagerError::Plugin(PluginError::CreateFailed { .. })
    ));
}

#[test]
fn test_start_all_entity_systems() {
    let manager = manager_with(vec![
        default_factory("Render").depends_on("Transform"),
        default_factory("Physics").depends_on("Transform"),
        default_factory("Transform"),
    ]);
    let added = record_added(&manager);

    let started = manager
        .plugin_manager()
        .start_all_entity_systems(&manager)
        .unwrap();

    assert_eq!(started.len(), 3);
    assert_eq!(started[0], TypeId::new("Transform"));
    assert_eq!(added.lock().unwrap()[0], "Transform");
    assert_eq!(manager.entity_system_types().len(), 3);

    let removed = manager.plugin_manager().unload_all_plugins(&manager);
    assert_eq!(removed.len(), 3);
    assert!(manager.entity_system_types().is_empty());
}

#[test]
fn test_hooks_run_in_order() {
    let log: Log = Arc::default();
    let hooks = Arc::clone(&log);
    let factory = SystemFactory::new("Sound", move |_| {
        let system: Arc<dyn ComponentSystem> = Arc::new(RecordingSystem::new("Sound", &hooks));
        Ok(system)
    });
    let manager = manager_with(vec![factory]);

    manager
        .plugin_manager()
        .start_entity_system(&manager, &TypeId::new("Sound"))
        .unwrap();
    assert!(manager.remove_entity_system(&TypeId::new("Sound")));

    assert_eq!(
        *log.lock().unwrap(),
        vec!["finished Sound", "added Sound", "removed Sound"]
    );
}

#[test]
fn test_handler_can_reenter_manager() {
    let manager = manager_with(vec![default_factory("Transform")]);
    manager
        .add_entity_system(Arc::new(DefaultComponentSystem::new(TypeId::new("Camera"))))
        .unwrap();

    // The handler creates an entity and its components mid-dispatch, which
    // also starts the Transform system.
    let weak = manager.downgrade();
    manager.register_for_messages(
        TypeId::new("SpawnMessage"),
        MessageHandler::new(move |_| {
            let Some(manager) = weak.upgrade() else {
                return;
            };
            let id = manager.create_entity();
            manager.create_component(id, &TypeId::new("Camera")).unwrap();
            manager.create_component(id, &TypeId::new("Transform")).unwrap();
        }),
        RegisterOptions::new(),
    );

    assert_eq!(manager.emit_message(&Message::new(TypeId::new("SpawnMessage"))), 1);
    let id = manager.entity_ids()[0];
    assert_eq!(manager.components(id).len(), 2);
}

#[test]
fn test_queued_messages_delivered_once() {
    let manager = EntityManager::new();
    let ping = TypeId::new("PingMessage");
    let count = Arc::new(Mutex::new(0));
    let sink = Arc::clone(&count);
    manager.register_for_messages(
        ping.clone(),
        MessageHandler::new(move |_| *sink.lock().unwrap() += 1),
        RegisterOptions::new(),
    );

    manager.enqueue_message(&Message::new(ping), 2.0);
    assert_eq!(manager.emit_queued_messages(1.0), 0);
    assert_eq!(manager.message_pump().pending_count(), 1);
    assert_eq!(manager.emit_queued_messages(2.0), 1);
    assert_eq!(manager.emit_queued_messages(10.0), 0);
    assert_eq!(*count.lock().unwrap(), 1);
}

#[test]
fn test_teardown_flushes_before_notifying_systems() {
    let log: Log = Arc::default();
    let manager = EntityManager::new();
    manager
        .add_entity_system(Arc::new(RecordingSystem::new("Sound", &log)))
        .unwrap();

    let sink = Arc::clone(&log);
    let late = TypeId::new("LateMessage");
    manager.register_for_messages(
        late.clone(),
        MessageHandler::new(move |_| sink.lock().unwrap().push("late message".to_owned())),
        RegisterOptions::new(),
    );
    manager.enqueue_message(&Message::new(late), 1_000.0);

    log.lock().unwrap().clear();
    drop(manager);

    assert_eq!(*log.lock().unwrap(), vec!["late message", "removed Sound"]);
}

#[test]
fn test_entities_of_distinct_managers() {
    let a = EntityManager::new();
    let b = EntityManager::new();
    assert_ne!(a.id(), b.id());
    let id = a.create_entity();
    assert_eq!(b.create_entity(), id);
    assert!(a.get_entity(id).unwrap().belongs_to(&a));
    assert!(!b.get_entity(id).unwrap().belongs_to(&a));
}

proptest! {
    #[test]
    fn test_entity_ids_strictly_increase(kills in proptest::collection::vec(any::<bool>(), 1..64)) {
        let manager = EntityManager::new();
        let mut last = EntityId::INVALID;
        for kill in kills {
            let id = manager.create_entity();
            prop_assert!(id > last);
            last = id;
            if kill {
                prop_assert!(manager.kill_entity(id));
                prop_assert!(!manager.kill_entity(id));
            }
        }
    }
}
