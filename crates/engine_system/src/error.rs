//! Error types of the entity manager and the plugin manager.

use std::path::PathBuf;

use engine_component::{ComponentType, EntityId};

/// Errors raised by [`EntityManager`](crate::EntityManager) operations.
#[derive(Debug, thiserror::Error)]
pub enum ManagerError {
    /// A system for this component type is already registered.
    #[error("entity system already registered: {0}")]
    DuplicateRegistration(ComponentType),

    /// No system is registered for the type and no factory can start one.
    #[error("no entity system of type {0}")]
    NoSuchEntitySystem(ComponentType),

    /// The entity already owns a component of this type.
    #[error("{entity} already has a component of type {component_type}")]
    DuplicateComponent {
        /// The component type.
        component_type: ComponentType,
        /// The entity.
        entity: EntityId,
    },

    /// The entity does not exist.
    #[error("entity not found: {0}")]
    EntityNotFound(EntityId),

    /// Registering the system would make the type hierarchy cyclic.
    #[error("base type {base} of {derived} would create a cycle in the type hierarchy")]
    HierarchyCycle {
        /// The type being registered.
        derived: ComponentType,
        /// Its declared base type.
        base: ComponentType,
    },

    /// A lazy start through the plugin manager failed.
    #[error("could not start entity system: {0}")]
    Plugin(#[from] PluginError),
}

/// Errors raised by [`ComponentPluginManager`](crate::ComponentPluginManager)
/// operations.
#[derive(Debug, thiserror::Error)]
pub enum PluginError {
    /// No factory is registered for the type.
    #[error("no factory for component type {0}")]
    NoSuchFactory(ComponentType),

    /// A dependency of the requested system has no factory.
    #[error("cannot start {system}: it depends on {dependency}, which has no factory")]
    UnsatisfiedDependency {
        /// The system whose dependency is missing.
        system: ComponentType,
        /// The missing dependency.
        dependency: ComponentType,
    },

    /// The factory dependencies form a cycle.
    #[error("dependency cycle: {}", format_cycle(.0))]
    DependencyCycle(Vec<ComponentType>),

    /// A plugin could not be loaded.
    #[error("failed to load plugin {}: {reason}", .path.display())]
    PluginLoadFailure {
        /// Path (or name) of the plugin.
        path: PathBuf,
        /// What went wrong.
        reason: String,
    },

    /// A factory for the type is already registered.
    #[error("factory already registered for {0}")]
    DuplicateFactory(ComponentType),

    /// A factory produced a system for a different type than it declared.
    #[error("factory for {expected} created a system of type {actual}")]
    FactoryTypeMismatch {
        /// The type the factory is registered under.
        expected: ComponentType,
        /// The type of the system it created.
        actual: ComponentType,
    },

    /// A factory failed to create its system.
    #[error("factory for {component_type} failed: {reason}")]
    CreateFailed {
        /// The component type.
        component_type: ComponentType,
        /// What went wrong.
        reason: String,
    },

    /// The created system was rejected by the entity manager.
    #[error("could not register {component_type}: {source}")]
    Registration {
        /// The component type.
        component_type: ComponentType,
        /// The manager's error.
        #[source]
        source: Box<ManagerError>,
    },
}

fn format_cycle(cycle: &[ComponentType]) -> String {
    cycle
        .iter()
        .map(ComponentType::name)
        .collect::<Vec<_>>()
        .join(" -> ")
}
