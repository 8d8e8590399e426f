//! # engine_system
//!
//! Entity and component system bookkeeping.
//!
//! This crate provides:
//!
//! - [`ComponentSystem`] — the contract every component store implements,
//!   with [`DefaultComponentSystem`] as a ready-made map-backed store.
//! - [`EntityManager`] — the facade owning entities, the component system
//!   registry with its type hierarchy, deletion callbacks and a
//!   [`MessagePump`](engine_message::MessagePump).
//! - [`ComponentPluginManager`] — loads [`ComponentPlugin`]s from a
//!   [`PluginTable`] and starts the systems their factories build in
//!   dependency order.
//!
//! ## Usage
//!
//! ```rust
//! use engine_component::{PropertyBag, TypeId};
//! use engine_system::{ComponentPluginManager, EntityManager, SystemFactory};
//! use std::sync::Arc;
//!
//! let plugins = Arc::new(ComponentPluginManager::default());
//! plugins
//!     .add_factory(Box::new(SystemFactory::default_system("Transform", PropertyBag::new())))
//!     .unwrap();
//!
//! let manager = EntityManager::with_plugin_manager(plugins);
//! let entity = manager.create_entity();
//!
//! // The Transform system is started on first use.
//! let transform = manager.create_component(entity, &TypeId::new("Transform")).unwrap();
//! assert_eq!(transform.read().entity(), entity);
//! ```

pub mod default_system;
pub mod entity_registry;
pub mod error;
pub mod hierarchy;
pub mod manager;
pub mod plugin;
pub mod system;

pub use default_system::DefaultComponentSystem;
pub use entity_registry::Entity;
pub use error::{ManagerError, PluginError};
pub use hierarchy::{HierarchyError, TypeHierarchy};
pub use manager::{EntityManager, ManagerId};
pub use plugin::{
    ComponentPlugin, ComponentPluginManager, ComponentSystemFactory, PluginTable, SystemFactory,
};
pub use system::{ComponentDeletedCallback, ComponentSystem};
