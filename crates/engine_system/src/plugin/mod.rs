//! Plugins, factories and the plugin manager.

pub mod factory;
pub mod manager;
pub mod table;

pub use factory::{ComponentSystemFactory, SystemFactory};
pub use manager::{ComponentPluginManager, lib_extension, plugin_name_from_path, shared_lib_name};
pub use table::{ComponentPlugin, PluginTable};
