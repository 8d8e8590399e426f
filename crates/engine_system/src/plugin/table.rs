//! Statically registered plugins.
//!
//! A [`ComponentPlugin`] bundles the message schemas and system factories of
//! one engine feature. Plugins are compiled into the binary and listed in a
//! [`PluginTable`] under their canonical name, which is the name a plugin
//! library file maps to (see [`plugin_name_from_path`]).
//!
//! [`plugin_name_from_path`]: super::plugin_name_from_path

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use engine_message::MessageRegistry;
use tracing::warn;

use super::factory::ComponentSystemFactory;

/// A named set of message schemas and component system factories.
pub trait ComponentPlugin: Send + Sync {
    /// Canonical plugin name.
    fn name(&self) -> &str;

    /// Register the message types this plugin's systems emit.
    fn register_messages(&self, _registry: &MessageRegistry) {}

    /// Append this plugin's factories to `factories`.
    fn create_factories(&self, factories: &mut Vec<Box<dyn ComponentSystemFactory>>);
}

/// Registration table mapping canonical plugin names to plugins.
#[derive(Clone, Default)]
pub struct PluginTable {
    plugins: BTreeMap<String, Arc<dyn ComponentPlugin>>,
}

impl PluginTable {
    /// Create an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`register`](Self::register).
    #[must_use]
    pub fn with(mut self, plugin: impl ComponentPlugin + 'static) -> Self {
        self.register(Arc::new(plugin));
        self
    }

    /// Add a plugin under its name. Returns `false`, keeping the existing
    /// entry, if the name is taken.
    pub fn register(&mut self, plugin: Arc<dyn ComponentPlugin>) -> bool {
        let name = plugin.name().to_owned();
        if self.plugins.contains_key(&name) {
            warn!(plugin = %name, "plugin name already registered");
            return false;
        }
        self.plugins.insert(name, plugin);
        true
    }

    /// Returns the plugin registered under `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<dyn ComponentPlugin>> {
        self.plugins.get(name).cloned()
    }

    /// Returns `true` if a plugin is registered under `name`.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.plugins.contains_key(name)
    }

    /// Returns every registered name in order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.plugins.keys().map(String::as_str)
    }

    /// Returns the number of registered plugins.
    #[must_use]
    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    /// Returns `true` if no plugin is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }
}

impl fmt::Debug for PluginTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.plugins.keys()).finish()
    }
}
