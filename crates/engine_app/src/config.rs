//! Engine configuration.
//!
//! Read from an optional JSON file; every field has a default, so an empty
//! object (or no file at all) is a valid configuration. Command-line flags
//! override the file.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::tick::TickConfig;

/// A statically registered plugin to load at startup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginEntry {
    /// Canonical plugin name.
    pub name: String,
    /// Whether scenes saved later should reference the plugin.
    #[serde(default)]
    pub save_with_scene: bool,
}

impl PluginEntry {
    /// A plugin entry not saved with the scene.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            save_with_scene: false,
        }
    }
}

/// Entities created at startup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpawnConfig {
    /// Number of entities.
    #[serde(default = "default_spawn_count")]
    pub count: usize,
    /// Component types attached to each entity.
    #[serde(default)]
    pub components: Vec<String>,
}

fn default_spawn_count() -> usize {
    1
}

/// Top-level engine configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Directory scanned for plugin libraries.
    pub plugin_dir: Option<PathBuf>,
    /// Plugins loaded by name.
    pub plugins: Vec<PluginEntry>,
    /// Start every system a loaded plugin provides.
    pub start_all: bool,
    /// Component systems started explicitly, in order.
    pub start_systems: Vec<String>,
    /// Entities created before the first frame.
    pub spawn: Vec<SpawnConfig>,
    /// Frame loop settings.
    pub tick: TickConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            plugin_dir: None,
            plugins: vec![PluginEntry::new("core")],
            start_all: false,
            start_systems: Vec::new(),
            spawn: Vec::new(),
            tick: TickConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Parse a configuration from JSON text.
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not a valid configuration.
    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text).context("invalid engine configuration")
    }

    /// Load a configuration file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        Self::from_json(&text).with_context(|| format!("in config file {}", path.display()))
    }
}
