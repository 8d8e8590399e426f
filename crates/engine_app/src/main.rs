//! # engine_app
//!
//! Driver binary for the entity core. Loads the configured plugins, starts
//! the requested component systems, spawns the initial entities and runs the
//! frame loop.
//!
//! ## Startup Sequence
//!
//! 1. Read the configuration file (optional) and apply command-line flags.
//! 2. Scan the plugin directory and load the named built-in plugins.
//! 3. Start systems, either all of them or the listed ones in order.
//! 4. Create the configured entities; missing systems start on demand.
//! 5. Run the frame loop, then shut the manager down.

mod config;
mod plugins;
mod tick;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::Parser;
use engine_component::TypeId;
use engine_message::MessageRegistry;
use engine_system::{ComponentPluginManager, EntityManager};
use tracing::info;
use tracing_subscriber::EnvFilter;

use config::{EngineConfig, PluginEntry};
use tick::FrameLoop;

#[derive(Debug, Parser)]
#[command(name = "engine_app", about = "Entity/component core driver")]
struct Args {
    /// Path to a JSON configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory scanned for plugin libraries
    #[arg(long)]
    plugin_dir: Option<PathBuf>,

    /// Built-in plugin to load (repeatable)
    #[arg(short, long = "plugin")]
    plugins: Vec<String>,

    /// Component system to start (repeatable)
    #[arg(short, long = "start")]
    start_systems: Vec<String>,

    /// Start every system the loaded plugins provide
    #[arg(long)]
    start_all: bool,

    /// Target frames per second
    #[arg(long)]
    tick_rate: Option<f64>,

    /// Number of frames to run (0 = unlimited)
    #[arg(short, long)]
    frames: Option<u64>,

    /// Simulation seconds per real second
    #[arg(long)]
    time_scale: Option<f64>,

    /// Run frames back to back instead of holding the tick rate
    #[arg(long)]
    no_sleep: bool,
}

impl Args {
    fn apply(&self, config: &mut EngineConfig) {
        if let Some(dir) = &self.plugin_dir {
            config.plugin_dir = Some(dir.clone());
        }
        for name in &self.plugins {
            if !config.plugins.iter().any(|entry| entry.name == *name) {
                config.plugins.push(PluginEntry::new(name.clone()));
            }
        }
        config.start_systems.extend(self.start_systems.iter().cloned());
        config.start_all |= self.start_all;
        if let Some(rate) = self.tick_rate {
            config.tick.tick_rate = rate;
        }
        if let Some(frames) = self.frames {
            config.tick.max_frames = frames;
        }
        if let Some(scale) = self.time_scale {
            config.tick.time_scale = scale;
        }
        if self.no_sleep {
            config.tick.realtime = false;
        }
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let args = Args::parse();
    let mut config = match &args.config {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::default(),
    };
    args.apply(&mut config);

    validate(&config)?;

    let manager = bootstrap(&config)?;
    info!(
        manager = %manager.id(),
        systems = manager.entity_system_types().len(),
        entities = manager.entity_count(),
        "engine ready"
    );

    let mut frames = FrameLoop::new(Arc::clone(&manager), config.tick.clone());
    frames.run();

    let flushed = manager.shutdown();
    info!(
        manager = %manager.id(),
        frames = frames.frame(),
        simulation_time = frames.simulation_time(),
        flushed,
        "engine shutting down"
    );
    Ok(())
}

fn validate(config: &EngineConfig) -> Result<()> {
    let rate = config.tick.tick_rate;
    if !(rate.is_finite() && rate > 0.0) {
        bail!("tick rate must be a positive number, got {rate}");
    }
    Ok(())
}

/// Build a manager according to `config`: load plugins, start systems and
/// spawn the initial entities.
fn bootstrap(config: &EngineConfig) -> Result<Arc<EntityManager>> {
    let messages = Arc::new(MessageRegistry::with_core_messages());
    let plugins = Arc::new(ComponentPluginManager::new(plugins::builtin_table(), messages));

    if let Some(dir) = &config.plugin_dir {
        let types = plugins.load_plugins_in_dir(dir);
        info!(dir = %dir.display(), types = types.len(), "scanned plugin directory");
    }
    for entry in &config.plugins {
        plugins.load_plugin(&entry.name, entry.save_with_scene);
        if !plugins.loaded_plugins().contains(&entry.name) {
            bail!("plugin {:?} could not be loaded", entry.name);
        }
    }

    let manager = EntityManager::with_plugin_manager(Arc::clone(&plugins));

    if config.start_all {
        let started = plugins
            .start_all_entity_systems(&manager)
            .context("failed to start entity systems")?;
        info!(count = started.len(), "started all entity systems");
    }
    for name in &config.start_systems {
        plugins
            .start_entity_system(&manager, &TypeId::new(name.as_str()))
            .with_context(|| format!("failed to start entity system {name}"))?;
    }

    for spawn in &config.spawn {
        for _ in 0..spawn.count {
            let id = manager.create_entity();
            for component in &spawn.components {
                manager
                    .create_component(id, &TypeId::new(component.as_str()))
                    .with_context(|| format!("failed to create {component} for {id}"))?;
            }
        }
    }

    Ok(manager)
}
