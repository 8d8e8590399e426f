//! Plugin loading and dependency-ordered system startup.
//!
//! The [`ComponentPluginManager`] collects [`ComponentSystemFactory`]s from
//! plugins and starts the systems they build on an [`EntityManager`], always
//! starting a system's dependencies before the system itself.
//!
//! Two start strategies are offered:
//!
//! - [`start_entity_system`](ComponentPluginManager::start_entity_system)
//!   starts one type and whatever it depends on. The dependency closure is
//!   planned depth first with an in-progress set before anything is created.
//! - [`start_all_entity_systems`](ComponentPluginManager::start_all_entity_systems)
//!   starts every known factory in a topological order (Kahn's algorithm).
//!
//! Both report [`PluginError::UnsatisfiedDependency`] and
//! [`PluginError::DependencyCycle`] before any system is started. If creating
//! or registering a system fails midway, the systems already started by that
//! call are removed again.

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};

use engine_component::ComponentType;
use engine_message::MessageRegistry;
use tracing::{debug, error, info, warn};

use super::factory::ComponentSystemFactory;
use super::table::PluginTable;
use crate::error::PluginError;
use crate::manager::EntityManager;

type FactoryMap = BTreeMap<ComponentType, Arc<dyn ComponentSystemFactory>>;

// ── Library names ───────────────────────────────────────────────────────────

/// Returns the platform's shared library extension, without the dot.
#[must_use]
pub fn lib_extension() -> &'static str {
    std::env::consts::DLL_EXTENSION
}

const DEBUG_POSTFIX: &str = if cfg!(all(windows, debug_assertions)) { "d" } else { "" };

/// Returns the file name of the shared library for a plugin, e.g.
/// `libphysics.so` on Linux or `physics.dll` on Windows.
#[must_use]
pub fn shared_lib_name(plugin: &str) -> String {
    format!(
        "{}{plugin}{DEBUG_POSTFIX}.{}",
        std::env::consts::DLL_PREFIX,
        lib_extension()
    )
}

/// Returns the canonical plugin name of a library path.
///
/// Strips the directory, the platform library prefix, every extension and,
/// on Windows debug builds, the `d` debug postfix.
#[must_use]
pub fn plugin_name_from_path(path: &Path) -> Option<String> {
    let file_name = path.file_name()?.to_str()?;
    let stem = file_name.split('.').next().unwrap_or(file_name);
    let stem = stem
        .strip_prefix(std::env::consts::DLL_PREFIX)
        .filter(|rest| !rest.is_empty())
        .unwrap_or(stem);
    let stem = stem
        .strip_suffix(DEBUG_POSTFIX)
        .filter(|rest| !rest.is_empty())
        .unwrap_or(stem);
    (!stem.is_empty()).then(|| stem.to_owned())
}

fn has_lib_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext == lib_extension())
}

// ── Plugin manager ──────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
struct LoadedPlugin {
    save_with_scene: bool,
    component_types: BTreeSet<ComponentType>,
}

/// Factory registry and dependency-ordered system starter.
pub struct ComponentPluginManager {
    table: PluginTable,
    messages: Arc<MessageRegistry>,
    factories: RwLock<FactoryMap>,
    loaded: RwLock<BTreeMap<String, LoadedPlugin>>,
}

impl ComponentPluginManager {
    /// Create a plugin manager resolving plugin names through `table` and
    /// registering plugin message schemas into `messages`.
    #[must_use]
    pub fn new(table: PluginTable, messages: Arc<MessageRegistry>) -> Self {
        Self {
            table,
            messages,
            factories: RwLock::new(BTreeMap::new()),
            loaded: RwLock::new(BTreeMap::new()),
        }
    }

    /// Returns the plugin table.
    #[must_use]
    pub fn table(&self) -> &PluginTable {
        &self.table
    }

    /// Returns the message registry plugins register into.
    #[must_use]
    pub fn message_registry(&self) -> &Arc<MessageRegistry> {
        &self.messages
    }

    // ── Loading ─────────────────────────────────────────────────────────────

    /// Load every plugin library in `dir`, in file name order.
    ///
    /// Only files with the platform library extension are considered. Does
    /// nothing if `dir` is not a directory. Returns the newly available
    /// component types.
    pub fn load_plugins_in_dir(&self, dir: &Path) -> BTreeSet<ComponentType> {
        if !dir.is_dir() {
            debug!(dir = %dir.display(), "plugin directory does not exist");
            return BTreeSet::new();
        }

        let entries = match std::fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(err) => {
                warn!(dir = %dir.display(), error = %err, "failed to read plugin directory");
                return BTreeSet::new();
            }
        };

        let mut paths: Vec<PathBuf> = entries
            .filter_map(Result::ok)
            .map(|entry| entry.path())
            .filter(|path| path.is_file() && has_lib_extension(path))
            .collect();
        paths.sort();

        let mut types = BTreeSet::new();
        for path in paths {
            types.extend(self.add_plugin(&path, false));
        }
        types
    }

    /// Load the plugin named `plugin` from `dir`, looking for its platform
    /// library file name there.
    pub fn add_plugin_from_dir(&self, dir: &Path, plugin: &str, save_with_scene: bool) -> BTreeSet<ComponentType> {
        self.add_plugin(&dir.join(shared_lib_name(plugin)), save_with_scene)
    }

    /// Load the plugin library at `path`.
    ///
    /// The plugin is looked up in the table under the canonical name derived
    /// from the path. Loading a plugin twice only updates its
    /// `save_with_scene` flag. Failures are logged and yield an empty set.
    ///
    /// Returns the component types whose factories were added.
    pub fn add_plugin(&self, path: &Path, save_with_scene: bool) -> BTreeSet<ComponentType> {
        match self.try_add_plugin(path, save_with_scene) {
            Ok(types) => types,
            Err(err) => {
                error!(error = %err, "plugin not loaded");
                BTreeSet::new()
            }
        }
    }

    fn try_add_plugin(&self, path: &Path, save_with_scene: bool) -> Result<BTreeSet<ComponentType>, PluginError> {
        let failure = |reason: &str| PluginError::PluginLoadFailure {
            path: path.to_path_buf(),
            reason: reason.to_owned(),
        };

        let name = plugin_name_from_path(path).ok_or_else(|| failure("invalid plugin file name"))?;
        if self.mark_reloaded(&name, save_with_scene) {
            return Ok(BTreeSet::new());
        }
        if !path.is_file() {
            return Err(failure("file not found"));
        }
        self.install(&name, path, save_with_scene)
    }

    /// Load a statically linked plugin by canonical name.
    ///
    /// Behaves like [`add_plugin`](Self::add_plugin) without a library file.
    pub fn load_plugin(&self, name: &str, save_with_scene: bool) -> BTreeSet<ComponentType> {
        if self.mark_reloaded(name, save_with_scene) {
            return BTreeSet::new();
        }
        match self.install(name, Path::new(name), save_with_scene) {
            Ok(types) => types,
            Err(err) => {
                error!(error = %err, "plugin not loaded");
                BTreeSet::new()
            }
        }
    }

    fn mark_reloaded(&self, name: &str, save_with_scene: bool) -> bool {
        let mut loaded = self.loaded.write().unwrap_or_else(PoisonError::into_inner);
        match loaded.get_mut(name) {
            Some(plugin) => {
                plugin.save_with_scene = save_with_scene;
                debug!(plugin = name, "plugin already loaded");
                true
            }
            None => false,
        }
    }

    fn install(&self, name: &str, path: &Path, save_with_scene: bool) -> Result<BTreeSet<ComponentType>, PluginError> {
        let plugin = self.table.get(name).ok_or_else(|| PluginError::PluginLoadFailure {
            path: path.to_path_buf(),
            reason: format!("no plugin registered under the name {name:?}"),
        })?;

        let mut factories = Vec::new();
        plugin.create_factories(&mut factories);

        let mut types = BTreeSet::new();
        for factory in factories {
            match self.add_factory(factory) {
                Ok(component_type) => {
                    types.insert(component_type);
                }
                Err(err) => warn!(plugin = name, error = %err, "skipping factory"),
            }
        }

        if types.is_empty() {
            return Err(PluginError::PluginLoadFailure {
                path: path.to_path_buf(),
                reason: "plugin provides no factories".to_owned(),
            });
        }

        plugin.register_messages(&self.messages);

        self.loaded
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(
                name.to_owned(),
                LoadedPlugin {
                    save_with_scene,
                    component_types: types.clone(),
                },
            );
        info!(plugin = name, factories = types.len(), "loaded plugin");
        Ok(types)
    }

    /// Returns the names of the loaded plugins.
    #[must_use]
    pub fn loaded_plugins(&self) -> Vec<String> {
        self.loaded
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect()
    }

    /// Returns `true` if the plugin is loaded and flagged to be saved with the
    /// scene.
    #[must_use]
    pub fn save_with_scene(&self, name: &str) -> bool {
        self.loaded
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .is_some_and(|plugin| plugin.save_with_scene)
    }

    /// Returns the component types a loaded plugin provides.
    #[must_use]
    pub fn plugin_types(&self, name: &str) -> Option<BTreeSet<ComponentType>> {
        self.loaded
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .map(|plugin| plugin.component_types.clone())
    }

    // ── Factories ───────────────────────────────────────────────────────────

    /// Register a factory.
    ///
    /// # Errors
    ///
    /// Returns [`PluginError::DuplicateFactory`] if a factory for the same
    /// component type exists.
    pub fn add_factory(&self, factory: Box<dyn ComponentSystemFactory>) -> Result<ComponentType, PluginError> {
        let component_type = factory.component_type();
        let mut factories = self.factories.write().unwrap_or_else(PoisonError::into_inner);
        if factories.contains_key(&component_type) {
            return Err(PluginError::DuplicateFactory(component_type));
        }
        factories.insert(component_type.clone(), Arc::from(factory));
        debug!(component_type = %component_type, "registered factory");
        Ok(component_type)
    }

    /// Returns `true` if a factory exists for the component type.
    #[must_use]
    pub fn factory_exists(&self, component_type: &ComponentType) -> bool {
        self.factories
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(component_type)
    }

    /// Returns the declared dependencies of the factory for the type.
    #[must_use]
    pub fn factory_dependencies(&self, component_type: &ComponentType) -> Option<Vec<ComponentType>> {
        self.factories
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(component_type)
            .map(|factory| factory.dependencies().to_vec())
    }

    /// Returns the component types of every registered factory.
    #[must_use]
    pub fn factory_types(&self) -> Vec<ComponentType> {
        self.factories
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect()
    }

    fn factory_snapshot(&self) -> FactoryMap {
        self.factories
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    // ── Starting systems ────────────────────────────────────────────────────

    /// Start the system for `component_type` on `manager`, starting its
    /// dependencies first. Succeeds immediately if it is already running.
    ///
    /// # Errors
    ///
    /// - [`PluginError::NoSuchFactory`] if there is no factory for the type.
    /// - [`PluginError::UnsatisfiedDependency`] if a dependency has no
    ///   factory and is not running.
    /// - [`PluginError::DependencyCycle`] if the dependencies are cyclic.
    /// - [`PluginError::CreateFailed`], [`PluginError::FactoryTypeMismatch`] or
    ///   [`PluginError::Registration`] if a system could not be brought up.
    ///   Systems started by this call are removed again.
    pub fn start_entity_system(&self, manager: &EntityManager, component_type: &ComponentType) -> Result<(), PluginError> {
        if manager.has_entity_system(component_type) {
            return Ok(());
        }

        let factories = self.factory_snapshot();
        let plan = plan_start(component_type, &factories, |ty| manager.has_entity_system(ty))?;
        debug!(
            component_type = %component_type,
            plan = ?plan.iter().map(ComponentType::name).collect::<Vec<_>>(),
            "starting entity systems"
        );
        self.instantiate(manager, &plan, &factories)
    }

    /// Start every system that has a factory and is not running yet, in
    /// dependency order. Returns the types started, in start order.
    ///
    /// # Errors
    ///
    /// As for [`start_entity_system`](Self::start_entity_system). Dependency
    /// errors are reported before anything is started.
    pub fn start_all_entity_systems(&self, manager: &EntityManager) -> Result<Vec<ComponentType>, PluginError> {
        let factories = self.factory_snapshot();
        let order = topological_order(&factories, |ty| manager.has_entity_system(ty))?;
        self.instantiate(manager, &order, &factories)?;
        Ok(order)
    }

    /// Remove every running system that one of the registered factories
    /// provides. Returns the removed types.
    pub fn unload_all_plugins(&self, manager: &EntityManager) -> Vec<ComponentType> {
        let removed: Vec<ComponentType> = self
            .factory_types()
            .into_iter()
            .filter(|ty| manager.remove_entity_system(ty))
            .collect();
        if !removed.is_empty() {
            info!(count = removed.len(), "unloaded plugin systems");
        }
        removed
    }

    fn instantiate(&self, manager: &EntityManager, plan: &[ComponentType], factories: &FactoryMap) -> Result<(), PluginError> {
        let mut started: Vec<ComponentType> = Vec::new();
        for component_type in plan {
            if manager.has_entity_system(component_type) {
                continue;
            }
            if let Err(err) = start_one(manager, component_type, factories) {
                for ty in started.iter().rev() {
                    manager.remove_entity_system(ty);
                }
                warn!(
                    component_type = %component_type,
                    rolled_back = started.len(),
                    error = %err,
                    "entity system start failed"
                );
                return Err(err);
            }
            started.push(component_type.clone());
        }
        Ok(())
    }
}

impl Default for ComponentPluginManager {
    fn default() -> Self {
        Self::new(PluginTable::new(), Arc::new(MessageRegistry::with_core_messages()))
    }
}

impl fmt::Debug for ComponentPluginManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentPluginManager")
            .field("table", &self.table)
            .field("factories", &self.factory_types())
            .field("loaded", &self.loaded_plugins())
            .finish_non_exhaustive()
    }
}

fn start_one(manager: &EntityManager, component_type: &ComponentType, factories: &FactoryMap) -> Result<(), PluginError> {
    let factory = factories
        .get(component_type)
        .ok_or_else(|| PluginError::NoSuchFactory(component_type.clone()))?;

    let system = factory.create(manager)?;
    let actual = system.component_type();
    if actual != *component_type {
        return Err(PluginError::FactoryTypeMismatch {
            expected: component_type.clone(),
            actual,
        });
    }

    system.finished();
    manager
        .add_entity_system(system)
        .map_err(|source| PluginError::Registration {
            component_type: component_type.clone(),
            source: Box::new(source),
        })?;
    info!(component_type = %component_type, "started entity system");
    Ok(())
}

// ── Ordering ────────────────────────────────────────────────────────────────

/// Depth-first plan for starting `root` and the dependencies it needs.
///
/// Types already running (per `running`) are skipped together with their
/// dependencies. The result lists every dependency before its dependents,
/// with dependencies visited in declaration order.
fn plan_start(
    root: &ComponentType,
    factories: &FactoryMap,
    running: impl Fn(&ComponentType) -> bool,
) -> Result<Vec<ComponentType>, PluginError> {
    struct Planner<'a, R> {
        factories: &'a FactoryMap,
        running: R,
        in_progress: Vec<ComponentType>,
        done: BTreeSet<ComponentType>,
        plan: Vec<ComponentType>,
    }

    impl<R: Fn(&ComponentType) -> bool> Planner<'_, R> {
        fn visit(&mut self, ty: &ComponentType, required_by: Option<&ComponentType>) -> Result<(), PluginError> {
            if self.done.contains(ty) || (self.running)(ty) {
                return Ok(());
            }
            if let Some(pos) = self.in_progress.iter().position(|t| t == ty) {
                let mut cycle = self.in_progress[pos..].to_vec();
                cycle.push(ty.clone());
                return Err(PluginError::DependencyCycle(cycle));
            }
            let factories = self.factories;
            let Some(factory) = factories.get(ty) else {
                return Err(match required_by {
                    Some(system) => PluginError::UnsatisfiedDependency {
                        system: system.clone(),
                        dependency: ty.clone(),
                    },
                    None => PluginError::NoSuchFactory(ty.clone()),
                });
            };

            self.in_progress.push(ty.clone());
            for dependency in factory.dependencies() {
                self.visit(dependency, Some(ty))?;
            }
            self.in_progress.pop();

            self.done.insert(ty.clone());
            self.plan.push(ty.clone());
            Ok(())
        }
    }

    let mut planner = Planner {
        factories,
        running,
        in_progress: Vec::new(),
        done: BTreeSet::new(),
        plan: Vec::new(),
    };
    planner.visit(root, None)?;
    Ok(planner.plan)
}

/// Topological start order of every factory whose system is not running.
///
/// Kahn's algorithm:
/// 1. Check every dependency is either running or has a factory.
/// 2. Seed a queue with the types whose dependencies are all running.
/// 3. Pop a type, append it to the order and release its dependents.
/// 4. Types left over when the queue drains lie on a cycle.
///
/// Ties are broken by component type order, so the result is deterministic.
fn topological_order(
    factories: &FactoryMap,
    running: impl Fn(&ComponentType) -> bool,
) -> Result<Vec<ComponentType>, PluginError> {
    let pending: BTreeMap<&ComponentType, BTreeSet<&ComponentType>> = factories
        .iter()
        .filter(|&(ty, _)| !running(ty))
        .map(|(ty, factory)| (ty, factory.dependencies().iter().collect()))
        .collect();

    for (ty, dependencies) in &pending {
        for &dependency in dependencies {
            if !pending.contains_key(dependency) && !running(dependency) {
                return Err(PluginError::UnsatisfiedDependency {
                    system: (*ty).clone(),
                    dependency: dependency.clone(),
                });
            }
        }
    }

    let mut waiting_on: BTreeMap<&ComponentType, usize> = BTreeMap::new();
    let mut dependents: BTreeMap<&ComponentType, Vec<&ComponentType>> = BTreeMap::new();
    for (&ty, dependencies) in &pending {
        let unstarted: Vec<&ComponentType> = dependencies
            .iter()
            .copied()
            .filter(|dependency| pending.contains_key(dependency))
            .collect();
        waiting_on.insert(ty, unstarted.len());
        for dependency in unstarted {
            dependents.entry(dependency).or_default().push(ty);
        }
    }

    let mut ready: VecDeque<&ComponentType> = waiting_on
        .iter()
        .filter(|&(_, &count)| count == 0)
        .map(|(&ty, _)| ty)
        .collect();
    let mut order = Vec::with_capacity(pending.len());

    while let Some(ty) = ready.pop_front() {
        order.push(ty.clone());
        for &dependent in dependents.get(ty).into_iter().flatten() {
            if let Some(count) = waiting_on.get_mut(dependent) {
                *count -= 1;
                if *count == 0 {
                    ready.push_back(dependent);
                }
            }
        }
    }

    if order.len() < pending.len() {
        return Err(PluginError::DependencyCycle(find_cycle(&pending, &waiting_on)));
    }
    Ok(order)
}

/// Follow unresolved dependencies from a blocked type until one repeats.
fn find_cycle(
    pending: &BTreeMap<&ComponentType, BTreeSet<&ComponentType>>,
    waiting_on: &BTreeMap<&ComponentType, usize>,
) -> Vec<ComponentType> {
    let blocked = |ty: &ComponentType| waiting_on.get(ty).is_some_and(|&count| count > 0);

    let mut path: Vec<&ComponentType> = Vec::new();
    let mut cursor = waiting_on.iter().find(|&(_, &count)| count > 0).map(|(&ty, _)| ty);
    while let Some(ty) = cursor {
        if let Some(pos) = path.iter().position(|&seen| seen == ty) {
            let mut cycle: Vec<ComponentType> = path[pos..].iter().map(|&t| t.clone()).collect();
            cycle.push(ty.clone());
            return cycle;
        }
        path.push(ty);
        cursor = pending
            .get(ty)
            .and_then(|dependencies| dependencies.iter().copied().find(|&dep| blocked(dep)));
    }
    path.into_iter().cloned().collect()
}

#[cfg(test)]
mod tests {
    use engine_component::{PropertyBag, TypeId};

    use super::*;
    use crate::plugin::{ComponentPlugin, SystemFactory};

    fn factory(name: &str, dependencies: &[&str]) -> Box<dyn ComponentSystemFactory> {
        let mut factory = SystemFactory::default_system(name, PropertyBag::new());
        for &dependency in dependencies {
            factory = factory.depends_on(dependency);
        }
        Box::new(factory)
    }

    fn names(types: &[ComponentType]) -> Vec<&str> {
        types.iter().map(ComponentType::name).collect()
    }

    struct Physics;

    impl ComponentPlugin for Physics {
        fn name(&self) -> &str {
            "physics"
        }

        fn register_messages(&self, registry: &MessageRegistry) {
            registry.register(TypeId::new("CollisionMessage"), PropertyBag::new().with("impulse", 0.0));
        }

        fn create_factories(&self, factories: &mut Vec<Box<dyn ComponentSystemFactory>>) {
            factories.push(factory("Transform", &[]));
            factories.push(factory("Physics", &["Transform"]));
        }
    }

    struct Announcer;

    impl ComponentPlugin for Announcer {
        fn name(&self) -> &str {
            "announcer"
        }

        fn register_messages(&self, registry: &MessageRegistry) {
            registry.register(TypeId::new("AnnouncementMessage"), PropertyBag::new());
        }

        fn create_factories(&self, _factories: &mut Vec<Box<dyn ComponentSystemFactory>>) {}
    }

    fn physics_manager() -> ComponentPluginManager {
        ComponentPluginManager::new(
            PluginTable::new().with(Physics),
            Arc::new(MessageRegistry::new()),
        )
    }

    #[test]
    fn test_shared_lib_name_round_trips() {
        let file = shared_lib_name("physics");
        assert!(file.ends_with(lib_extension()));
        assert_eq!(plugin_name_from_path(Path::new(&file)).as_deref(), Some("physics"));
        let nested = Path::new("plugins").join(&file);
        assert_eq!(plugin_name_from_path(&nested).as_deref(), Some("physics"));
    }

    #[test]
    fn test_plugin_name_rejects_empty() {
        assert_eq!(plugin_name_from_path(Path::new("")), None);
        assert_eq!(plugin_name_from_path(Path::new(".so")), None);
    }

    #[test]
    fn test_load_plugin_registers_factories_and_messages() {
        let plugins = physics_manager();
        let types = plugins.load_plugin("physics", true);
        assert_eq!(
            types,
            BTreeSet::from([TypeId::new("Transform"), TypeId::new("Physics")])
        );
        assert!(plugins.factory_exists(&TypeId::new("Physics")));
        assert_eq!(
            plugins.factory_dependencies(&TypeId::new("Physics")),
            Some(vec![TypeId::new("Transform")])
        );
        assert!(plugins.message_registry().is_registered(&TypeId::new("CollisionMessage")));
        assert_eq!(plugins.loaded_plugins(), vec!["physics".to_owned()]);
        assert!(plugins.save_with_scene("physics"));
    }

    #[test]
    fn test_reload_only_updates_flag() {
        let plugins = physics_manager();
        plugins.load_plugin("physics", true);
        assert!(plugins.load_plugin("physics", false).is_empty());
        assert!(!plugins.save_with_scene("physics"));
        assert_eq!(plugins.factory_types().len(), 2);
    }

    #[test]
    fn test_unknown_plugin_is_empty() {
        let plugins = physics_manager();
        assert!(plugins.load_plugin("render", false).is_empty());
        assert!(plugins.loaded_plugins().is_empty());
    }

    #[test]
    fn test_rejected_plugin_registers_no_messages() {
        let plugins = ComponentPluginManager::new(
            PluginTable::new().with(Announcer),
            Arc::new(MessageRegistry::new()),
        );
        assert!(plugins.load_plugin("announcer", false).is_empty());
        assert!(plugins.loaded_plugins().is_empty());
        assert!(!plugins
            .message_registry()
            .is_registered(&TypeId::new("AnnouncementMessage")));
    }

    #[test]
    fn test_add_plugin_missing_file() {
        let plugins = physics_manager();
        let missing = Path::new("/nonexistent").join(shared_lib_name("physics"));
        assert!(plugins.add_plugin(&missing, false).is_empty());
        assert!(!plugins.factory_exists(&TypeId::new("Physics")));
    }

    #[test]
    fn test_load_plugins_in_dir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(shared_lib_name("physics")), b"").unwrap();
        std::fs::write(dir.path().join(shared_lib_name("unknown")), b"").unwrap();
        std::fs::write(dir.path().join("readme.txt"), b"").unwrap();

        let plugins = physics_manager();
        let types = plugins.load_plugins_in_dir(dir.path());
        assert_eq!(types.len(), 2);
        assert_eq!(plugins.loaded_plugins(), vec!["physics".to_owned()]);
        assert!(!plugins.save_with_scene("physics"));
    }

    #[test]
    fn test_add_plugin_from_dir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(shared_lib_name("physics")), b"").unwrap();
        let plugins = physics_manager();
        assert_eq!(plugins.add_plugin_from_dir(dir.path(), "physics", true).len(), 2);
        assert!(plugins.save_with_scene("physics"));
    }

    #[test]
    fn test_load_plugins_in_missing_dir() {
        let plugins = physics_manager();
        assert!(plugins.load_plugins_in_dir(Path::new("/nonexistent/plugins")).is_empty());
    }

    #[test]
    fn test_duplicate_factory() {
        let plugins = ComponentPluginManager::default();
        plugins.add_factory(factory("Sound", &[])).unwrap();
        let err = plugins.add_factory(factory("Sound", &[])).unwrap_err();
        assert!(matches!(err, PluginError::DuplicateFactory(_)));
    }

    #[test]
    fn test_plan_orders_dependencies_first() {
        let plugins = ComponentPluginManager::default();
        plugins.add_factory(factory("A", &["B", "C"])).unwrap();
        plugins.add_factory(factory("B", &["C"])).unwrap();
        plugins.add_factory(factory("C", &[])).unwrap();
        let plan = plan_start(&TypeId::new("A"), &plugins.factory_snapshot(), |_| false).unwrap();
        assert_eq!(names(&plan), vec!["C", "B", "A"]);
    }

    #[test]
    fn test_plan_skips_running() {
        let plugins = ComponentPluginManager::default();
        plugins.add_factory(factory("A", &["B"])).unwrap();
        plugins.add_factory(factory("B", &["Missing"])).unwrap();
        let running = TypeId::new("B");
        let plan = plan_start(&TypeId::new("A"), &plugins.factory_snapshot(), |ty| *ty == running).unwrap();
        assert_eq!(names(&plan), vec!["A"]);
    }

    #[test]
    fn test_plan_reports_cycle_path() {
        let plugins = ComponentPluginManager::default();
        plugins.add_factory(factory("A", &["B"])).unwrap();
        plugins.add_factory(factory("B", &["C"])).unwrap();
        plugins.add_factory(factory("C", &["B"])).unwrap();
        let err = plan_start(&TypeId::new("A"), &plugins.factory_snapshot(), |_| false).unwrap_err();
        match err {
            PluginError::DependencyCycle(cycle) => assert_eq!(names(&cycle), vec!["B", "C", "B"]),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_topological_order() {
        let plugins = ComponentPluginManager::default();
        plugins.add_factory(factory("Render", &["Transform"])).unwrap();
        plugins.add_factory(factory("Physics", &["Transform"])).unwrap();
        plugins.add_factory(factory("Transform", &[])).unwrap();
        plugins.add_factory(factory("Audio", &[])).unwrap();
        let order = topological_order(&plugins.factory_snapshot(), |_| false).unwrap();
        assert_eq!(order.len(), 4);
        let position = |name: &str| order.iter().position(|ty| ty.name() == name).unwrap();
        assert!(position("Transform") < position("Physics"));
        assert!(position("Transform") < position("Render"));
    }

    #[test]
    fn test_topological_order_cycle() {
        let plugins = ComponentPluginManager::default();
        plugins.add_factory(factory("A", &["B"])).unwrap();
        plugins.add_factory(factory("B", &["A"])).unwrap();
        plugins.add_factory(factory("C", &[])).unwrap();
        let err = topological_order(&plugins.factory_snapshot(), |_| false).unwrap_err();
        match err {
            PluginError::DependencyCycle(cycle) => {
                assert_eq!(cycle.len(), 3);
                assert_eq!(cycle.first(), cycle.last());
                assert!(!names(&cycle).contains(&"C"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_topological_order_unsatisfied() {
        let plugins = ComponentPluginManager::default();
        plugins.add_factory(factory("A", &["Ghost"])).unwrap();
        let err = topological_order(&plugins.factory_snapshot(), |_| false).unwrap_err();
        assert!(matches!(err, PluginError::UnsatisfiedDependency { .. }));
    }
}
