//! Component system factories.

use std::fmt;
use std::sync::Arc;

use engine_component::{ComponentType, PropertyBag, TypeId};

use crate::default_system::DefaultComponentSystem;
use crate::error::PluginError;
use crate::manager::EntityManager;
use crate::system::ComponentSystem;

/// Constructor for one component system, plus the component types it needs
/// to be running first.
pub trait ComponentSystemFactory: Send + Sync {
    /// The factory name. Doubles as the component type name by default.
    fn name(&self) -> &str;

    /// The component type of the systems this factory creates.
    fn component_type(&self) -> ComponentType {
        TypeId::new(self.name())
    }

    /// Component types whose systems must be started before this one.
    fn dependencies(&self) -> &[ComponentType] {
        &[]
    }

    /// Create the system.
    ///
    /// # Errors
    ///
    /// Returns [`PluginError::CreateFailed`] if the system cannot be built.
    fn create(&self, manager: &EntityManager) -> Result<Arc<dyn ComponentSystem>, PluginError>;
}

type CreateFn = dyn Fn(&EntityManager) -> Result<Arc<dyn ComponentSystem>, PluginError> + Send + Sync;

/// A [`ComponentSystemFactory`] built from a closure.
///
/// ```rust
/// use engine_system::{ComponentSystem, DefaultComponentSystem, SystemFactory};
/// use std::sync::Arc;
///
/// let factory = SystemFactory::new("Physics", |_manager| {
///     let system: Arc<dyn ComponentSystem> =
///         Arc::new(DefaultComponentSystem::new("Physics".into()));
///     Ok(system)
/// })
/// .depends_on("Transform");
/// ```
pub struct SystemFactory {
    name: String,
    component_type: ComponentType,
    dependencies: Vec<ComponentType>,
    create: Box<CreateFn>,
}

impl SystemFactory {
    /// Create a factory named `name` that builds its system with `create`.
    pub fn new<F>(name: impl Into<String>, create: F) -> Self
    where
        F: Fn(&EntityManager) -> Result<Arc<dyn ComponentSystem>, PluginError> + Send + Sync + 'static,
    {
        let name = name.into();
        Self {
            component_type: TypeId::new(name.clone()),
            name,
            dependencies: Vec::new(),
            create: Box::new(create),
        }
    }

    /// A factory creating a [`DefaultComponentSystem`] whose components start
    /// with `defaults`.
    pub fn default_system(name: impl Into<String>, defaults: PropertyBag) -> Self {
        let name = name.into();
        let component_type = TypeId::new(name.clone());
        Self::new(name, move |_| {
            let system: Arc<dyn ComponentSystem> = Arc::new(
                DefaultComponentSystem::new(component_type.clone()).with_defaults(defaults.clone()),
            );
            Ok(system)
        })
    }

    /// Declare a dependency on another component type.
    #[must_use]
    pub fn depends_on(mut self, dependency: impl Into<ComponentType>) -> Self {
        self.dependencies.push(dependency.into());
        self
    }
}

impl ComponentSystemFactory for SystemFactory {
    fn name(&self) -> &str {
        &self.name
    }

    fn component_type(&self) -> ComponentType {
        self.component_type.clone()
    }

    fn dependencies(&self) -> &[ComponentType] {
        &self.dependencies
    }

    fn create(&self, manager: &EntityManager) -> Result<Arc<dyn ComponentSystem>, PluginError> {
        (self.create)(manager)
    }
}

impl fmt::Debug for SystemFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SystemFactory")
            .field("name", &self.name)
            .field("dependencies", &self.dependencies)
            .finish_non_exhaustive()
    }
}
