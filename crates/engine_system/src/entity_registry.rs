//! Entity identities and the registry that owns them.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock, Weak};

use engine_component::{EntityAllocator, EntityId};
use tracing::debug;

use crate::manager::EntityManager;

/// A live entity: its id plus a back-reference to the manager that owns it.
#[derive(Clone)]
pub struct Entity {
    id: EntityId,
    manager: Weak<EntityManager>,
}

impl Entity {
    /// Returns the entity's id.
    #[must_use]
    pub fn id(&self) -> EntityId {
        self.id
    }

    /// Returns the owning manager, if it is still alive.
    #[must_use]
    pub fn manager(&self) -> Option<Arc<EntityManager>> {
        self.manager.upgrade()
    }

    /// Returns `true` if the entity was created by `manager`.
    #[must_use]
    pub fn belongs_to(&self, manager: &EntityManager) -> bool {
        std::ptr::eq(self.manager.as_ptr(), manager)
    }
}

impl PartialEq for Entity {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && Weak::ptr_eq(&self.manager, &other.manager)
    }
}

impl Eq for Entity {}

impl fmt::Debug for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Entity").field("id", &self.id).finish_non_exhaustive()
    }
}

/// Map of live entities with a monotonically increasing id counter.
///
/// Ids start at 1 and are never reused within one registry.
pub(crate) struct EntityRegistry {
    allocator: EntityAllocator,
    entities: RwLock<BTreeMap<EntityId, Entity>>,
}

impl EntityRegistry {
    pub(crate) fn new() -> Self {
        Self {
            allocator: EntityAllocator::new(),
            entities: RwLock::new(BTreeMap::new()),
        }
    }

    pub(crate) fn create(&self, manager: Weak<EntityManager>) -> EntityId {
        let mut entities = self.entities.write().unwrap_or_else(PoisonError::into_inner);
        let id = self.allocator.allocate();
        entities.insert(id, Entity { id, manager });
        debug!(entity = %id, "created entity");
        id
    }

    pub(crate) fn get(&self, id: EntityId) -> Option<Entity> {
        self.entities
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&id)
            .cloned()
    }

    pub(crate) fn contains(&self, id: EntityId) -> bool {
        self.entities
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(&id)
    }

    pub(crate) fn remove(&self, id: EntityId) -> bool {
        self.entities
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id)
            .is_some()
    }

    pub(crate) fn ids(&self) -> Vec<EntityId> {
        self.entities
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .copied()
            .collect()
    }

    pub(crate) fn len(&self) -> usize {
        self.entities.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub(crate) fn clear(&self) -> usize {
        let mut entities = self.entities.write().unwrap_or_else(PoisonError::into_inner);
        let count = entities.len();
        entities.clear();
        count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_start_at_one_and_increase() {
        let registry = EntityRegistry::new();
        let a = registry.create(Weak::new());
        let b = registry.create(Weak::new());
        assert_eq!(a, EntityId(1));
        assert_eq!(b, EntityId(2));
        assert_eq!(registry.ids(), vec![a, b]);
    }

    #[test]
    fn test_removed_ids_are_not_reused() {
        let registry = EntityRegistry::new();
        let a = registry.create(Weak::new());
        assert!(registry.remove(a));
        assert!(!registry.remove(a));
        assert!(!registry.contains(a));
        let b = registry.create(Weak::new());
        assert!(b > a);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_detached_entity_has_no_manager() {
        let registry = EntityRegistry::new();
        let id = registry.create(Weak::new());
        let entity = registry.get(id).unwrap();
        assert_eq!(entity.id(), id);
        assert!(entity.manager().is_none());
        assert_eq!(registry.clear(), 1);
        assert!(registry.get(id).is_none());
    }
}
