//! Component type inheritance tree.
//!
//! A system may declare that its component type derives from a base type.
//! The [`TypeHierarchy`] records those `base -> derived` edges as a tree stored
//! in an arena: nodes are addressed by index and hold their parent and their
//! children in insertion order. Every edge is validated when it is added, so
//! the structure stays acyclic and traversals are bounded.

use std::collections::HashMap;

use engine_component::ComponentType;

/// Errors raised when linking types.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HierarchyError {
    /// The edge would close a cycle (including a type deriving from itself).
    #[error("{derived} cannot derive from {base}: cycle")]
    Cycle {
        /// The derived type.
        derived: ComponentType,
        /// The requested base type.
        base: ComponentType,
    },

    /// The type already has a base type.
    #[error("{derived} already derives from {existing}")]
    AlreadyLinked {
        /// The derived type.
        derived: ComponentType,
        /// Its current base type.
        existing: ComponentType,
    },
}

#[derive(Debug)]
struct Node {
    component_type: ComponentType,
    parent: Option<usize>,
    children: Vec<usize>,
}

/// Arena-backed tree of component type inheritance.
#[derive(Debug, Default)]
pub struct TypeHierarchy {
    nodes: Vec<Node>,
    index: HashMap<ComponentType, usize>,
}

impl TypeHierarchy {
    /// Create an empty hierarchy.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn node_index(&mut self, component_type: &ComponentType) -> usize {
        if let Some(&idx) = self.index.get(component_type) {
            return idx;
        }
        let idx = self.nodes.len();
        self.nodes.push(Node {
            component_type: component_type.clone(),
            parent: None,
            children: Vec::new(),
        });
        self.index.insert(component_type.clone(), idx);
        idx
    }

    /// Record that `derived` derives from `base`.
    ///
    /// # Errors
    ///
    /// Returns [`HierarchyError::Cycle`] if `base` is `derived` or one of its
    /// descendants, and [`HierarchyError::AlreadyLinked`] if `derived` already
    /// has a base.
    pub fn link(&mut self, derived: &ComponentType, base: &ComponentType) -> Result<(), HierarchyError> {
        if let Some(existing) = self.base_of(derived) {
            return Err(HierarchyError::AlreadyLinked {
                derived: derived.clone(),
                existing,
            });
        }

        let d = self.node_index(derived);
        let b = self.node_index(base);

        // Walk from the base up to its root; meeting `derived` means a cycle.
        let mut cursor = Some(b);
        while let Some(idx) = cursor {
            if idx == d {
                return Err(HierarchyError::Cycle {
                    derived: derived.clone(),
                    base: base.clone(),
                });
            }
            cursor = self.nodes[idx].parent;
        }

        self.nodes[d].parent = Some(b);
        self.nodes[b].children.push(d);
        Ok(())
    }

    /// Remove the edge from `derived` to its base. Types deriving from
    /// `derived` stay attached to it.
    ///
    /// Returns the former base type.
    pub fn unlink(&mut self, derived: &ComponentType) -> Option<ComponentType> {
        let d = *self.index.get(derived)?;
        let b = self.nodes[d].parent.take()?;
        self.nodes[b].children.retain(|&child| child != d);
        Some(self.nodes[b].component_type.clone())
    }

    /// Returns the base type of `derived`.
    #[must_use]
    pub fn base_of(&self, derived: &ComponentType) -> Option<ComponentType> {
        let d = *self.index.get(derived)?;
        self.nodes[d]
            .parent
            .map(|b| self.nodes[b].component_type.clone())
    }

    /// Returns the direct derived types of `base`, in insertion order.
    #[must_use]
    pub fn derived_of(&self, base: &ComponentType) -> Vec<ComponentType> {
        self.index.get(base).map_or_else(Vec::new, |&b| {
            self.nodes[b]
                .children
                .iter()
                .map(|&c| self.nodes[c].component_type.clone())
                .collect()
        })
    }

    /// Returns every type deriving directly or indirectly from `base`, in
    /// pre-order (each type before its own derived types, siblings in
    /// insertion order). `base` itself is not included.
    #[must_use]
    pub fn descendants(&self, base: &ComponentType) -> Vec<ComponentType> {
        let Some(&root) = self.index.get(base) else {
            return Vec::new();
        };
        let mut out = Vec::new();
        let mut stack: Vec<usize> = self.nodes[root].children.iter().rev().copied().collect();
        while let Some(idx) = stack.pop() {
            let node = &self.nodes[idx];
            out.push(node.component_type.clone());
            stack.extend(node.children.iter().rev().copied());
        }
        out
    }

    /// Returns the number of `base -> derived` edges.
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.nodes.iter().filter(|n| n.parent.is_some()).count()
    }
}
