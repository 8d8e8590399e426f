//! # engine_component
//!
//! The vocabulary shared by every part of the entity core.
//!
//! This crate provides:
//!
//! - [`TypeId`] — hashed, named identifiers for component and message types.
//! - [`EntityId`] — lightweight `u64` entity identifiers.
//! - [`EntityAllocator`] — monotonically increasing id allocator.
//! - [`PropertyBag`] — named, dynamically typed attribute bags.
//! - [`Component`] / [`ComponentHandle`] — component values and shared handles.

pub mod component;
pub mod entity;
pub mod property;
pub mod type_id;

pub use component::{Component, ComponentHandle};
pub use entity::{EntityAllocator, EntityId};
pub use property::{PropertyBag, PropertyError};
pub use type_id::{ComponentType, MessageType, TypeId};
