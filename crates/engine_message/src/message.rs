//! Message values and the well-known message types emitted by the core.
//!
//! A [`Message`] is a [`MessageType`] tag plus a [`PropertyBag`]. Messages have
//! value semantics: the pump clones them when they are queued, and handlers
//! receive them by reference.

use engine_component::{ComponentType, EntityId, MessageType, PropertyBag, TypeId};
use serde::{Deserialize, Serialize};

// ── Well-known message types ────────────────────────────────────────────────

/// Emitted after a component system has been added to an entity manager.
pub const ENTITY_SYSTEM_ADDED: MessageType = TypeId::from_static("EntitySystemAddedMessage");

/// Emitted before a component system is removed from an entity manager.
pub const ENTITY_SYSTEM_REMOVED: MessageType = TypeId::from_static("EntitySystemRemovedMessage");

/// Emitted after an entity has been placed into the scene.
pub const ENTITY_ADDED_TO_SCENE: MessageType = TypeId::from_static("EntityAddedToSceneMessage");

/// Emitted when an entity is taken out of the scene.
pub const ENTITY_REMOVED_FROM_SCENE: MessageType = TypeId::from_static("EntityRemovedFromSceneMessage");

/// Emitted once per frame by the frame driver.
pub const TICK: MessageType = TypeId::from_static("TickMessage");

/// Emitted by the frame driver after the tick and the due queued messages.
pub const END_OF_FRAME: MessageType = TypeId::from_static("EndOfFrameMessage");

// ── Property names ──────────────────────────────────────────────────────────

/// Property of the system messages: name of the component type.
pub const PROP_COMPONENT_TYPE: &str = "component_type";

/// Property of [`ENTITY_SYSTEM_ADDED`]: the system's own properties.
pub const PROP_SYSTEM_PROPERTIES: &str = "system_properties";

/// Property of the scene messages: id of the entity.
pub const PROP_ABOUT_ENTITY: &str = "about_entity";

/// Property of [`TICK`]: simulation time elapsed since the previous tick.
pub const PROP_DELTA_SIM_TIME: &str = "delta_sim_time";

/// Property of [`TICK`]: wall-clock seconds elapsed since the previous tick.
pub const PROP_DELTA_REAL_TIME: &str = "delta_real_time";

/// Property of [`TICK`]: simulation time at this tick.
pub const PROP_SIMULATION_TIME: &str = "simulation_time";

/// Property of [`TICK`]: ratio of simulation time to wall-clock time.
pub const PROP_TIME_SCALE: &str = "time_scale";

/// Property of [`TICK`]: frame counter.
pub const PROP_FRAME: &str = "frame";

// ── Frame timing ────────────────────────────────────────────────────────────

/// Timing of one frame, carried by [`TICK`] and [`END_OF_FRAME`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct FrameTime {
    /// Simulation seconds since the previous frame.
    pub delta_sim_time: f64,
    /// Wall-clock seconds since the previous frame.
    pub delta_real_time: f64,
    /// Simulation time at this frame.
    pub simulation_time: f64,
    /// Simulation seconds per real second.
    pub time_scale: f64,
    /// Frame counter, starting at 1.
    pub frame: u64,
}

impl FrameTime {
    fn properties(&self) -> PropertyBag {
        PropertyBag::new()
            .with(PROP_DELTA_SIM_TIME, self.delta_sim_time)
            .with(PROP_DELTA_REAL_TIME, self.delta_real_time)
            .with(PROP_SIMULATION_TIME, self.simulation_time)
            .with(PROP_TIME_SCALE, self.time_scale)
            .with(PROP_FRAME, self.frame)
    }
}

// ── Message ─────────────────────────────────────────────────────────────────

/// A typed event broadcast through the message pump.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    message_type: MessageType,
    /// The message payload.
    pub properties: PropertyBag,
}

impl Message {
    /// Create a message with an empty payload.
    #[must_use]
    pub fn new(message_type: MessageType) -> Self {
        Self::with_properties(message_type, PropertyBag::new())
    }

    /// Create a message with an initial payload.
    #[must_use]
    pub fn with_properties(message_type: MessageType, properties: PropertyBag) -> Self {
        Self {
            message_type,
            properties,
        }
    }

    /// Returns the message type.
    #[must_use]
    pub fn message_type(&self) -> &MessageType {
        &self.message_type
    }

    /// Builder-style property insert.
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.properties.set(name, value);
        self
    }

    /// Build an [`ENTITY_SYSTEM_ADDED`] message.
    #[must_use]
    pub fn entity_system_added(component_type: &ComponentType, system_properties: PropertyBag) -> Self {
        Self::new(ENTITY_SYSTEM_ADDED)
            .with(PROP_COMPONENT_TYPE, component_type.name())
            .with(PROP_SYSTEM_PROPERTIES, system_properties)
    }

    /// Build an [`ENTITY_SYSTEM_REMOVED`] message.
    #[must_use]
    pub fn entity_system_removed(component_type: &ComponentType) -> Self {
        Self::new(ENTITY_SYSTEM_REMOVED).with(PROP_COMPONENT_TYPE, component_type.name())
    }

    /// Build an [`ENTITY_ADDED_TO_SCENE`] message.
    #[must_use]
    pub fn entity_added_to_scene(entity: EntityId) -> Self {
        Self::new(ENTITY_ADDED_TO_SCENE).with(PROP_ABOUT_ENTITY, entity.id())
    }

    /// Build an [`ENTITY_REMOVED_FROM_SCENE`] message.
    #[must_use]
    pub fn entity_removed_from_scene(entity: EntityId) -> Self {
        Self::new(ENTITY_REMOVED_FROM_SCENE).with(PROP_ABOUT_ENTITY, entity.id())
    }

    /// Build a [`TICK`] message.
    #[must_use]
    pub fn tick(time: &FrameTime) -> Self {
        Self::with_properties(TICK, time.properties())
    }

    /// Build an [`END_OF_FRAME`] message.
    #[must_use]
    pub fn end_of_frame(time: &FrameTime) -> Self {
        Self::with_properties(END_OF_FRAME, time.properties())
    }

    /// Returns the entity named by a scene message, if present.
    #[must_use]
    pub fn about_entity(&self) -> Option<EntityId> {
        self.properties
            .get(PROP_ABOUT_ENTITY)
            .and_then(|v| v.as_u64())
            .map(EntityId)
    }

    /// Returns the component type named by a system message, if present.
    #[must_use]
    pub fn component_type(&self) -> Option<ComponentType> {
        self.properties
            .get(PROP_COMPONENT_TYPE)
            .and_then(|v| v.as_str())
            .map(TypeId::new)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_added_message() {
        let props = PropertyBag::new().with("gravity", -9.81);
        let msg = Message::entity_system_added(&TypeId::new("Physics"), props.clone());
        assert_eq!(msg.message_type(), &ENTITY_SYSTEM_ADDED);
        assert_eq!(msg.component_type(), Some(TypeId::new("Physics")));
        let carried: PropertyBag = msg.properties.get_as(PROP_SYSTEM_PROPERTIES).unwrap();
        assert_eq!(carried, props);
    }

    #[test]
    fn test_tick_message() {
        let time = FrameTime {
            delta_sim_time: 0.016,
            delta_real_time: 0.032,
            simulation_time: 1.5,
            time_scale: 0.5,
            frame: 90,
        };
        let msg = Message::tick(&time);
        assert_eq!(msg.message_type(), &TICK);
        assert_eq!(msg.properties.get_as::<f64>(PROP_SIMULATION_TIME).unwrap(), 1.5);
        assert_eq!(msg.properties.get_as::<f64>(PROP_DELTA_REAL_TIME).unwrap(), 0.032);
        assert_eq!(msg.properties.get_as::<u64>(PROP_FRAME).unwrap(), 90);

        let end = Message::end_of_frame(&time);
        assert_eq!(end.message_type(), &END_OF_FRAME);
        assert_eq!(end.properties, msg.properties);
    }

    #[test]
    fn test_scene_messages_name_entity() {
        let added = Message::entity_added_to_scene(EntityId(7));
        assert_eq!(added.message_type(), &ENTITY_ADDED_TO_SCENE);
        assert_eq!(added.about_entity(), Some(EntityId(7)));
        let removed = Message::entity_removed_from_scene(EntityId(7));
        assert_eq!(removed.message_type(), &ENTITY_REMOVED_FROM_SCENE);
        assert_eq!(removed.about_entity(), Some(EntityId(7)));
        assert_eq!(Message::new(TICK).about_entity(), None);
    }

    #[test]
    fn test_clone_is_deep() {
        let original = Message::new(TypeId::new("Ping")).with("n", 1);
        let mut copy = original.clone();
        copy.properties.set("n", 2);
        assert_eq!(original.properties.get_as::<i32>("n").unwrap(), 1);
    }
}
