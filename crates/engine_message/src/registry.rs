//! Registry of known message schemas.
//!
//! Plugins describe the messages they emit by registering a prototype
//! property bag per message type. Tools and scripting layers use the registry
//! to enumerate message types and to build messages with every property
//! pre-populated.

use std::collections::BTreeMap;
use std::sync::{PoisonError, RwLock};

use engine_component::{MessageType, PropertyBag};
use tracing::{debug, warn};

use crate::message::{self, FrameTime, Message};

/// A registered message type and its default payload.
#[derive(Debug, Clone, PartialEq)]
pub struct MessageSchema {
    /// The message type.
    pub message_type: MessageType,
    /// Properties every message of this type starts with.
    pub prototype: PropertyBag,
}

/// Message schemas keyed by message type.
#[derive(Debug, Default)]
pub struct MessageRegistry {
    schemas: RwLock<BTreeMap<MessageType, MessageSchema>>,
}

impl MessageRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry that already knows the core message types.
    #[must_use]
    pub fn with_core_messages() -> Self {
        let registry = Self::new();
        registry.register(
            message::ENTITY_SYSTEM_ADDED,
            PropertyBag::new()
                .with(message::PROP_COMPONENT_TYPE, "")
                .with(message::PROP_SYSTEM_PROPERTIES, PropertyBag::new()),
        );
        registry.register(
            message::ENTITY_SYSTEM_REMOVED,
            PropertyBag::new().with(message::PROP_COMPONENT_TYPE, ""),
        );
        registry.register(
            message::ENTITY_ADDED_TO_SCENE,
            PropertyBag::new().with(message::PROP_ABOUT_ENTITY, 0),
        );
        registry.register(
            message::ENTITY_REMOVED_FROM_SCENE,
            PropertyBag::new().with(message::PROP_ABOUT_ENTITY, 0),
        );
        let idle = FrameTime {
            time_scale: 1.0,
            ..FrameTime::default()
        };
        registry.register(message::TICK, Message::tick(&idle).properties);
        registry.register(message::END_OF_FRAME, Message::end_of_frame(&idle).properties);
        registry
    }

    /// Register a message type.
    ///
    /// Returns `false` and keeps the existing schema if the type is already
    /// registered.
    pub fn register(&self, message_type: MessageType, prototype: PropertyBag) -> bool {
        let mut schemas = self.schemas.write().unwrap_or_else(PoisonError::into_inner);
        if schemas.contains_key(&message_type) {
            warn!(message_type = %message_type, "message type already registered");
            return false;
        }
        debug!(message_type = %message_type, "registered message type");
        schemas.insert(
            message_type.clone(),
            MessageSchema {
                message_type,
                prototype,
            },
        );
        true
    }

    /// Returns `true` if the type is registered.
    #[must_use]
    pub fn is_registered(&self, message_type: &MessageType) -> bool {
        self.schemas
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(message_type)
    }

    /// Returns the schema of a registered type.
    #[must_use]
    pub fn schema(&self, message_type: &MessageType) -> Option<MessageSchema> {
        self.schemas
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(message_type)
            .cloned()
    }

    /// Build a message of a registered type, populated with its prototype.
    #[must_use]
    pub fn create(&self, message_type: &MessageType) -> Option<Message> {
        self.schema(message_type)
            .map(|schema| Message::with_properties(schema.message_type, schema.prototype))
    }

    /// Returns every registered message type.
    #[must_use]
    pub fn message_types(&self) -> Vec<MessageType> {
        self.schemas
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect()
    }
}
