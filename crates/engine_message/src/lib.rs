//! # engine_message
//!
//! Messaging for the entity core.
//!
//! This crate provides:
//!
//! - [`message`] — the [`Message`] value and the well-known core message types.
//! - [`pump`] — the [`MessagePump`] publish/subscribe dispatcher with
//!   synchronous ordered delivery and a time-stamped pending queue.
//! - [`registry`] — the [`MessageRegistry`] of message schemas that plugins
//!   register into.

pub mod message;
pub mod pump;
pub mod registry;

pub use message::{FrameTime, Message};
pub use pump::{MessageHandler, MessagePump, Order, RegisterOptions};
pub use registry::{MessageRegistry, MessageSchema};
