//! Publish/subscribe message dispatch.
//!
//! The [`MessagePump`] delivers messages synchronously to every handler
//! subscribed to the message's type, and keeps a queue of messages due at a
//! later simulation time.
//!
//! ## Ordering
//!
//! Subscribers of one message type are called by [`Order`] tier
//! (`Earliest`, `Early`, `Default`, `Late`), and within a tier in
//! registration order.
//!
//! ## Reentrancy
//!
//! Delivery iterates over a snapshot of the subscriber list taken when
//! [`MessagePump::emit_message`] is called, and no lock is held while a handler
//! runs. Handlers may therefore emit messages, register and unregister
//! handlers; none of that affects the delivery pass already in progress.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use engine_component::MessageType;
use tracing::{debug, trace, warn};

use crate::message::Message;

/// Delivery tier of a subscription. Lower tiers are called first.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Order {
    /// Called before every other tier.
    Earliest,
    /// Called before [`Order::Default`] subscribers.
    Early,
    /// The tier used when nothing else is requested.
    #[default]
    Default,
    /// Called after every other tier.
    Late,
}

/// A shareable message callback.
///
/// Handlers are compared by identity: a clone of a handler is the same
/// handler, two handlers built from identical closures are not.
#[derive(Clone)]
pub struct MessageHandler(Arc<dyn Fn(&Message) + Send + Sync>);

impl MessageHandler {
    /// Wrap a closure.
    pub fn new<F>(callback: F) -> Self
    where
        F: Fn(&Message) + Send + Sync + 'static,
    {
        Self(Arc::new(callback))
    }

    /// Invoke the handler.
    pub fn call(&self, message: &Message) {
        (self.0)(message);
    }

    /// Returns `true` if `other` is the same handler.
    #[must_use]
    pub fn same_as(&self, other: &MessageHandler) -> bool {
        std::ptr::addr_eq(Arc::as_ptr(&self.0), Arc::as_ptr(&other.0))
    }
}

impl fmt::Debug for MessageHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MessageHandler({:p})", Arc::as_ptr(&self.0))
    }
}

/// Options for [`MessagePump::register_for_messages`].
#[derive(Debug, Clone)]
pub struct RegisterOptions {
    /// Delivery tier.
    pub order: Order,
    /// Unregister the handler after its first delivery.
    pub single_shot: bool,
    /// Name used in log output.
    pub name: String,
}

impl RegisterOptions {
    /// Default options: [`Order::Default`], persistent, named `"unnamed"`.
    #[must_use]
    pub fn new() -> Self {
        Self {
            order: Order::Default,
            single_shot: false,
            name: "unnamed".to_string(),
        }
    }

    /// Set the delivery tier.
    #[must_use]
    pub fn order(mut self, order: Order) -> Self {
        self.order = order;
        self
    }

    /// Deliver at most once.
    #[must_use]
    pub fn single_shot(mut self) -> Self {
        self.single_shot = true;
        self
    }

    /// Set the debug name.
    #[must_use]
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

impl Default for RegisterOptions {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug)]
struct Subscription {
    handler: MessageHandler,
    order: Order,
    single_shot: bool,
    name: Arc<str>,
}

/// A queued message waiting for its due time.
#[derive(Debug)]
struct PendingMessage {
    message: Message,
    due: f64,
    seq: u64,
}

#[derive(Debug, Default)]
struct PendingQueue {
    entries: Vec<PendingMessage>,
    next_seq: u64,
}

/// Publish/subscribe dispatcher with a time-stamped pending queue.
#[derive(Debug, Default)]
pub struct MessagePump {
    /// Subscribers per message type, sorted by tier then registration order.
    subscriptions: RwLock<HashMap<MessageType, Vec<Subscription>>>,
    /// Messages waiting for [`MessagePump::emit_queued_messages`].
    queue: Mutex<PendingQueue>,
    /// Number of messages delivered through `emit_message`.
    emitted: AtomicU64,
}

impl MessagePump {
    /// Create an empty pump.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    // ── Subscriptions ───────────────────────────────────────────────────────

    /// Subscribe `handler` to messages of `message_type`.
    ///
    /// Registering the same handler twice for one type is allowed but logged;
    /// it will then be called twice per message.
    pub fn register_for_messages(
        &self,
        message_type: MessageType,
        handler: MessageHandler,
        options: RegisterOptions,
    ) {
        let mut subscriptions = self
            .subscriptions
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let list = subscriptions.entry(message_type.clone()).or_default();

        if list.iter().any(|s| s.handler.same_as(&handler)) {
            warn!(
                message_type = %message_type,
                handler = options.name,
                "handler registered twice for the same message type"
            );
        }

        let pos = list.partition_point(|s| s.order <= options.order);
        list.insert(
            pos,
            Subscription {
                handler,
                order: options.order,
                single_shot: options.single_shot,
                name: options.name.into(),
            },
        );
    }

    /// Remove the first subscription of `handler` to `message_type`.
    ///
    /// Returns `false` if the handler was not subscribed.
    pub fn unregister_for_messages(&self, message_type: &MessageType, handler: &MessageHandler) -> bool {
        let mut subscriptions = self
            .subscriptions
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let Some(list) = subscriptions.get_mut(message_type) else {
            return false;
        };
        let Some(pos) = list.iter().position(|s| s.handler.same_as(handler)) else {
            return false;
        };
        list.remove(pos);
        if list.is_empty() {
            subscriptions.remove(message_type);
        }
        true
    }

    /// Returns `true` if `handler` is subscribed to `message_type`.
    #[must_use]
    pub fn is_registered(&self, message_type: &MessageType, handler: &MessageHandler) -> bool {
        self.subscriptions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(message_type)
            .is_some_and(|list| list.iter().any(|s| s.handler.same_as(handler)))
    }

    /// Returns the number of subscriptions for `message_type`.
    #[must_use]
    pub fn subscriber_count(&self, message_type: &MessageType) -> usize {
        self.subscriptions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(message_type)
            .map_or(0, Vec::len)
    }

    /// Drop every subscription.
    pub fn unregister_all(&self) {
        self.subscriptions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    // ── Immediate delivery ──────────────────────────────────────────────────

    /// Deliver `message` synchronously to the current subscribers of its type.
    ///
    /// Returns the number of handlers called. Messages with the empty type are
    /// rejected.
    pub fn emit_message(&self, message: &Message) -> usize {
        let message_type = message.message_type();
        if message_type.is_none() {
            warn!("refusing to emit a message with an empty type");
            return 0;
        }

        let snapshot: Vec<(MessageHandler, Arc<str>)> = {
            let mut subscriptions = self
                .subscriptions
                .write()
                .unwrap_or_else(PoisonError::into_inner);
            let Some(list) = subscriptions.get_mut(message_type) else {
                return 0;
            };
            let snapshot = list
                .iter()
                .map(|s| (s.handler.clone(), Arc::clone(&s.name)))
                .collect();
            list.retain(|s| !s.single_shot);
            if list.is_empty() {
                subscriptions.remove(message_type);
            }
            snapshot
        };

        self.emitted.fetch_add(1, Ordering::Relaxed);
        for (handler, name) in &snapshot {
            trace!(message_type = %message_type, handler = %name, "delivering message");
            handler.call(message);
        }
        snapshot.len()
    }

    /// Returns the number of messages emitted so far.
    #[must_use]
    pub fn emitted_count(&self) -> u64 {
        self.emitted.load(Ordering::Relaxed)
    }

    // ── Delayed delivery ────────────────────────────────────────────────────

    /// Queue a copy of `message` for delivery once simulation time reaches
    /// `due`.
    pub fn enqueue_message(&self, message: &Message, due: f64) {
        let mut queue = self.queue.lock().unwrap_or_else(PoisonError::into_inner);
        let seq = queue.next_seq;
        queue.next_seq += 1;
        queue.entries.push(PendingMessage {
            message: message.clone(),
            due,
            seq,
        });
    }

    /// Deliver and remove every queued message with a due time at or before
    /// `now`, in ascending `(due time, insertion)` order.
    ///
    /// Only messages queued before the call are considered; messages queued by
    /// handlers during the flush wait for the next call. Returns the number of
    /// messages delivered.
    pub fn emit_queued_messages(&self, now: f64) -> usize {
        let mut due: Vec<PendingMessage> = {
            let mut queue = self.queue.lock().unwrap_or_else(PoisonError::into_inner);
            let (due, later): (Vec<_>, Vec<_>) =
                queue.entries.drain(..).partition(|entry| entry.due <= now);
            queue.entries = later;
            due
        };
        if due.is_empty() {
            return 0;
        }

        due.sort_by(|a, b| a.due.total_cmp(&b.due).then(a.seq.cmp(&b.seq)));
        debug!(now, count = due.len(), "emitting queued messages");
        for entry in &due {
            self.emit_message(&entry.message);
        }
        due.len()
    }

    /// Returns the number of queued messages.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.queue
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entries
            .len()
    }

    /// Discard every queued message. Returns how many were discarded.
    pub fn clear_queue(&self) -> usize {
        let mut queue = self.queue.lock().unwrap_or_else(PoisonError::into_inner);
        let count = queue.entries.len();
        queue.entries.clear();
        count
    }
}
