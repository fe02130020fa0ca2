//! Topic-keyed dispatch of decoded inbound messages.
//!
//! The connection task calls [`MessageRouter::dispatch`] once per inbound
//! frame, in arrival order. Listeners are registered per topic and removed
//! through the [`ListenerGuard`] returned at registration.
//!
//! Removal is synchronous: when [`ListenerGuard::dispose`] (or `Drop`)
//! returns, the callback will not run again, even if another thread was in
//! the middle of dispatching a frame for that topic. Each listener carries a
//! re-entrant gate that dispatch holds while invoking the callback and that
//! disposal takes before marking the listener inactive, so a callback may
//! dispose of its own guard.

use parking_lot::{ReentrantMutex, RwLock};
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use crate::models::{parse_topic, ServerMessage, TopicKind};

/// Callback invoked for every message routed to a topic.
pub type MessageCallback = Arc<dyn Fn(&ServerMessage) + Send + Sync>;

/// Invoked (under the router lock) when a topic loses its last listener.
pub(crate) type TopicReleasedHook = Arc<dyn Fn(&str) + Send + Sync>;

struct ListenerSlot {
    id: u64,
    active: AtomicBool,
    gate: ReentrantMutex<()>,
    callback: MessageCallback,
}

impl ListenerSlot {
    fn invoke(&self, message: &ServerMessage) {
        let _gate = self.gate.lock();
        if self.active.load(Ordering::Acquire) {
            (self.callback)(message);
        }
    }

    fn deactivate(&self) {
        let _gate = self.gate.lock();
        self.active.store(false, Ordering::Release);
    }
}

/// Outcome of routing one message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Number of listeners the message was offered to.
    Delivered(usize),
    /// Nobody listens on the message's topic; the message was dropped.
    Unmatched,
}

/// Observer registry keyed by topic.
pub struct MessageRouter {
    listeners: RwLock<HashMap<String, Vec<Arc<ListenerSlot>>>>,
    next_id: AtomicU64,
    on_topic_released: Option<TopicReleasedHook>,
}

impl fmt::Debug for MessageRouter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MessageRouter")
            .field("topics", &self.topics())
            .finish()
    }
}

impl Default for MessageRouter {
    fn default() -> Self {
        Self::new()
    }
}

impl MessageRouter {
    pub fn new() -> Self {
        Self {
            listeners: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            on_topic_released: None,
        }
    }

    /// Router that calls `hook` whenever a topic loses its last listener.
    pub(crate) fn with_release_hook(hook: TopicReleasedHook) -> Self {
        Self {
            on_topic_released: Some(hook),
            ..Self::new()
        }
    }

    /// Register `callback` for `topic`.
    ///
    /// Returns the guard that removes the listener, and whether this is the
    /// first listener on the topic.
    pub fn register(
        self: &Arc<Self>,
        topic: impl Into<String>,
        callback: impl Fn(&ServerMessage) + Send + Sync + 'static,
    ) -> (ListenerGuard, bool) {
        let topic = topic.into();
        let slot = Arc::new(ListenerSlot {
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            active: AtomicBool::new(true),
            gate: ReentrantMutex::new(()),
            callback: Arc::new(callback),
        });

        let first = {
            let mut listeners = self.listeners.write();
            let entry = listeners.entry(topic.clone()).or_default();
            entry.push(slot.clone());
            entry.len() == 1
        };

        log::debug!("[fabz-link] Listener {} registered on '{}'", slot.id, topic);

        let guard = ListenerGuard {
            router: Arc::clone(self),
            topic,
            slot: Some(slot),
        };
        (guard, first)
    }

    /// Offer `message` to every listener on its topic.
    pub fn dispatch(&self, message: &ServerMessage) -> DispatchOutcome {
        let topic = message.topic();
        let slots: Vec<Arc<ListenerSlot>> = match self.listeners.read().get(&topic) {
            Some(slots) if !slots.is_empty() => slots.clone(),
            _ => {
                match parse_topic(&topic) {
                    TopicKind::Driver(id) => {
                        log::debug!("[fabz-link] No listener for driver '{}', dropping update", id)
                    },
                    TopicKind::Route(id) => {
                        log::debug!("[fabz-link] No listener for route '{}', dropping update", id)
                    },
                    TopicKind::Control => {
                        log::debug!("[fabz-link] Control frame with no listener, dropping")
                    },
                    TopicKind::Other(other) => {
                        log::debug!("[fabz-link] No listener for topic '{}', dropping message", other)
                    },
                }
                return DispatchOutcome::Unmatched;
            },
        };

        for slot in &slots {
            slot.invoke(message);
        }
        DispatchOutcome::Delivered(slots.len())
    }

    pub fn listener_count(&self, topic: &str) -> usize {
        self.listeners.read().get(topic).map_or(0, Vec::len)
    }

    /// Topics with at least one listener, sorted.
    pub fn topics(&self) -> Vec<String> {
        let mut topics: Vec<String> = self.listeners.read().keys().cloned().collect();
        topics.sort();
        topics
    }

    fn remove(&self, topic: &str, slot: &Arc<ListenerSlot>) {
        {
            let mut listeners = self.listeners.write();
            if let Some(entry) = listeners.get_mut(topic) {
                entry.retain(|s| s.id != slot.id);
                if entry.is_empty() {
                    listeners.remove(topic);
                    // Still under the lock so a racing first registration on
                    // the same topic is ordered after this release.
                    if let Some(hook) = &self.on_topic_released {
                        hook(topic);
                    }
                }
            }
        }
        // Outside the table lock: waits for an in-flight invocation to finish.
        slot.deactivate();
        log::debug!("[fabz-link] Listener {} removed from '{}'", slot.id, topic);
    }
}

/// Disposer for one router listener. Dropping it removes the listener.
pub struct ListenerGuard {
    router: Arc<MessageRouter>,
    topic: String,
    slot: Option<Arc<ListenerSlot>>,
}

impl fmt::Debug for ListenerGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerGuard")
            .field("topic", &self.topic)
            .field("active", &self.is_active())
            .finish()
    }
}

impl ListenerGuard {
    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn is_active(&self) -> bool {
        self.slot.is_some()
    }

    /// Remove the listener. Safe to call more than once.
    pub fn dispose(&mut self) {
        if let Some(slot) = self.slot.take() {
            self.router.remove(&self.topic, &slot);
        }
    }
}

impl Drop for ListenerGuard {
    fn drop(&mut self) {
        self.dispose();
    }
}
