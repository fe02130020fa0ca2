//! `SubscriptionRegistry` – the set of topics this client wants.
//!
//! The registry is owned by the connection task. It never talks to the
//! socket itself: every mutation returns the control message (if any) the
//! task should send when it is connected, and [`replay`](SubscriptionRegistry::replay)
//! produces the single message sent after each successful (re)connection.

use std::collections::BTreeSet;

use crate::models::ClientMessage;

/// Topics accepted by [`SubscriptionRegistry::subscribe`]: one topic or many.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topics(Vec<String>);

impl Topics {
    pub fn into_vec(self) -> Vec<String> {
        self.0
    }
}

impl From<&str> for Topics {
    fn from(topic: &str) -> Self {
        Topics(vec![topic.to_string()])
    }
}

impl From<String> for Topics {
    fn from(topic: String) -> Self {
        Topics(vec![topic])
    }
}

impl From<Vec<String>> for Topics {
    fn from(topics: Vec<String>) -> Self {
        Topics(topics)
    }
}

impl From<&[&str]> for Topics {
    fn from(topics: &[&str]) -> Self {
        Topics(topics.iter().map(|t| t.to_string()).collect())
    }
}

impl<const N: usize> From<[&str; N]> for Topics {
    fn from(topics: [&str; N]) -> Self {
        Topics(topics.iter().map(|t| t.to_string()).collect())
    }
}

/// Deduplicated topic set with full-set-replace semantics.
#[derive(Debug, Default, Clone)]
pub struct SubscriptionRegistry {
    topics: BTreeSet<String>,
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Union `topics` into the set.
    ///
    /// Returns the full-set `subscribe` message when the set changed, `None`
    /// when every topic was already held.
    pub fn subscribe(&mut self, topics: impl Into<Topics>) -> Option<ClientMessage> {
        let mut changed = false;
        for topic in topics.into().into_vec() {
            let topic = topic.trim();
            if topic.is_empty() {
                continue;
            }
            changed |= self.topics.insert(topic.to_string());
        }
        changed.then(|| self.subscribe_message())
    }

    /// Remove only the given topics.
    ///
    /// Returns the remaining full set as a `subscribe` message, the
    /// all-clear `unsubscribe` message when nothing is left, or `None` when
    /// none of the topics were held.
    pub fn unsubscribe_topics(&mut self, topics: impl Into<Topics>) -> Option<ClientMessage> {
        let mut changed = false;
        for topic in topics.into().into_vec() {
            changed |= self.topics.remove(topic.trim());
        }
        if !changed {
            return None;
        }
        if self.topics.is_empty() {
            Some(ClientMessage::Unsubscribe)
        } else {
            Some(self.subscribe_message())
        }
    }

    /// Clear the whole set. Always yields the all-clear message.
    pub fn clear(&mut self) -> ClientMessage {
        self.topics.clear();
        ClientMessage::Unsubscribe
    }

    /// Message to send after a (re)connection; `None` when nothing is held.
    pub fn replay(&self) -> Option<ClientMessage> {
        (!self.topics.is_empty()).then(|| self.subscribe_message())
    }

    pub fn contains(&self, topic: &str) -> bool {
        self.topics.contains(topic)
    }

    pub fn len(&self) -> usize {
        self.topics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.topics.is_empty()
    }

    /// Current topics in sorted order.
    pub fn topics(&self) -> Vec<String> {
        self.topics.iter().cloned().collect()
    }

    fn subscribe_message(&self) -> ClientMessage {
        ClientMessage::Subscribe {
            topics: self.topics(),
        }
    }
}
