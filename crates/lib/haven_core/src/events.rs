//! Publish/subscribe registry for session lifecycle events.
//!
//! A registry of subject id → live subscriber senders. `subscribe` and
//! `unsubscribe` are the only mutators; `publish` fans an event out to
//! whatever is connected and prunes senders whose receiver is gone.

use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use uuid::Uuid;

/// Events emitted by the session layer. Consumers (e.g. a realtime
/// notification transport) do not need to understand anything else.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// One session (`session_id = Some`) or all sessions (`None`) of a user
    /// were revoked.
    Revoked {
        user_id: Uuid,
        session_id: Option<Uuid>,
    },
}

/// Handle identifying one subscription, used to disconnect.
#[derive(Debug)]
pub struct Subscription {
    subject: String,
    id: u64,
}

/// Subject-keyed fan-out registry.
#[derive(Debug, Default)]
pub struct EventBus {
    subscribers: DashMap<String, Vec<(u64, UnboundedSender<SessionEvent>)>>,
    next_id: AtomicU64,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Connect a subscriber to `subject`.
    pub fn subscribe(&self, subject: &str) -> (Subscription, UnboundedReceiver<SessionEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.subscribers
            .entry(subject.to_string())
            .or_default()
            .push((id, tx));
        (
            Subscription {
                subject: subject.to_string(),
                id,
            },
            rx,
        )
    }

    /// Disconnect a subscriber. Idempotent.
    pub fn unsubscribe(&self, subscription: &Subscription) {
        if let Some(mut senders) = self.subscribers.get_mut(&subscription.subject) {
            senders.retain(|(id, _)| *id != subscription.id);
        }
        self.subscribers
            .remove_if(&subscription.subject, |_, senders| senders.is_empty());
    }

    /// Deliver `event` to every live subscriber of `subject`, returning the
    /// delivered count. Dead senders are pruned as a side effect.
    pub fn publish(&self, subject: &str, event: SessionEvent) -> usize {
        let Some(mut senders) = self.subscribers.get_mut(subject) else {
            return 0;
        };
        senders.retain(|(_, tx)| tx.send(event.clone()).is_ok());
        senders.len()
    }

    /// Number of live subscribers for a subject. Test hook.
    pub fn subscriber_count(&self, subject: &str) -> usize {
        self.subscribers
            .get(subject)
            .map(|senders| senders.len())
            .unwrap_or(0)
    }
}
