//! Per-plugin messaging channel, layered on the shared [`EventEmitter`].

use crate::core::{lock, now, panic_message, Error, Result, Timestamp};
use crate::events::event::message_event_type;
use crate::events::{EditorEvent, EventEmitter, ListenerId};
use crate::plugin::interface::{PluginError, PluginResult};
use serde::{Deserialize, Serialize};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

/// Message recipient.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Recipient {
    /// A single identity
    Plugin(String),
    /// Every subscriber of the topic
    Broadcast,
}

impl std::fmt::Display for Recipient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Recipient::Plugin(id) => write!(f, "{}", id),
            Recipient::Broadcast => write!(f, "*"),
        }
    }
}

/// An immutable message.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// Unique message id
    pub id: Uuid,
    /// Messaging domain the envelope was sent in
    pub scope: Uuid,
    /// Sending identity
    pub from: String,
    /// Recipient
    pub to: Recipient,
    /// Topic
    pub topic: String,
    /// Message body
    pub payload: serde_json::Value,
    /// Send time
    pub timestamp: Timestamp,
}

impl Envelope {
    fn new(scope: Uuid, from: &str, to: Recipient, topic: &str, payload: serde_json::Value) -> Self {
        Self {
            id: Uuid::new_v4(),
            scope,
            from: from.to_string(),
            to,
            topic: topic.to_string(),
            payload,
            timestamp: now(),
        }
    }

    /// Whether `identity` should receive this envelope.
    pub fn is_for(&self, identity: &str) -> bool {
        match &self.to {
            Recipient::Plugin(id) => id == identity,
            Recipient::Broadcast => true,
        }
    }

    /// Whether this is a broadcast.
    pub fn is_broadcast(&self) -> bool {
        self.to == Recipient::Broadcast
    }
}

/// Receives handler failures, attributed to the subscribing identity.
pub trait DeliveryFailureSink: Send + Sync {
    /// A handler on `identity`'s channel failed while handling `topic`.
    fn handler_failed(&self, identity: &str, topic: &str, error: PluginError);
}

/// Sink that drops failures; the channel has already logged them.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopFailureSink;

impl DeliveryFailureSink for NoopFailureSink {
    fn handler_failed(&self, _identity: &str, _topic: &str, _error: PluginError) {}
}

/// Handle for a channel subscription.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

struct Subscription {
    id: SubscriptionId,
    topic: String,
    listener: ListenerId,
}

#[derive(Default)]
struct ChannelState {
    closed: bool,
    subscriptions: Vec<Subscription>,
}

struct ChannelInner {
    identity: String,
    scope: Uuid,
    emitter: Arc<EventEmitter>,
    sink: Arc<dyn DeliveryFailureSink>,
    state: Mutex<ChannelState>,
    next_id: AtomicU64,
}

/// Messaging endpoint scoped to one identity. Cheap to clone.
#[derive(Clone)]
pub struct PluginMessaging {
    inner: Arc<ChannelInner>,
}

impl PluginMessaging {
    /// Channels only exchange envelopes with channels of the same `scope`.
    pub(crate) fn new(
        identity: &str,
        scope: Uuid,
        emitter: Arc<EventEmitter>,
        sink: Arc<dyn DeliveryFailureSink>,
    ) -> Self {
        Self {
            inner: Arc::new(ChannelInner {
                identity: identity.to_string(),
                scope,
                emitter,
                sink,
                state: Mutex::new(ChannelState::default()),
                next_id: AtomicU64::new(1),
            }),
        }
    }

    /// Identity this channel sends as and receives for.
    pub fn identity(&self) -> &str {
        &self.inner.identity
    }

    /// Send to one identity.
    pub fn send(&self, to: &str, topic: &str, payload: serde_json::Value) -> Result<Envelope> {
        self.deliver(Recipient::Plugin(to.to_string()), topic, payload)
    }

    /// Send to every subscriber of `topic`.
    pub fn broadcast(&self, topic: &str, payload: serde_json::Value) -> Result<Envelope> {
        self.deliver(Recipient::Broadcast, topic, payload)
    }

    fn deliver(&self, to: Recipient, topic: &str, payload: serde_json::Value) -> Result<Envelope> {
        self.ensure_open()?;

        let envelope = Envelope::new(self.inner.scope, &self.inner.identity, to, topic, payload);
        let listeners = self
            .inner
            .emitter
            .emit(&EditorEvent::Message(envelope.clone()));

        tracing::trace!(
            from = %self.inner.identity,
            to = %envelope.to,
            topic = %topic,
            listeners,
            "Message delivered"
        );
        Ok(envelope)
    }

    /// Subscribe a handler to `topic` for envelopes addressed to this channel.
    ///
    /// Handlers run on the sender's turn, before `send` returns. A handler returning `Err` or panicking is reported to the failure sink;
    /// delivery to other handlers continues.
    pub fn subscribe<F>(&self, topic: &str, handler: F) -> Result<SubscriptionId>
    where
        F: Fn(&Envelope) -> PluginResult<()> + Send + Sync + 'static,
    {
        let mut state = lock(&self.inner.state);
        if state.closed {
            return Err(Error::UnknownIdentity(self.inner.identity.clone()));
        }

        let identity = self.inner.identity.clone();
        let scope = self.inner.scope;
        let sink = self.inner.sink.clone();
        let wanted = topic.to_string();

        let listener = self.inner.emitter.on(&message_event_type(topic), move |event| {
            let EditorEvent::Message(envelope) = event else {
                return;
            };
            if envelope.scope != scope || envelope.topic != wanted || !envelope.is_for(&identity) {
                return;
            }

            let error = match catch_unwind(AssertUnwindSafe(|| handler(envelope))) {
                Ok(Ok(())) => return,
                Ok(Err(e)) => e,
                Err(payload) => PluginError::new(&format!(
                    "handler panicked: {}",
                    panic_message(payload.as_ref())
                )),
            };

            tracing::warn!(
                plugin = %identity,
                topic = %envelope.topic,
                from = %envelope.from,
                error = %error,
                "Message handler failed"
            );
            sink.handler_failed(&identity, &envelope.topic, error);
        });

        let id = SubscriptionId(self.inner.next_id.fetch_add(1, Ordering::Relaxed));
        state.subscriptions.push(Subscription {
            id,
            topic: topic.to_string(),
            listener,
        });
        Ok(id)
    }

    /// Remove a subscription. Returns whether it existed.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut state = lock(&self.inner.state);
        let Some(pos) = state.subscriptions.iter().position(|s| s.id == id) else {
            return false;
        };

        let subscription = state.subscriptions.remove(pos);
        self.inner
            .emitter
            .off(&message_event_type(&subscription.topic), subscription.listener);
        true
    }

    /// Number of live subscriptions.
    pub fn subscription_count(&self) -> usize {
        lock(&self.inner.state).subscriptions.len()
    }

    /// Whether the channel has been torn down.
    pub fn is_closed(&self) -> bool {
        lock(&self.inner.state).closed
    }

    /// Tear down: unsubscribe everything and refuse further use.
    pub(crate) fn close(&self) {
        let mut state = lock(&self.inner.state);
        state.closed = true;
        for subscription in state.subscriptions.drain(..) {
            self.inner
                .emitter
                .off(&message_event_type(&subscription.topic), subscription.listener);
        }
    }

    fn ensure_open(&self) -> Result<()> {
        if self.is_closed() {
            Err(Error::UnknownIdentity(self.inner.identity.clone()))
        } else {
            Ok(())
        }
    }
}

impl std::fmt::Debug for PluginMessaging {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginMessaging")
            .field("identity", &self.inner.identity)
            .field("subscriptions", &self.subscription_count())
            .finish()
    }
}
