//! Editor events carried by the emitter.

use crate::editor::block::BlockId;
use crate::plugin::channel::Envelope;
use crate::plugin::health::HealthState;
use serde::{Deserialize, Serialize};

/// Event type prefix for plugin messages; the topic follows the colon.
pub const MESSAGE_EVENT_PREFIX: &str = "message:";
/// Event type for plugin registration.
pub const PLUGIN_REGISTERED: &str = "plugin:registered";
/// Event type for plugin health transitions.
pub const PLUGIN_HEALTH: &str = "plugin:health";
/// Event type for plugin removal.
pub const PLUGIN_UNREGISTERED: &str = "plugin:unregistered";

/// Block lifecycle kinds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlockEventKind {
    /// Block inserted into the document
    Created,
    /// Block content changed
    Updated,
    /// Block removed from the document
    Removed,
    /// Block gained focus
    Focused,
}

impl BlockEventKind {
    fn event_type(&self) -> &'static str {
        match self {
            BlockEventKind::Created => "block:created",
            BlockEventKind::Updated => "block:updated",
            BlockEventKind::Removed => "block:removed",
            BlockEventKind::Focused => "block:focused",
        }
    }
}

/// An event published through the [`EventEmitter`](super::EventEmitter).
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum EditorEvent {
    /// A plugin message envelope
    Message(Envelope),
    /// A plugin was registered
    PluginRegistered { identity: String },
    /// A plugin's health state changed
    PluginHealthChanged {
        identity: String,
        from: HealthState,
        to: HealthState,
    },
    /// A plugin was removed
    PluginUnregistered { identity: String },
    /// Block lifecycle
    Block { kind: BlockEventKind, block_id: BlockId },
    /// Anything else the host wants to publish
    Custom {
        event_type: String,
        payload: serde_json::Value,
    },
}

impl EditorEvent {
    /// Create a custom event.
    pub fn custom(event_type: &str, payload: serde_json::Value) -> Self {
        EditorEvent::Custom {
            event_type: event_type.to_string(),
            payload,
        }
    }

    /// Key listeners are registered under.
    pub fn event_type(&self) -> String {
        match self {
            EditorEvent::Message(envelope) => message_event_type(&envelope.topic),
            EditorEvent::PluginRegistered { .. } => PLUGIN_REGISTERED.to_string(),
            EditorEvent::PluginHealthChanged { .. } => PLUGIN_HEALTH.to_string(),
            EditorEvent::PluginUnregistered { .. } => PLUGIN_UNREGISTERED.to_string(),
            EditorEvent::Block { kind, .. } => kind.event_type().to_string(),
            EditorEvent::Custom { event_type, .. } => event_type.clone(),
        }
    }
}

/// Event type for messages on `topic`.
pub fn message_event_type(topic: &str) -> String {
    format!("{}{}", MESSAGE_EVENT_PREFIX, topic)
}
