//! Messaging manager: one channel per identity, plus the host's `system` channel.

use crate::core::{is_reserved_identity, read_lock, write_lock, Error, Result, SYSTEM_IDENTITY};
use crate::events::EventEmitter;
use crate::plugin::channel::{DeliveryFailureSink, NoopFailureSink, PluginMessaging};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use uuid::Uuid;

/// Directory of messaging channels.
///
/// Channels of one manager never see envelopes sent through another, even on
/// a shared emitter.
pub struct MessagingManager {
    scope: Uuid,
    emitter: Arc<EventEmitter>,
    sink: Arc<dyn DeliveryFailureSink>,
    channels: RwLock<HashMap<String, PluginMessaging>>,
    system: PluginMessaging,
}

impl MessagingManager {
    /// Create a manager whose handler failures are only logged.
    pub fn new(emitter: Arc<EventEmitter>) -> Self {
        Self::with_failure_sink(emitter, Arc::new(NoopFailureSink))
    }

    /// Create a manager reporting handler failures to `sink`.
    pub fn with_failure_sink(emitter: Arc<EventEmitter>, sink: Arc<dyn DeliveryFailureSink>) -> Self {
        let scope = Uuid::new_v4();
        let system = PluginMessaging::new(SYSTEM_IDENTITY, scope, emitter.clone(), sink.clone());
        let mut channels = HashMap::new();
        channels.insert(SYSTEM_IDENTITY.to_string(), system.clone());

        Self {
            scope,
            emitter,
            sink,
            channels: RwLock::new(channels),
            system,
        }
    }

    /// Create the channel for `identity`.
    pub fn create_plugin_messaging(&self, identity: &str) -> Result<PluginMessaging> {
        let mut channels = write_lock(&self.channels);
        if channels.contains_key(identity) {
            return Err(Error::DuplicateIdentity(identity.to_string()));
        }

        let channel = PluginMessaging::new(identity, self.scope, self.emitter.clone(), self.sink.clone());
        channels.insert(identity.to_string(), channel.clone());

        tracing::debug!(plugin = %identity, "Messaging channel created");
        Ok(channel)
    }

    /// Channel for `identity`, if any.
    pub fn get_messaging(&self, identity: &str) -> Option<PluginMessaging> {
        read_lock(&self.channels).get(identity).cloned()
    }

    /// Tear down and discard a channel. Idempotent; the system channel stays.
    pub fn remove_messaging(&self, identity: &str) -> bool {
        if is_reserved_identity(identity) {
            tracing::warn!(plugin = %identity, "Refusing to remove reserved channel");
            return false;
        }

        let removed = write_lock(&self.channels).remove(identity);
        match removed {
            Some(channel) => {
                channel.close();
                tracing::debug!(plugin = %identity, "Messaging channel removed");
                true
            }
            None => false,
        }
    }

    /// The host's channel.
    pub fn system(&self) -> &PluginMessaging {
        &self.system
    }

    /// Identities with a channel, including `system`.
    pub fn identities(&self) -> Vec<String> {
        read_lock(&self.channels).keys().cloned().collect()
    }

    /// Number of channels, including `system`.
    pub fn len(&self) -> usize {
        read_lock(&self.channels).len()
    }

    /// Always false: the system channel exists for the manager's lifetime.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for MessagingManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessagingManager")
            .field("channels", &self.identities())
            .finish()
    }
}
