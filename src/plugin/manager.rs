//! Plugin manager: registration, hook execution and health escalation.

use crate::core::{
    is_reserved_identity, now, panic_message, read_lock, write_lock, Error, Result, Timestamp,
};
use crate::events::{EditorEvent, EventEmitter};
use crate::plugin::channel::{DeliveryFailureSink, PluginMessaging};
use crate::plugin::config::{ManagerConfig, WaitOptions};
use crate::plugin::health::{
    ErrorDescriptor, ErrorOrigin, HealthState, HealthTracker, PluginHealth,
};
use crate::plugin::interface::{EditorServices, HealthReport, Plugin, PluginError};
use crate::plugin::messaging::MessagingManager;
use futures::FutureExt;
use serde::Serialize;
use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock, Weak};

/// Registered plugin entry.
struct RegisteredPlugin {
    /// Plugin instance
    plugin: Arc<dyn Plugin>,
    /// Registration time
    registered_at: Timestamp,
    /// Registration order
    sequence: u64,
    /// Errors since the plugin was last healthy
    consecutive_errors: u32,
    /// Cleanup in progress
    unregistering: bool,
}

/// Snapshot of a registered plugin.
#[derive(Clone, Debug, Serialize)]
pub struct PluginSummary {
    /// Plugin identity
    pub identity: String,
    /// Registration time
    pub registered_at: Timestamp,
    /// Current health
    pub health: PluginHealth,
}

/// Outcome of [`PluginManager::unregister`].
#[derive(Clone, Debug)]
pub struct Unregistered {
    /// Removed identity
    pub identity: String,
    /// Cleanup failure, if the hook failed; removal happened anyway
    pub cleanup_error: Option<Error>,
}

/// State shared with the messaging failure sink.
struct ManagerShared {
    plugins: RwLock<HashMap<String, RegisteredPlugin>>,
    health: HealthTracker,
    emitter: Arc<EventEmitter>,
    config: ManagerConfig,
    next_sequence: AtomicU64,
}

impl ManagerShared {
    /// Apply a transition, queueing the lifecycle event.
    fn apply(
        &self,
        identity: &str,
        next: HealthState,
        error: Option<ErrorDescriptor>,
        events: &mut Vec<EditorEvent>,
    ) -> Result<PluginHealth> {
        let (from, health) = self.health.transition_from(identity, next, error)?;
        if self.config.emit_lifecycle_events {
            events.push(EditorEvent::PluginHealthChanged {
                identity: identity.to_string(),
                from,
                to: next,
            });
        }
        Ok(health)
    }

    fn publish(&self, events: Vec<EditorEvent>) {
        for event in events {
            self.emitter.emit(&event);
        }
    }

    /// Leave `initializing` once the hook has settled.
    fn finish_init(
        &self,
        identity: &str,
        next: HealthState,
        error: Option<ErrorDescriptor>,
    ) -> Result<PluginHealth> {
        let mut events = Vec::new();
        let result = {
            let mut plugins = write_lock(&self.plugins);
            match plugins.get_mut(identity) {
                Some(entry) if !entry.unregistering => {
                    entry.consecutive_errors = 0;
                    self.apply(identity, next, error, &mut events)
                }
                _ => Err(Error::UnknownIdentity(identity.to_string())),
            }
        };
        self.publish(events);
        result
    }

    /// Count an error against a plugin and escalate per policy.
    fn escalate(&self, identity: &str, error: ErrorDescriptor) -> Result<PluginHealth> {
        let mut events = Vec::new();
        let result = {
            let mut plugins = write_lock(&self.plugins);
            match plugins.get_mut(identity) {
                Some(entry) => self.escalate_entry(identity, entry, error, &mut events),
                None => Err(Error::UnknownIdentity(identity.to_string())),
            }
        };
        self.publish(events);
        result
    }

    fn escalate_entry(
        &self,
        identity: &str,
        entry: &mut RegisteredPlugin,
        error: ErrorDescriptor,
        events: &mut Vec<EditorEvent>,
    ) -> Result<PluginHealth> {
        let current = self
            .health
            .get_health(identity)
            .ok_or_else(|| Error::UnknownIdentity(identity.to_string()))?;

        if entry.unregistering {
            return Ok(current);
        }

        let policy = self.config.escalation;
        match current.state {
            HealthState::Healthy | HealthState::Degraded => {
                entry.consecutive_errors = entry.consecutive_errors.saturating_add(1);
                let count = entry.consecutive_errors;

                let mut health = current;
                if health.state == HealthState::Healthy {
                    if count < policy.degrade_after {
                        tracing::debug!(plugin = %identity, count, "Error below degrade threshold");
                        return Ok(health);
                    }
                    health = self.apply(identity, HealthState::Degraded, Some(error.clone()), events)?;
                } else if count < policy.unhealthy_after {
                    health = self.health.record_error(identity, error.clone())?;
                }

                if health.state == HealthState::Degraded && count >= policy.unhealthy_after {
                    health = self.apply(identity, HealthState::Unhealthy, Some(error), events)?;
                }

                tracing::warn!(plugin = %identity, count, state = %health.state, "Plugin error reported");
                Ok(health)
            }
            HealthState::Unhealthy => {
                entry.consecutive_errors = entry.consecutive_errors.saturating_add(1);
                self.health.record_error(identity, error)
            }
            HealthState::Registered | HealthState::Initializing | HealthState::Disabled => {
                tracing::debug!(
                    plugin = %identity,
                    state = %current.state,
                    "Ignoring error report outside the running states"
                );
                Ok(current)
            }
        }
    }

    /// Record a success, restoring a failing plugin to healthy.
    fn recover(&self, identity: &str) -> Result<PluginHealth> {
        let mut events = Vec::new();
        let result = {
            let mut plugins = write_lock(&self.plugins);
            let entry = plugins
                .get_mut(identity)
                .ok_or_else(|| Error::UnknownIdentity(identity.to_string()));

            entry.and_then(|entry| {
                let current = self
                    .health
                    .get_health(identity)
                    .ok_or_else(|| Error::UnknownIdentity(identity.to_string()))?;

                match current.state {
                    HealthState::Degraded | HealthState::Unhealthy if !entry.unregistering => {
                        entry.consecutive_errors = 0;
                        let health = self.apply(identity, HealthState::Healthy, None, &mut events)?;
                        tracing::info!(plugin = %identity, "Plugin recovered");
                        Ok(health)
                    }
                    HealthState::Healthy => {
                        entry.consecutive_errors = 0;
                        Ok(current)
                    }
                    _ => Ok(current),
                }
            })
        };
        self.publish(events);
        result
    }
}

/// Routes message handler failures into the owning plugin's health.
struct HealthReportingSink {
    shared: Weak<ManagerShared>,
}

impl DeliveryFailureSink for HealthReportingSink {
    fn handler_failed(&self, identity: &str, topic: &str, error: PluginError) {
        let Some(shared) = self.shared.upgrade() else {
            return;
        };

        let descriptor = ErrorDescriptor::from_plugin_error(
            &error,
            ErrorOrigin::MessageHandler {
                topic: topic.to_string(),
            },
        );
        if let Err(e) = shared.escalate(identity, descriptor) {
            tracing::debug!(plugin = %identity, error = %e, "Handler failure not attributed");
        }
    }
}

/// Plugin manager.
pub struct PluginManager {
    shared: Arc<ManagerShared>,
    messaging: MessagingManager,
    services: EditorServices,
}

impl PluginManager {
    /// Create a manager with the default configuration.
    pub fn new(services: EditorServices) -> Self {
        Self::build(services, ManagerConfig::default())
    }

    /// Create a manager with a validated configuration.
    pub fn with_config(services: EditorServices, config: ManagerConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::build(services, config))
    }

    fn build(services: EditorServices, config: ManagerConfig) -> Self {
        let shared = Arc::new(ManagerShared {
            plugins: RwLock::new(HashMap::new()),
            health: HealthTracker::new(),
            emitter: services.event_emitter.clone(),
            config,
            next_sequence: AtomicU64::new(0),
        });
        let sink = Arc::new(HealthReportingSink {
            shared: Arc::downgrade(&shared),
        });
        let messaging = MessagingManager::with_failure_sink(services.event_emitter.clone(), sink);

        Self {
            shared,
            messaging,
            services,
        }
    }

    /// Register and initialize a plugin.
    ///
    /// Returns the plugin's health once `initialize` has settled: `healthy`
    /// on success, `unhealthy` (still registered) if the hook failed or
    /// panicked. Fails with [`Error::DuplicateIdentity`] for taken or
    /// reserved identities, and with [`Error::UnknownIdentity`] if the plugin
    /// was unregistered while initializing.
    pub async fn register(&self, identity: &str, plugin: Arc<dyn Plugin>) -> Result<PluginHealth> {
        let messaging = self.admit(identity, plugin.clone())?;
        let ctx = self.services.context(messaging);

        // Building the hook's future can panic too.
        let outcome = AssertUnwindSafe(async move { plugin.initialize(ctx).await })
            .catch_unwind()
            .await;
        let failure = match outcome {
            Ok(Ok(())) => None,
            Ok(Err(e)) => Some(e),
            Err(payload) => Some(PluginError::fatal(&format!(
                "initialize panicked: {}",
                panic_message(payload.as_ref())
            ))),
        };

        match failure {
            None => {
                let health = self.shared.finish_init(identity, HealthState::Healthy, None)?;
                tracing::info!(plugin = %identity, "Plugin initialized");
                Ok(health)
            }
            Some(source) => {
                let error = Error::PluginInit {
                    identity: identity.to_string(),
                    source,
                };
                tracing::warn!(plugin = %identity, error = %error, "Plugin initialization failed");
                let descriptor = ErrorDescriptor::from_error(&error, ErrorOrigin::Initialize);
                self.shared
                    .finish_init(identity, HealthState::Unhealthy, Some(descriptor))
            }
        }
    }

    /// Create record, health and channel together, ending in `initializing`.
    fn admit(&self, identity: &str, plugin: Arc<dyn Plugin>) -> Result<PluginMessaging> {
        if is_reserved_identity(identity) {
            return Err(Error::DuplicateIdentity(identity.to_string()));
        }

        let mut events = Vec::new();
        let messaging = {
            let mut plugins = write_lock(&self.shared.plugins);
            if plugins.contains_key(identity) {
                return Err(Error::DuplicateIdentity(identity.to_string()));
            }

            self.shared.health.register(identity)?;
            let messaging = match self.messaging.create_plugin_messaging(identity) {
                Ok(messaging) => messaging,
                Err(e) => {
                    self.shared.health.remove(identity);
                    return Err(e);
                }
            };

            plugins.insert(
                identity.to_string(),
                RegisteredPlugin {
                    plugin,
                    registered_at: now(),
                    sequence: self.shared.next_sequence.fetch_add(1, Ordering::Relaxed),
                    consecutive_errors: 0,
                    unregistering: false,
                },
            );
            if self.shared.config.emit_lifecycle_events {
                events.push(EditorEvent::PluginRegistered {
                    identity: identity.to_string(),
                });
            }
            self.shared
                .apply(identity, HealthState::Initializing, None, &mut events)?;
            messaging
        };

        self.shared.publish(events);
        tracing::debug!(plugin = %identity, "Plugin registered");
        Ok(messaging)
    }

    /// Run cleanup and remove a plugin.
    ///
    /// A failing cleanup is reported in [`Unregistered::cleanup_error`] but
    /// does not prevent removal.
    pub async fn unregister(&self, identity: &str) -> Result<Unregistered> {
        let plugin = {
            let mut plugins = write_lock(&self.shared.plugins);
            match plugins.get_mut(identity) {
                Some(entry) if !entry.unregistering => {
                    entry.unregistering = true;
                    entry.plugin.clone()
                }
                _ => return Err(Error::UnknownIdentity(identity.to_string())),
            }
        };

        let outcome = AssertUnwindSafe(async move { plugin.cleanup().await })
            .catch_unwind()
            .await;
        let cleanup_error = match outcome {
            Ok(Ok(())) => None,
            Ok(Err(source)) => Some(source),
            Err(payload) => Some(PluginError::fatal(&format!(
                "cleanup panicked: {}",
                panic_message(payload.as_ref())
            ))),
        }
        .map(|source| Error::PluginCleanup {
            identity: identity.to_string(),
            source,
        });

        if let Some(error) = &cleanup_error {
            tracing::warn!(plugin = %identity, error = %error, "Plugin cleanup failed");
        }

        let mut events = Vec::new();
        {
            let mut plugins = write_lock(&self.shared.plugins);
            self.shared
                .apply(identity, HealthState::Disabled, None, &mut events)?;
            self.messaging.remove_messaging(identity);
            self.shared.health.remove(identity);
            plugins.remove(identity);
        }
        if self.shared.config.emit_lifecycle_events {
            events.push(EditorEvent::PluginUnregistered {
                identity: identity.to_string(),
            });
        }
        self.shared.publish(events);

        tracing::info!(plugin = %identity, "Plugin unregistered");
        Ok(Unregistered {
            identity: identity.to_string(),
            cleanup_error,
        })
    }

    /// Unregister every plugin, most recently registered first.
    pub async fn shutdown(&self) -> Vec<Unregistered> {
        let mut order: Vec<(u64, String)> = read_lock(&self.shared.plugins)
            .iter()
            .filter(|(_, entry)| !entry.unregistering)
            .map(|(id, entry)| (entry.sequence, id.clone()))
            .collect();
        order.sort_by(|a, b| b.0.cmp(&a.0));

        let mut removed = Vec::with_capacity(order.len());
        for (_, identity) in order {
            match self.unregister(&identity).await {
                Ok(outcome) => removed.push(outcome),
                Err(e) => tracing::debug!(plugin = %identity, error = %e, "Skipped during shutdown"),
            }
        }
        removed
    }

    /// Current health, or `None` if the plugin is not registered.
    pub fn get_plugin_health(&self, identity: &str) -> Option<PluginHealth> {
        self.shared.health.get_health(identity)
    }

    /// Identities currently degraded or unhealthy.
    pub fn get_unhealthy_plugins(&self) -> Vec<String> {
        self.shared.health.get_unhealthy()
    }

    /// Count an error against a plugin.
    ///
    /// With the default policy the first error moves `healthy -> degraded`
    /// and the next one `degraded -> unhealthy`.
    pub fn report_error(&self, identity: &str, error: PluginError) -> Result<PluginHealth> {
        self.shared.escalate(
            identity,
            ErrorDescriptor::from_plugin_error(&error, ErrorOrigin::Reported),
        )
    }

    /// Record a successful operation; a failing plugin returns to healthy.
    pub fn report_recovery(&self, identity: &str) -> Result<PluginHealth> {
        self.shared.recover(identity)
    }

    /// Poll a plugin's own health report and apply it.
    pub fn check_health(&self, identity: &str) -> Result<PluginHealth> {
        let plugin = read_lock(&self.shared.plugins)
            .get(identity)
            .map(|entry| entry.plugin.clone())
            .ok_or_else(|| Error::UnknownIdentity(identity.to_string()))?;

        let report = catch_unwind(AssertUnwindSafe(|| plugin.health_report())).unwrap_or_else(
            |payload| {
                HealthReport::Failing(PluginError::new(&format!(
                    "health check panicked: {}",
                    panic_message(payload.as_ref())
                )))
            },
        );

        match report {
            HealthReport::Unsupported => self
                .get_plugin_health(identity)
                .ok_or_else(|| Error::UnknownIdentity(identity.to_string())),
            HealthReport::Healthy => self.shared.recover(identity),
            HealthReport::Failing(error) => self.shared.escalate(
                identity,
                ErrorDescriptor::from_plugin_error(&error, ErrorOrigin::HealthCheck),
            ),
        }
    }

    /// Run [`check_health`](Self::check_health) on every plugin.
    pub fn check_all_health(&self) -> HashMap<String, PluginHealth> {
        self.identities()
            .into_iter()
            .filter_map(|id| {
                let health = self.check_health(&id).ok()?;
                Some((id, health))
            })
            .collect()
    }

    /// Wait until `predicate` holds, using the configured wait defaults.
    pub async fn wait_for_health<P>(&self, identity: &str, predicate: P) -> Result<PluginHealth>
    where
        P: Fn(&PluginHealth) -> bool,
    {
        self.wait_for_health_with(identity, predicate, self.shared.config.wait)
            .await
    }

    /// Wait until `predicate` holds, polling per `options`.
    pub async fn wait_for_health_with<P>(
        &self,
        identity: &str,
        predicate: P,
        options: WaitOptions,
    ) -> Result<PluginHealth>
    where
        P: Fn(&PluginHealth) -> bool,
    {
        self.shared.health.wait_for(identity, predicate, options).await
    }

    /// Registered plugins in registration order.
    pub fn list_plugins(&self) -> Vec<PluginSummary> {
        let plugins = read_lock(&self.shared.plugins);
        let mut entries: Vec<(&String, &RegisteredPlugin)> = plugins.iter().collect();
        entries.sort_by_key(|(_, entry)| entry.sequence);

        entries
            .into_iter()
            .filter_map(|(id, entry)| {
                Some(PluginSummary {
                    identity: id.clone(),
                    registered_at: entry.registered_at,
                    health: self.shared.health.get_health(id)?,
                })
            })
            .collect()
    }

    fn identities(&self) -> Vec<String> {
        self.list_plugins().into_iter().map(|s| s.identity).collect()
    }

    /// Whether `identity` is registered.
    pub fn is_registered(&self, identity: &str) -> bool {
        read_lock(&self.shared.plugins).contains_key(identity)
    }

    /// Number of registered plugins.
    pub fn plugin_count(&self) -> usize {
        read_lock(&self.shared.plugins).len()
    }

    /// The messaging directory.
    pub fn messaging_manager(&self) -> &MessagingManager {
        &self.messaging
    }

    /// The shared event emitter.
    pub fn event_emitter(&self) -> &Arc<EventEmitter> {
        &self.services.event_emitter
    }

    /// Active configuration.
    pub fn config(&self) -> &ManagerConfig {
        &self.shared.config
    }
}

impl Default for PluginManager {
    fn default() -> Self {
        Self::new(EditorServices::default())
    }
}
