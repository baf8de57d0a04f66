//! Plugin health tracking. Failure states always carry their error.

use crate::core::{now, read_lock, write_lock, Error, Result, Timestamp};
use crate::plugin::config::WaitOptions;
use crate::plugin::interface::PluginError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::RwLock;

/// Plugin lifecycle state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthState {
    /// Record created, initialize not yet called
    Registered,
    /// Initialize hook in flight
    Initializing,
    /// Operating normally
    Healthy,
    /// Recent errors, still operating
    Degraded,
    /// Failed
    Unhealthy,
    /// Unregistered
    Disabled,
}

impl HealthState {
    /// Whether `self -> next` is an allowed edge.
    pub fn can_transition_to(&self, next: HealthState) -> bool {
        use HealthState::*;
        matches!(
            (self, next),
            (Registered, Initializing)
                | (Initializing, Healthy)
                | (Initializing, Unhealthy)
                | (Healthy, Degraded)
                | (Degraded, Healthy)
                | (Degraded, Unhealthy)
                | (Unhealthy, Healthy)
        ) || (next == Disabled && *self != Disabled)
    }

    /// Degraded or unhealthy.
    pub fn is_failing(&self) -> bool {
        matches!(self, HealthState::Degraded | HealthState::Unhealthy)
    }
}

impl std::fmt::Display for HealthState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HealthState::Registered => write!(f, "registered"),
            HealthState::Initializing => write!(f, "initializing"),
            HealthState::Healthy => write!(f, "healthy"),
            HealthState::Degraded => write!(f, "degraded"),
            HealthState::Unhealthy => write!(f, "unhealthy"),
            HealthState::Disabled => write!(f, "disabled"),
        }
    }
}

/// Where a recorded error came from.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "origin", rename_all = "snake_case")]
pub enum ErrorOrigin {
    /// The initialize hook
    Initialize,
    /// The cleanup hook
    Cleanup,
    /// A message handler subscribed on `topic`
    MessageHandler { topic: String },
    /// An explicit `report_error` call
    Reported,
    /// The plugin's own health report
    HealthCheck,
}

/// Recorded error attached to a failing plugin.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ErrorDescriptor {
    /// Error message
    pub message: String,
    /// Source of the error
    pub origin: ErrorOrigin,
    /// Whether the plugin expects to recover
    pub recoverable: bool,
    /// When it was recorded
    pub at: Timestamp,
}

impl ErrorDescriptor {
    /// Create a descriptor.
    pub fn new(message: &str, origin: ErrorOrigin) -> Self {
        Self {
            message: message.to_string(),
            origin,
            recoverable: true,
            at: now(),
        }
    }

    /// Describe a plugin error.
    pub fn from_plugin_error(error: &PluginError, origin: ErrorOrigin) -> Self {
        Self {
            message: error.message.clone(),
            origin,
            recoverable: error.recoverable,
            at: now(),
        }
    }

    /// Describe a crate error, e.g. a wrapped hook failure.
    pub fn from_error(error: &Error, origin: ErrorOrigin) -> Self {
        let recoverable = match error {
            Error::PluginInit { source, .. } | Error::PluginCleanup { source, .. } => {
                source.recoverable
            }
            _ => true,
        };
        Self {
            message: error.to_string(),
            origin,
            recoverable,
            at: now(),
        }
    }
}

/// Health record for one plugin.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PluginHealth {
    /// Current state
    pub state: HealthState,
    /// When the state last changed
    pub last_transition: Timestamp,
    /// Set exactly when the state is degraded or unhealthy
    pub last_error: Option<ErrorDescriptor>,
}

impl PluginHealth {
    fn registered() -> Self {
        Self {
            state: HealthState::Registered,
            last_transition: now(),
            last_error: None,
        }
    }

    /// Shorthand for `state == Healthy`.
    pub fn is_healthy(&self) -> bool {
        self.state == HealthState::Healthy
    }
}

/// Tracks health records keyed by plugin identity.
#[derive(Debug, Default)]
pub struct HealthTracker {
    records: RwLock<HashMap<String, PluginHealth>>,
}

impl HealthTracker {
    /// Create an empty tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a record in `registered`.
    pub fn register(&self, identity: &str) -> Result<PluginHealth> {
        let mut records = write_lock(&self.records);
        if records.contains_key(identity) {
            return Err(Error::DuplicateIdentity(identity.to_string()));
        }

        let health = PluginHealth::registered();
        records.insert(identity.to_string(), health.clone());
        Ok(health)
    }

    /// Move a plugin to `next`.
    ///
    /// Failure states need an error descriptor. The record is left untouched
    /// on any error.
    pub fn transition(
        &self,
        identity: &str,
        next: HealthState,
        error: Option<ErrorDescriptor>,
    ) -> Result<PluginHealth> {
        self.transition_from(identity, next, error)
            .map(|(_, health)| health)
    }

    /// Like [`transition`](Self::transition), also returning the prior state.
    pub(crate) fn transition_from(
        &self,
        identity: &str,
        next: HealthState,
        error: Option<ErrorDescriptor>,
    ) -> Result<(HealthState, PluginHealth)> {
        let mut records = write_lock(&self.records);
        let record = records
            .get_mut(identity)
            .ok_or_else(|| Error::UnknownIdentity(identity.to_string()))?;

        let from = record.state;
        if !from.can_transition_to(next) || (next.is_failing() && error.is_none()) {
            return Err(Error::InvalidTransition {
                identity: identity.to_string(),
                from,
                to: next,
            });
        }

        record.state = next;
        record.last_transition = now();
        record.last_error = if next.is_failing() { error } else { None };

        tracing::debug!(plugin = %identity, %from, to = %next, "Health transition");
        Ok((from, record.clone()))
    }

    /// Replace the error on a plugin that is already failing.
    pub fn record_error(&self, identity: &str, error: ErrorDescriptor) -> Result<PluginHealth> {
        let mut records = write_lock(&self.records);
        let record = records
            .get_mut(identity)
            .ok_or_else(|| Error::UnknownIdentity(identity.to_string()))?;

        if !record.state.is_failing() {
            return Err(Error::InvalidTransition {
                identity: identity.to_string(),
                from: record.state,
                to: record.state,
            });
        }

        record.last_error = Some(error);
        Ok(record.clone())
    }

    /// Current health, or `None` if the plugin is not tracked.
    pub fn get_health(&self, identity: &str) -> Option<PluginHealth> {
        read_lock(&self.records).get(identity).cloned()
    }

    /// Identities currently degraded or unhealthy.
    pub fn get_unhealthy(&self) -> Vec<String> {
        read_lock(&self.records)
            .iter()
            .filter(|(_, health)| health.state.is_failing())
            .map(|(id, _)| id.clone())
            .collect()
    }

    /// Drop a record. Removing an absent record is a no-op.
    pub fn remove(&self, identity: &str) -> Option<PluginHealth> {
        write_lock(&self.records).remove(identity)
    }

    /// Whether a record exists.
    pub fn contains(&self, identity: &str) -> bool {
        read_lock(&self.records).contains_key(identity)
    }

    /// Number of tracked plugins.
    pub fn len(&self) -> usize {
        read_lock(&self.records).len()
    }

    /// Whether no plugins are tracked.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Poll until `predicate` holds for the plugin's health.
    ///
    /// An absent record never satisfies the predicate. Fails with
    /// [`Error::Timeout`] once `options.timeout` has elapsed. Never mutates
    /// any record.
    pub async fn wait_for<P>(
        &self,
        identity: &str,
        predicate: P,
        options: WaitOptions,
    ) -> Result<PluginHealth>
    where
        P: Fn(&PluginHealth) -> bool,
    {
        let poll = async {
            loop {
                if let Some(health) = self.get_health(identity) {
                    if predicate(&health) {
                        return health;
                    }
                }
                tokio::time::sleep(options.interval).await;
            }
        };

        tokio::time::timeout(options.timeout, poll)
            .await
            .map_err(|_| Error::Timeout {
                identity: identity.to_string(),
                timeout: options.timeout,
            })
    }
}
