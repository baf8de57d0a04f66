//! Plugin manager configuration.

use crate::core::{Error, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// How reported errors escalate a plugin's health.
///
/// Errors are counted from the last time the plugin was healthy. Reaching
/// `degrade_after` moves a healthy plugin to `degraded`; reaching
/// `unhealthy_after` moves it on to `unhealthy`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EscalationPolicy {
    /// Consecutive errors before `healthy -> degraded`
    pub degrade_after: u32,
    /// Consecutive errors before `degraded -> unhealthy`
    pub unhealthy_after: u32,
}

impl EscalationPolicy {
    /// Create a policy.
    pub fn new(degrade_after: u32, unhealthy_after: u32) -> Self {
        Self {
            degrade_after,
            unhealthy_after,
        }
    }

    /// Check thresholds are usable.
    pub fn validate(&self) -> Result<()> {
        if self.degrade_after == 0 {
            return Err(Error::InvalidConfig(
                "degrade_after must be at least 1".to_string(),
            ));
        }
        if self.unhealthy_after < self.degrade_after {
            return Err(Error::InvalidConfig(format!(
                "unhealthy_after ({}) must not be below degrade_after ({})",
                self.unhealthy_after, self.degrade_after
            )));
        }
        Ok(())
    }
}

impl Default for EscalationPolicy {
    fn default() -> Self {
        Self::new(1, 2)
    }
}

/// Polling parameters for health waits.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WaitOptions {
    /// Delay between predicate checks
    #[serde(rename = "interval_ms", with = "millis")]
    pub interval: Duration,
    /// Give up after this long
    #[serde(rename = "timeout_ms", with = "millis")]
    pub timeout: Duration,
}

impl WaitOptions {
    /// Create wait options.
    pub fn new(interval: Duration, timeout: Duration) -> Self {
        Self { interval, timeout }
    }

    /// Replace the timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl Default for WaitOptions {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(10),
            timeout: Duration::from_secs(5),
        }
    }
}

/// Plugin manager configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ManagerConfig {
    /// Error escalation thresholds
    pub escalation: EscalationPolicy,
    /// Defaults for [`PluginManager::wait_for_health`](super::PluginManager::wait_for_health)
    pub wait: WaitOptions,
    /// Publish lifecycle events on the emitter
    pub emit_lifecycle_events: bool,
}

impl ManagerConfig {
    /// Parse a JSON document; missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Set escalation policy.
    pub fn with_escalation(mut self, escalation: EscalationPolicy) -> Self {
        self.escalation = escalation;
        self
    }

    /// Set wait defaults.
    pub fn with_wait(mut self, wait: WaitOptions) -> Self {
        self.wait = wait;
        self
    }

    /// Enable or disable lifecycle events.
    pub fn with_lifecycle_events(mut self, enabled: bool) -> Self {
        self.emit_lifecycle_events = enabled;
        self
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        self.escalation.validate()?;
        if self.wait.interval.is_zero() {
            return Err(Error::InvalidConfig(
                "wait interval must be non-zero".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            escalation: EscalationPolicy::default(),
            wait: WaitOptions::default(),
            emit_lifecycle_events: true,
        }
    }
}

mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
