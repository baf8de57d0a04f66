//! Error types for inkblock.

use crate::plugin::health::HealthState;
use crate::plugin::interface::PluginError;
use std::time::Duration;
use thiserror::Error;

/// Result type alias for inkblock operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in plugin lifecycle and messaging operations.
///
/// `DuplicateIdentity`, `UnknownIdentity` and `InvalidTransition` are
/// contract violations and are always surfaced to the caller. Hook failures
/// (`PluginInit`, `PluginCleanup`) are captured at the manager boundary and
/// recorded in the plugin's health instead.
#[derive(Error, Debug, Clone)]
pub enum Error {
    // Registry errors
    #[error("Identity '{0}' is already registered")]
    DuplicateIdentity(String),

    #[error("Identity '{0}' is not registered")]
    UnknownIdentity(String),

    // Health errors
    #[error("Invalid health transition for '{identity}': {from} -> {to}")]
    InvalidTransition {
        identity: String,
        from: HealthState,
        to: HealthState,
    },

    #[error("Timed out after {timeout:?} waiting on '{identity}'")]
    Timeout { identity: String, timeout: Duration },

    // Hook errors
    #[error("Plugin '{identity}' failed to initialize: {source}")]
    PluginInit {
        identity: String,
        #[source]
        source: PluginError,
    },

    #[error("Plugin '{identity}' failed to clean up: {source}")]
    PluginCleanup {
        identity: String,
        #[source]
        source: PluginError,
    },

    // Ambient errors
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Logging setup failed: {0}")]
    Logging(String),
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::InvalidConfig(err.to_string())
    }
}
