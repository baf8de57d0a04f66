//! Plugin Module
//!
//! Provides the plugin lifecycle and messaging core:
//! - Plugin interface
//! - Health tracking
//! - Messaging channels
//! - Plugin manager

pub mod channel;
pub mod config;
pub mod health;
pub mod interface;
pub mod manager;
pub mod messaging;

pub use channel::{DeliveryFailureSink, Envelope, PluginMessaging, Recipient, SubscriptionId};
pub use config::{EscalationPolicy, ManagerConfig, WaitOptions};
pub use health::{ErrorDescriptor, ErrorOrigin, HealthState, HealthTracker, PluginHealth};
pub use interface::{
    EditorServices, HealthReport, Plugin, PluginContext, PluginError, PluginResult,
};
pub use manager::{PluginManager, PluginSummary, Unregistered};
pub use messaging::MessagingManager;
