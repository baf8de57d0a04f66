//! Plugin interface definition.
//!
//! Defines the interface plugins must implement and the context they receive.

use crate::editor::{
    InMemoryStateManager, InteractionManager, RecordingRenderer, Renderer, SelectionState,
    StateManager,
};
use crate::events::EventEmitter;
use crate::plugin::channel::PluginMessaging;
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// Result type for plugin operations.
pub type PluginResult<T> = std::result::Result<T, PluginError>;

/// Plugin-specific error.
#[derive(Error, Clone, Debug, PartialEq, Eq)]
#[error("{message}")]
pub struct PluginError {
    /// Error message
    pub message: String,
    /// Is recoverable
    pub recoverable: bool,
}

impl PluginError {
    /// Create a new error.
    pub fn new(message: &str) -> Self {
        Self {
            message: message.to_string(),
            recoverable: true,
        }
    }

    /// Create a fatal error.
    pub fn fatal(message: &str) -> Self {
        Self {
            message: message.to_string(),
            recoverable: false,
        }
    }
}

/// A plugin's own view of its health.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HealthReport {
    /// The plugin does not report health
    Unsupported,
    /// Working normally
    Healthy,
    /// Something is wrong
    Failing(PluginError),
}

/// Host collaborators shared by every plugin context.
#[derive(Clone)]
pub struct EditorServices {
    /// Shared editor event emitter
    pub event_emitter: Arc<EventEmitter>,
    /// Document state
    pub state_manager: Arc<dyn StateManager>,
    /// Focus and selection
    pub interaction_manager: Arc<dyn InteractionManager>,
    /// Block renderer
    pub renderer: Arc<dyn Renderer>,
}

impl EditorServices {
    /// Bundle host collaborators.
    pub fn new(
        event_emitter: Arc<EventEmitter>,
        state_manager: Arc<dyn StateManager>,
        interaction_manager: Arc<dyn InteractionManager>,
        renderer: Arc<dyn Renderer>,
    ) -> Self {
        Self {
            event_emitter,
            state_manager,
            interaction_manager,
            renderer,
        }
    }

    /// Build the context for one plugin.
    pub fn context(&self, messaging: PluginMessaging) -> PluginContext {
        PluginContext {
            event_emitter: self.event_emitter.clone(),
            state_manager: self.state_manager.clone(),
            interaction_manager: self.interaction_manager.clone(),
            renderer: self.renderer.clone(),
            messaging,
        }
    }
}

impl Default for EditorServices {
    fn default() -> Self {
        Self::new(
            Arc::new(EventEmitter::new()),
            Arc::new(InMemoryStateManager::new()),
            Arc::new(SelectionState::new()),
            Arc::new(RecordingRenderer::new()),
        )
    }
}

/// Everything a plugin gets at initialization.
///
/// Collaborators are shared with every other plugin; the core does not
/// arbitrate concurrent mutation of them.
#[derive(Clone)]
pub struct PluginContext {
    /// Shared editor event emitter
    pub event_emitter: Arc<EventEmitter>,
    /// Document state
    pub state_manager: Arc<dyn StateManager>,
    /// Focus and selection
    pub interaction_manager: Arc<dyn InteractionManager>,
    /// Block renderer
    pub renderer: Arc<dyn Renderer>,
    /// This plugin's messaging channel
    pub messaging: PluginMessaging,
}

impl PluginContext {
    /// Identity the context was built for.
    pub fn identity(&self) -> &str {
        self.messaging.identity()
    }
}

impl std::fmt::Debug for PluginContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginContext")
            .field("identity", &self.identity())
            .finish_non_exhaustive()
    }
}

/// Plugin trait that all plugins must implement.
///
/// Hooks take `&self`; plugins keep mutable state behind their own locks.
#[async_trait]
pub trait Plugin: Send + Sync {
    /// Initialize the plugin. An error leaves it registered but unhealthy.
    async fn initialize(&self, ctx: PluginContext) -> PluginResult<()>;

    /// Release resources before removal.
    async fn cleanup(&self) -> PluginResult<()> {
        Ok(())
    }

    /// Health check, polled by [`PluginManager::check_health`](super::PluginManager::check_health).
    fn health_report(&self) -> HealthReport {
        HealthReport::Unsupported
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plugin_error() {
        let err = PluginError::new("index stale");
        assert!(err.recoverable);
        assert_eq!(err.to_string(), "index stale");

        let err = PluginError::fatal("schema mismatch");
        assert!(!err.recoverable);
    }

    struct Minimal;

    #[async_trait]
    impl Plugin for Minimal {
        async fn initialize(&self, _ctx: PluginContext) -> PluginResult<()> {
            Ok(())
        }
    }

    #[test]
    fn test_default_hooks() {
        let plugin = Minimal;
        assert_eq!(plugin.health_report(), HealthReport::Unsupported);
        assert!(tokio_test::block_on(plugin.cleanup()).is_ok());
    }
}
