//! # inkblock - plugin core for a block editor
//!
//! Manages the plugins that extend a rich-text block editor:
//! - **Plugin Manager**: registration, initialization and teardown
//! - **Health Tracker**: explicit lifecycle state machine per plugin
//! - **Messaging**: scoped, addressed and broadcast plugin-to-plugin messages
//!
//! A failing plugin degrades observably without taking down the editor or
//! other plugins.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use async_trait::async_trait;
//! use inkblock::plugin::{EditorServices, Plugin, PluginContext, PluginManager, PluginResult};
//! use std::sync::Arc;
//!
//! struct WordCount;
//!
//! #[async_trait]
//! impl Plugin for WordCount {
//!     async fn initialize(&self, ctx: PluginContext) -> PluginResult<()> {
//!         ctx.messaging.subscribe("count", |envelope| {
//!             println!("count requested by {}", envelope.from);
//!             Ok(())
//!         }).ok();
//!         Ok(())
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() {
//!     let manager = PluginManager::new(EditorServices::default());
//!     let health = manager.register("word-count", Arc::new(WordCount)).await.unwrap();
//!     println!("word-count is {}", health.state);
//! }
//! ```

pub mod core;
pub mod editor;
pub mod events;
pub mod monitoring;
pub mod plugin;

pub use core::error::{Error, Result};
