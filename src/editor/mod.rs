//! Editor Module
//!
//! Collaborators handed to plugins through their context:
//! - Blocks
//! - State manager
//! - Interaction manager
//! - Renderer

pub mod block;
pub mod interaction;
pub mod render;
pub mod state;

pub use block::{Block, BlockId};
pub use interaction::{InteractionManager, SelectionState};
pub use render::{RecordingRenderer, Renderer};
pub use state::{EditorState, InMemoryStateManager, StateListener, StateManager, StateSubscription};
