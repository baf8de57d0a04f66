//! Events Module
//!
//! Publish/subscribe plumbing shared by the editor and its plugins:
//! - Editor events
//! - Event emitter

pub mod emitter;
pub mod event;

pub use emitter::{EventEmitter, Listener, ListenerId};
pub use event::{BlockEventKind, EditorEvent};
