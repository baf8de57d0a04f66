//! Editor state collaborator.

use crate::core::{lock, read_lock, write_lock};
use crate::editor::block::{Block, BlockId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};

/// Snapshot of the document as seen by plugins.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct EditorState {
    /// Blocks in document order
    pub blocks: Vec<Block>,
    /// Free-form plugin data, keyed by plugin identity
    pub plugin_data: HashMap<String, serde_json::Value>,
}

impl EditorState {
    /// Find a block by id.
    pub fn block(&self, id: &BlockId) -> Option<&Block> {
        self.blocks.iter().find(|b| &b.id == id)
    }
}

/// State change listener.
pub type StateListener = Arc<dyn Fn(&EditorState) + Send + Sync>;

/// Handle for a state subscription.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct StateSubscription(u64);

/// Shared editor state, consumed by plugins through their context.
pub trait StateManager: Send + Sync {
    /// Current state snapshot.
    fn get_state(&self) -> EditorState;

    /// Replace the state and notify subscribers.
    fn set_state(&self, state: EditorState);

    /// Subscribe to state changes.
    fn subscribe(&self, listener: StateListener) -> StateSubscription;

    /// Remove a subscription.
    fn unsubscribe(&self, subscription: StateSubscription) -> bool;

    /// Reset state and drop all subscribers.
    fn clear(&self);
}

/// In-memory state manager.
#[derive(Default)]
pub struct InMemoryStateManager {
    state: RwLock<EditorState>,
    listeners: Mutex<Vec<(StateSubscription, StateListener)>>,
    next_id: AtomicU64,
}

impl InMemoryStateManager {
    /// Create an empty state manager.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create with an initial state.
    pub fn with_state(state: EditorState) -> Self {
        Self {
            state: RwLock::new(state),
            ..Self::default()
        }
    }
}

impl StateManager for InMemoryStateManager {
    fn get_state(&self) -> EditorState {
        read_lock(&self.state).clone()
    }

    fn set_state(&self, state: EditorState) {
        *write_lock(&self.state) = state.clone();

        let listeners: Vec<StateListener> =
            lock(&self.listeners).iter().map(|(_, l)| l.clone()).collect();
        for listener in listeners {
            listener(&state);
        }
    }

    fn subscribe(&self, listener: StateListener) -> StateSubscription {
        let id = StateSubscription(self.next_id.fetch_add(1, Ordering::Relaxed));
        lock(&self.listeners).push((id, listener));
        id
    }

    fn unsubscribe(&self, subscription: StateSubscription) -> bool {
        let mut listeners = lock(&self.listeners);
        let before = listeners.len();
        listeners.retain(|(id, _)| *id != subscription);
        listeners.len() != before
    }

    fn clear(&self) {
        *write_lock(&self.state) = EditorState::default();
        lock(&self.listeners).clear();
    }
}
