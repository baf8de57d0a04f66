//! Synchronous event emitter shared by the editor and plugins.

use crate::core::{panic_message, read_lock, write_lock};
use crate::events::event::EditorEvent;
use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

/// Listener callback.
pub type Listener = Arc<dyn Fn(&EditorEvent) + Send + Sync>;

/// Handle returned by [`EventEmitter::on`], used to remove the listener.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// Event emitter.
pub struct EventEmitter {
    /// Listeners per event type, in registration order
    listeners: RwLock<HashMap<String, Vec<(ListenerId, Listener)>>>,
    /// Next listener id
    next_id: AtomicU64,
}

impl EventEmitter {
    /// Create an emitter with no listeners.
    pub fn new() -> Self {
        Self {
            listeners: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Register a listener for an event type.
    pub fn on<F>(&self, event_type: &str, listener: F) -> ListenerId
    where
        F: Fn(&EditorEvent) + Send + Sync + 'static,
    {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        write_lock(&self.listeners)
            .entry(event_type.to_string())
            .or_default()
            .push((id, Arc::new(listener)));
        id
    }

    /// Remove a listener. Returns whether it was registered.
    pub fn off(&self, event_type: &str, id: ListenerId) -> bool {
        let mut listeners = write_lock(&self.listeners);
        let Some(entries) = listeners.get_mut(event_type) else {
            return false;
        };

        let before = entries.len();
        entries.retain(|(existing, _)| *existing != id);
        let removed = entries.len() != before;

        if entries.is_empty() {
            listeners.remove(event_type);
        }
        removed
    }

    /// Deliver an event to every listener of its type.
    ///
    /// Returns the number of listeners invoked. Listeners added or removed
    /// during delivery take effect for the next emit.
    pub fn emit(&self, event: &EditorEvent) -> usize {
        let event_type = event.event_type();
        let snapshot: Vec<(ListenerId, Listener)> = match read_lock(&self.listeners).get(&event_type)
        {
            Some(entries) => entries.clone(),
            None => return 0,
        };

        for (id, listener) in &snapshot {
            if let Err(payload) = catch_unwind(AssertUnwindSafe(|| listener(event))) {
                tracing::warn!(
                    event_type = %event_type,
                    listener = id.0,
                    panic = %panic_message(payload.as_ref()),
                    "Event listener panicked"
                );
            }
        }

        snapshot.len()
    }

    /// Remove every listener.
    pub fn clear(&self) {
        write_lock(&self.listeners).clear();
    }

    /// Number of listeners for an event type.
    pub fn listener_count(&self, event_type: &str) -> usize {
        read_lock(&self.listeners)
            .get(event_type)
            .map(|entries| entries.len())
            .unwrap_or(0)
    }

    /// Total number of listeners across all event types.
    pub fn total_listeners(&self) -> usize {
        read_lock(&self.listeners).values().map(Vec::len).sum()
    }
}

impl Default for EventEmitter {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EventEmitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventEmitter")
            .field("listeners", &self.total_listeners())
            .finish()
    }
}
