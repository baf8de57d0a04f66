//! Renderer collaborator.

use crate::core::{read_lock, write_lock};
use crate::editor::block::{Block, BlockId};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;

/// Block element lifecycle.
pub trait Renderer: Send + Sync {
    /// Create the element for a block.
    fn render(&self, block: &Block);

    /// Refresh an existing element.
    fn update(&self, block: &Block);

    /// Drop a block's element.
    fn remove(&self, id: &BlockId);

    /// Whether a block currently has an element.
    fn is_rendered(&self, id: &BlockId) -> bool;
}

/// Renderer that records the last rendered version of each block.
#[derive(Debug, Default)]
pub struct RecordingRenderer {
    elements: RwLock<HashMap<BlockId, Block>>,
    /// Render and update calls, for inspection
    renders: AtomicU64,
}

impl RecordingRenderer {
    /// Create an empty renderer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Last rendered version of a block.
    pub fn element(&self, id: &BlockId) -> Option<Block> {
        read_lock(&self.elements).get(id).cloned()
    }

    /// Number of render and update calls so far.
    pub fn render_count(&self) -> u64 {
        self.renders.load(Ordering::Relaxed)
    }
}

impl Renderer for RecordingRenderer {
    fn render(&self, block: &Block) {
        write_lock(&self.elements).insert(block.id.clone(), block.clone());
        self.renders.fetch_add(1, Ordering::Relaxed);
    }

    fn update(&self, block: &Block) {
        let mut elements = write_lock(&self.elements);
        if let Some(element) = elements.get_mut(&block.id) {
            *element = block.clone();
            self.renders.fetch_add(1, Ordering::Relaxed);
        }
    }

    fn remove(&self, id: &BlockId) {
        write_lock(&self.elements).remove(id);
    }

    fn is_rendered(&self, id: &BlockId) -> bool {
        read_lock(&self.elements).contains_key(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_lifecycle() {
        let renderer = RecordingRenderer::new();
        let block = Block::new("b1", "text").with_content(serde_json::json!("hello"));

        renderer.render(&block);
        assert!(renderer.is_rendered(&block.id));

        renderer.update(&block.clone().with_content(serde_json::json!("hello world")));
        assert_eq!(
            renderer.element(&block.id).unwrap().content,
            serde_json::json!("hello world")
        );
        assert_eq!(renderer.render_count(), 2);

        renderer.remove(&block.id);
        assert!(!renderer.is_rendered(&block.id));
    }

    #[test]
    fn test_update_ignores_unrendered() {
        let renderer = RecordingRenderer::new();
        renderer.update(&Block::new("ghost", "text"));
        assert!(!renderer.is_rendered(&BlockId::new("ghost")));
        assert_eq!(renderer.render_count(), 0);
    }
}
