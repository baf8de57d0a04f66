//! Focus and selection collaborator.

use crate::core::{read_lock, write_lock};
use crate::editor::block::BlockId;
use std::sync::RwLock;

/// Block focus and selection, read and written by plugins.
pub trait InteractionManager: Send + Sync {
    /// Currently focused block.
    fn focused_block(&self) -> Option<BlockId>;

    /// Move focus; `None` blurs.
    fn focus(&self, block: Option<BlockId>);

    /// Selected blocks in selection order.
    fn selection(&self) -> Vec<BlockId>;

    /// Replace the selection.
    fn select(&self, blocks: Vec<BlockId>);

    /// Drop the selection.
    fn clear_selection(&self) {
        self.select(Vec::new());
    }
}

/// In-memory interaction manager.
#[derive(Debug, Default)]
pub struct SelectionState {
    focused: RwLock<Option<BlockId>>,
    selected: RwLock<Vec<BlockId>>,
}

impl SelectionState {
    /// Create with nothing focused or selected.
    pub fn new() -> Self {
        Self::default()
    }
}

impl InteractionManager for SelectionState {
    fn focused_block(&self) -> Option<BlockId> {
        read_lock(&self.focused).clone()
    }

    fn focus(&self, block: Option<BlockId>) {
        *write_lock(&self.focused) = block;
    }

    fn selection(&self) -> Vec<BlockId> {
        read_lock(&self.selected).clone()
    }

    fn select(&self, blocks: Vec<BlockId>) {
        *write_lock(&self.selected) = blocks;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_focus_and_selection() {
        let interaction = SelectionState::new();
        assert!(interaction.focused_block().is_none());

        interaction.focus(Some(BlockId::new("b2")));
        interaction.select(vec![BlockId::new("b1"), BlockId::new("b2")]);

        assert_eq!(interaction.focused_block(), Some(BlockId::new("b2")));
        assert_eq!(interaction.selection().len(), 2);

        interaction.clear_selection();
        assert!(interaction.selection().is_empty());
    }
}
