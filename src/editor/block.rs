//! Block handles passed to collaborators.

use serde::{Deserialize, Serialize};

/// Block identifier.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BlockId(pub String);

impl BlockId {
    /// Create a new block id.
    pub fn new(id: &str) -> Self {
        Self(id.to_string())
    }

    /// Get the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for BlockId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A document block.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Block {
    /// Block id
    pub id: BlockId,
    /// Type name (text, heading, list, image, ...)
    pub block_type: String,
    /// Type-specific content
    pub content: serde_json::Value,
}

impl Block {
    /// Create a block with empty content.
    pub fn new(id: &str, block_type: &str) -> Self {
        Self {
            id: BlockId::new(id),
            block_type: block_type.to_string(),
            content: serde_json::Value::Null,
        }
    }

    /// Set content.
    pub fn with_content(mut self, content: serde_json::Value) -> Self {
        self.content = content;
        self
    }
}
