//! Error types for structural tree operations
//!
//! Every variant is fatal to the request that raised it: a structural
//! operation either applies completely or leaves the tree as it was.

use crate::models::ValidationError;
use thiserror::Error;

/// Errors raised by [`TreeStore`](crate::tree::TreeStore) operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TreeError {
    /// Referenced item does not exist in this tree
    #[error("Menu item not found: {id}")]
    NodeNotFound { id: String },

    /// Target parent is in another tree, is the item itself, or one of its descendants
    #[error("Invalid parent for item '{node_id}': {reason}")]
    InvalidParent { node_id: String, reason: String },

    /// Operation would place an item deeper than the tree allows
    #[error("Maximum menu depth of {limit} exceeded")]
    DepthExceeded { limit: u32 },

    /// Malformed input, rejected before the tree is touched
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    /// Stored data violates a structural invariant
    #[error("Tree invariant violated: {0}")]
    Corrupt(String),
}

impl TreeError {
    /// Create a node not found error
    pub fn node_not_found(id: impl Into<String>) -> Self {
        Self::NodeNotFound { id: id.into() }
    }

    /// Create an invalid parent error
    pub fn invalid_parent(node_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidParent {
            node_id: node_id.into(),
            reason: reason.into(),
        }
    }

    /// Create a depth exceeded error
    pub fn depth_exceeded(limit: u32) -> Self {
        Self::DepthExceeded { limit }
    }

    /// Create a corrupt tree error
    pub fn corrupt(msg: impl Into<String>) -> Self {
        Self::Corrupt(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_depth_exceeded_message_carries_limit() {
        let err = TreeError::depth_exceeded(2);
        assert_eq!(format!("{}", err), "Maximum menu depth of 2 exceeded");
    }

    #[test]
    fn test_invalid_parent_message() {
        let err = TreeError::invalid_parent("a", "cannot move an item under itself");
        assert_eq!(
            format!("{}", err),
            "Invalid parent for item 'a': cannot move an item under itself"
        );
    }

    #[test]
    fn test_validation_error_converts() {
        let err: TreeError = ValidationError::MissingField("name".to_string()).into();
        assert!(matches!(err, TreeError::Validation(_)));
    }
}
