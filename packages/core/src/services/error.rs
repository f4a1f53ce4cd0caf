//! Service Layer Error Types
//!
//! This module defines error types for menu service operations. Structural
//! tree errors are flattened into the same enum so callers match on one type.

use crate::db::DatabaseError;
use crate::models::ValidationError;
use crate::tree::TreeError;
use thiserror::Error;

/// Service operation errors
#[derive(Error, Debug)]
pub enum MenuServiceError {
    /// No tree with this root id or slug
    #[error("Menu tree not found: {id}")]
    TreeNotFound { id: String },

    /// Item not found by ID
    #[error("Menu item not found: {id}")]
    NodeNotFound { id: String },

    /// Target parent is in another tree, or the move would create a cycle
    #[error("Invalid parent for item '{node_id}': {reason}")]
    InvalidParent { node_id: String, reason: String },

    /// Operation would exceed the tree's depth limit
    #[error("Maximum menu depth of {limit} exceeded")]
    DepthExceeded { limit: u32 },

    /// Validation failed for the submitted payload
    #[error("Validation failed: {0}")]
    ValidationFailed(#[from] ValidationError),

    /// Another tree already uses this slug
    #[error("Menu slug already in use: {slug}")]
    DuplicateSlug { slug: String },

    /// Database operation failed
    #[error("Database operation failed: {0}")]
    DatabaseError(#[from] DatabaseError),

    /// Stored tree violates a structural invariant
    #[error("Tree invariant violated: {0}")]
    Corrupt(String),
}

impl From<TreeError> for MenuServiceError {
    fn from(err: TreeError) -> Self {
        match err {
            TreeError::NodeNotFound { id } => Self::NodeNotFound { id },
            TreeError::InvalidParent { node_id, reason } => {
                Self::InvalidParent { node_id, reason }
            }
            TreeError::DepthExceeded { limit } => Self::DepthExceeded { limit },
            TreeError::Validation(e) => Self::ValidationFailed(e),
            TreeError::Corrupt(msg) => Self::Corrupt(msg),
        }
    }
}

impl MenuServiceError {
    /// Create a tree not found error
    pub fn tree_not_found(id: impl Into<String>) -> Self {
        Self::TreeNotFound { id: id.into() }
    }

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

    /// Create a duplicate slug error
    pub fn duplicate_slug(slug: impl Into<String>) -> Self {
        Self::DuplicateSlug { slug: slug.into() }
    }

    /// Whether the error is caused by the request rather than the server
    pub fn is_client_error(&self) -> bool {
        !matches!(self, Self::DatabaseError(_) | Self::Corrupt(_))
    }
}
