//! Depth Validator
//!
//! Depth is read from the cached `depth` field, which every structural
//! operation keeps in step with the range encoding. All checks here are
//! read-only and run before an operation writes anything.

use super::{TreeError, TreeStore};

impl TreeStore {
    /// Depth of one item; 0 for the root
    pub fn depth_of(&self, id: &str) -> Result<u32, TreeError> {
        self.require(id).map(|item| item.depth)
    }

    /// Height of the subtree below an item; 0 for a leaf
    pub fn subtree_height(&self, id: &str) -> Result<u32, TreeError> {
        let node = self.require(id)?;
        Ok(self
            .all()
            .filter(|item| node.contains(item))
            .map(|item| item.depth - node.depth)
            .max()
            .unwrap_or(0))
    }

    /// Depth of the deepest item in the tree
    pub fn height(&self) -> u32 {
        self.all().map(|item| item.depth).max().unwrap_or(0)
    }

    /// Check that moving `id` under `new_parent_id` is structurally allowed
    ///
    /// Fails with `InvalidParent` when the item is the root, or when the new
    /// parent is the item itself or one of its descendants; with
    /// `NodeNotFound` when either id is not part of this tree; and with
    /// `DepthExceeded` when the deepest moved item would end up below the
    /// tree's depth limit.
    pub fn validate_move(&self, id: &str, new_parent_id: &str) -> Result<(), TreeError> {
        let node = self.require(id)?;
        if node.is_root() {
            return Err(TreeError::invalid_parent(id, "the root item cannot be moved"));
        }
        let parent = self.require(new_parent_id)?;
        if parent.id == node.id {
            return Err(TreeError::invalid_parent(
                id,
                "an item cannot become its own parent",
            ));
        }
        if node.contains(parent) {
            return Err(TreeError::invalid_parent(
                id,
                format!("'{}' is a descendant of the moved item", new_parent_id),
            ));
        }

        let deepest = parent.depth + 1 + self.subtree_height(id)?;
        if deepest > self.max_depth() {
            return Err(TreeError::depth_exceeded(self.max_depth()));
        }
        Ok(())
    }
}
