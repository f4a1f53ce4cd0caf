//! Nested (tree-shaped) view over a flat item list
//!
//! Built from range containment alone, so any subset of a tree that is closed
//! under "ancestor hidden ⇒ descendant hidden" (such as the output of the
//! visibility filter) keeps its shape.

use crate::models::MenuItem;
use serde::{Deserialize, Serialize};

/// An item together with its ordered children
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TreeNode {
    #[serde(flatten)]
    pub item: MenuItem,
    pub children: Vec<TreeNode>,
}

impl TreeNode {
    pub fn leaf(item: MenuItem) -> Self {
        Self {
            item,
            children: Vec::new(),
        }
    }

    /// Build a forest from a flat item list
    ///
    /// Items whose ancestors are absent from the list become top-level nodes.
    /// Children come out in sibling order because sibling ranges are ordered
    /// by position.
    pub fn build_forest(mut items: Vec<MenuItem>) -> Vec<TreeNode> {
        items.sort_by(|a, b| {
            a.tree_id
                .cmp(&b.tree_id)
                .then(a.range_start.cmp(&b.range_start))
        });

        let mut roots = Vec::new();
        let mut stack: Vec<TreeNode> = Vec::new();

        for item in items {
            while stack
                .last()
                .is_some_and(|top| !(top.item.tree_id == item.tree_id && top.item.contains(&item)))
            {
                if let Some(done) = stack.pop() {
                    attach(&mut stack, &mut roots, done);
                }
            }
            stack.push(TreeNode::leaf(item));
        }
        while let Some(done) = stack.pop() {
            attach(&mut stack, &mut roots, done);
        }

        roots
    }

    /// Number of nodes in this subtree, including self
    pub fn size(&self) -> usize {
        1 + self.children.iter().map(TreeNode::size).sum::<usize>()
    }
}

fn attach(stack: &mut [TreeNode], roots: &mut Vec<TreeNode>, node: TreeNode) {
    match stack.last_mut() {
        Some(parent) => parent.children.push(node),
        None => roots.push(node),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn item(id: &str, start: i64, end: i64) -> MenuItem {
        let mut item = MenuItem::new_leaf("t", "p", id, Utc::now());
        item.id = id.to_string();
        item.range_start = start;
        item.range_end = end;
        item
    }

    #[test]
    fn test_build_forest_nests_by_range() {
        let items = vec![
            item("b", 30, 40),
            item("root", 0, 100),
            item("a", 10, 25),
            item("a1", 12, 14),
        ];

        let forest = TreeNode::build_forest(items);
        assert_eq!(forest.len(), 1);
        let root = &forest[0];
        assert_eq!(root.item.id, "root");
        assert_eq!(root.size(), 4);
        let ids: Vec<_> = root.children.iter().map(|c| c.item.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
        assert_eq!(root.children[0].children[0].item.id, "a1");
    }

    #[test]
    fn test_build_forest_orphans_become_roots() {
        let forest = TreeNode::build_forest(vec![item("a", 10, 20), item("b", 30, 40)]);
        assert_eq!(forest.len(), 2);
    }
}
