//! Subtree Rebuilder
//!
//! Replaces the whole content below one item with a client-submitted forest.
//! Entries with an `id` keep their identity and are re-parented to match the
//! new nesting; entries without one become new items. Descendants of the
//! scope that the forest no longer mentions are deleted, and the tree is
//! renumbered in one pass.
//!
//! New items get a name-based UUID (v5) derived from the tree, their parent,
//! their position and their name. Resubmitting the same forest therefore
//! finds the items created by the previous submission and reuses them, which
//! keeps repeated rebuilds stable down to ids and ranges.

use super::{TreeError, TreeStore};
use crate::models::{validate_forest, ClientNode, ItemContent, MenuItem};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use uuid::Uuid;

/// What a rebuild changed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RebuildSummary {
    pub created: usize,
    pub updated: usize,
    pub deleted: usize,
}

impl RebuildSummary {
    pub fn is_noop(&self) -> bool {
        self.created == 0 && self.updated == 0 && self.deleted == 0
    }
}

struct RebuildWalk {
    contents: std::vec::IntoIter<ItemContent>,
    /// Ids named explicitly anywhere in the forest
    explicit: HashSet<String>,
    /// Descendants of the scope before the rebuild
    previous: HashSet<String>,
    kept: HashSet<String>,
    summary: RebuildSummary,
    now: DateTime<Utc>,
}

impl TreeStore {
    /// Replace the subtree below `scope_id` with `forest`
    pub fn rebuild(
        &mut self,
        scope_id: &str,
        forest: &[ClientNode],
        now: DateTime<Utc>,
    ) -> Result<RebuildSummary, TreeError> {
        let (contents, height) = validate_forest(forest)?;

        let scope = self.require(scope_id)?;
        let previous: HashSet<String> = self
            .descendants_of(scope_id)?
            .into_iter()
            .map(|item| item.id.clone())
            .collect();

        let mut explicit = HashSet::new();
        collect_ids(forest, &mut explicit);
        for id in &explicit {
            if !self.contains_id(id) {
                return Err(TreeError::node_not_found(id.as_str()));
            }
            if !previous.contains(id) {
                return Err(TreeError::invalid_parent(
                    id.as_str(),
                    format!("item is not inside the rebuilt subtree of '{}'", scope.id),
                ));
            }
        }

        if scope.depth + height > self.max_depth() {
            return Err(TreeError::depth_exceeded(self.max_depth()));
        }

        // Validation done; nothing below fails on well-formed input
        let mut walk = RebuildWalk {
            contents: contents.into_iter(),
            explicit,
            previous,
            kept: HashSet::new(),
            summary: RebuildSummary::default(),
            now,
        };
        walk.place(self, scope_id, forest)?;

        let mut removed: Vec<&String> = walk.previous.difference(&walk.kept).collect();
        removed.sort();
        for id in removed {
            self.items.remove(id.as_str());
            walk.summary.deleted += 1;
        }

        self.renumber();

        let summary = walk.summary;
        if !summary.is_noop() {
            if let Some(scope) = self.get_mut(scope_id) {
                scope.modified_at = now;
            }
        }
        Ok(summary)
    }
}

impl RebuildWalk {
    fn place(
        &mut self,
        tree: &mut TreeStore,
        parent_id: &str,
        nodes: &[ClientNode],
    ) -> Result<(), TreeError> {
        for (position, node) in nodes.iter().enumerate() {
            let position = position as u32;
            let content = self
                .contents
                .next()
                .ok_or_else(|| TreeError::corrupt("rebuild payload changed during the walk"))?;

            let id = match &node.id {
                Some(id) => id.clone(),
                None => self.derived_id(tree, parent_id, position, &content.name),
            };

            match tree.get_mut(&id) {
                Some(item) => {
                    let changed = item.name != content.name
                        || item.link != content.link
                        || item.visibility != content.visibility
                        || item.parent_id.as_deref() != Some(parent_id)
                        || item.position != position;
                    if changed {
                        item.name = content.name;
                        item.link = content.link;
                        item.visibility = content.visibility;
                        item.parent_id = Some(parent_id.to_string());
                        item.position = position;
                        item.modified_at = self.now;
                        self.summary.updated += 1;
                    }
                }
                None => {
                    let mut item =
                        MenuItem::new_leaf(tree.tree_id(), parent_id, content.name, self.now);
                    item.id = id.clone();
                    item.link = content.link;
                    item.visibility = content.visibility;
                    item.position = position;
                    tree.items.insert(id.clone(), item);
                    self.summary.created += 1;
                }
            }

            self.kept.insert(id.clone());
            self.place(tree, &id, &node.children)?;
        }
        Ok(())
    }

    /// Stable id for an entry submitted without one
    ///
    /// Falls back to a random id when the derived one is taken by an item
    /// this entry must not reuse.
    fn derived_id(&self, tree: &TreeStore, parent_id: &str, position: u32, name: &str) -> String {
        let key = format!("{}:{}:{}:{}", tree.tree_id(), parent_id, position, name);
        let id = Uuid::new_v5(&Uuid::NAMESPACE_OID, key.as_bytes()).to_string();

        let reusable = !tree.contains_id(&id)
            || (self.previous.contains(&id)
                && !self.explicit.contains(&id)
                && !self.kept.contains(&id));
        if reusable {
            id
        } else {
            Uuid::new_v4().to_string()
        }
    }
}

fn collect_ids(nodes: &[ClientNode], ids: &mut HashSet<String>) {
    for node in nodes {
        if let Some(id) = &node.id {
            ids.insert(id.clone());
        }
        collect_ids(&node.children, ids);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CreateTreeParams, ItemFields};

    fn tree(max_depth: u32) -> TreeStore {
        let params = CreateTreeParams {
            name: "Main".to_string(),
            slug: "main".to_string(),
            max_depth: Some(max_depth),
        };
        TreeStore::new_tree(&params, 3, Utc::now()).unwrap()
    }

    fn add(tree: &mut TreeStore, parent: &str, name: &str) -> String {
        let content = ItemFields::named(name).validate().unwrap();
        tree.insert(parent, Some(u32::MAX), content, Utc::now())
            .unwrap()
            .id
    }

    fn shape(tree: &TreeStore) -> Vec<(String, Option<String>, i64, i64, u32)> {
        tree.items()
            .into_iter()
            .map(|i| {
                (
                    i.id.clone(),
                    i.parent_id.clone(),
                    i.range_start,
                    i.range_end,
                    i.position,
                )
            })
            .collect()
    }

    #[test]
    fn test_rebuild_creates_nested_items() {
        let mut tree = tree(3);
        let root = tree.tree_id().to_string();
        let forest = vec![
            ClientNode::new("About").with_children(vec![ClientNode::new("Team")]),
            ClientNode::new("Blog"),
        ];

        let summary = tree.rebuild(&root, &forest, Utc::now()).unwrap();
        assert_eq!(summary.created, 3);
        assert_eq!(tree.item_count(), 4);
        let names: Vec<_> = tree.items().iter().map(|i| i.name.clone()).collect();
        assert_eq!(names, vec!["Main", "About", "Team", "Blog"]);
        tree.check_invariants().unwrap();
    }

    #[test]
    fn test_rebuild_is_idempotent() {
        let mut tree = tree(3);
        let root = tree.tree_id().to_string();
        let keep = add(&mut tree, &root, "Keep");
        let forest = vec![
            ClientNode::new("New").with_children(vec![ClientNode::existing(&keep, "Keep")]),
            ClientNode::new("Other"),
        ];

        tree.rebuild(&root, &forest, Utc::now()).unwrap();
        let first = shape(&tree);

        let summary = tree.rebuild(&root, &forest, Utc::now()).unwrap();
        assert!(summary.is_noop());
        assert_eq!(shape(&tree), first);
    }

    #[test]
    fn test_rebuild_deletes_omitted_subtrees() {
        let mut tree = tree(3);
        let root = tree.tree_id().to_string();
        let a = add(&mut tree, &root, "A");
        let a1 = add(&mut tree, &a, "A1");
        let b = add(&mut tree, &root, "B");

        let summary = tree
            .rebuild(&root, &[ClientNode::existing(&b, "B")], Utc::now())
            .unwrap();
        assert_eq!(summary.deleted, 2);
        assert!(!tree.contains_id(&a));
        assert!(!tree.contains_id(&a1));
        tree.check_invariants().unwrap();
    }

    #[test]
    fn test_rebuild_regroups_existing_items() {
        let mut tree = tree(3);
        let root = tree.tree_id().to_string();
        let a = add(&mut tree, &root, "A");
        let a1 = add(&mut tree, &a, "A1");

        // A1 becomes A's parent
        let forest = vec![ClientNode::existing(&a1, "A1")
            .with_children(vec![ClientNode::existing(&a, "A renamed")])];
        tree.rebuild(&root, &forest, Utc::now()).unwrap();

        assert_eq!(tree.get(&a).unwrap().parent_id.as_deref(), Some(a1.as_str()));
        assert_eq!(tree.get(&a).unwrap().name, "A renamed");
        assert_eq!(tree.depth_of(&a).unwrap(), 2);
        tree.check_invariants().unwrap();
    }

    #[test]
    fn test_rebuild_of_inner_scope_leaves_rest_alone() {
        let mut tree = tree(3);
        let root = tree.tree_id().to_string();
        let a = add(&mut tree, &root, "A");
        let b = add(&mut tree, &root, "B");
        let b1 = add(&mut tree, &b, "B1");

        tree.rebuild(&a, &[ClientNode::new("A1")], Utc::now()).unwrap();
        assert_eq!(tree.children_of(&a).unwrap().len(), 1);
        assert!(tree.contains_id(&b1));
        tree.check_invariants().unwrap();
    }

    #[test]
    fn test_rebuild_rejections_leave_tree_unchanged() {
        let mut tree = tree(2);
        let root = tree.tree_id().to_string();
        let a = add(&mut tree, &root, "A");
        let b = add(&mut tree, &root, "B");
        let before = tree.clone();

        let too_deep = vec![ClientNode::new("L1").with_children(vec![
            ClientNode::new("L2").with_children(vec![ClientNode::new("L3")]),
        ])];
        assert_eq!(
            tree.rebuild(&root, &too_deep, Utc::now()),
            Err(TreeError::depth_exceeded(2))
        );

        // B is in the tree but outside A's subtree
        assert!(matches!(
            tree.rebuild(&a, &[ClientNode::existing(&b, "B")], Utc::now()),
            Err(TreeError::InvalidParent { .. })
        ));
        assert!(matches!(
            tree.rebuild(&root, &[ClientNode::existing("ghost", "G")], Utc::now()),
            Err(TreeError::NodeNotFound { .. })
        ));
        assert!(matches!(
            tree.rebuild(&root, &[ClientNode::new(" ")], Utc::now()),
            Err(TreeError::Validation(_))
        ));
        assert_eq!(tree, before);
    }
}
