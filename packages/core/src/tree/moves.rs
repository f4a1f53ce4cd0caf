//! Move/Reparent Operator
//!
//! A single move relocates one subtree incrementally: it opens a gap at the
//! target slot (shifting right-hand ranges only when the free space is too
//! small) and translates the subtree's block of ranges into it. A batch
//! reorder instead reassigns parents and positions and reconciles the whole
//! tree with a full renumber, since several moves in one batch invalidate
//! the assumptions an incremental shift relies on.

use super::{TreeError, TreeStore, RANGE_SHIFT};
use crate::models::{MenuItem, ReorderEntry, ValidationError};
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};

impl TreeStore {
    /// Move an item with its subtree to `position` under `new_parent_id`
    ///
    /// `position` is the item's index among the new parent's children after
    /// the move; values past the end append.
    pub fn move_node(
        &mut self,
        id: &str,
        new_parent_id: &str,
        position: u32,
        now: DateTime<Utc>,
    ) -> Result<MenuItem, TreeError> {
        self.validate_move(id, new_parent_id)?;

        let node = self.require(id)?;
        let old_parent_id = node.parent_id.clone().unwrap_or_default();
        let width = node.range_end - node.range_start + 1;
        let old_depth = node.depth;
        let new_depth = self.require(new_parent_id)?.depth + 1;

        let mut siblings: Vec<String> = self
            .child_ids(new_parent_id)
            .into_iter()
            .filter(|sibling| sibling != id)
            .collect();
        let index = (position as usize).min(siblings.len());

        let (lo, mut hi) = self.gap_at(new_parent_id, &siblings, index)?;
        if hi - lo < width + 1 {
            let by = width + RANGE_SHIFT;
            self.shift_from(hi, by);
            hi += by;
        }

        // The shift may have carried the subtree along with it
        let (start, end) = self.range_of(id)?;
        let slack = hi - lo - width;
        let new_start = lo + 1 + (slack - 1) / 2;
        let delta = new_start - start;
        let depth_delta = i64::from(new_depth) - i64::from(old_depth);

        for item in self.all_mut() {
            if start <= item.range_start && item.range_end <= end {
                item.range_start += delta;
                item.range_end += delta;
                item.depth = (i64::from(item.depth) + depth_delta) as u32;
            }
        }

        let node = self.require_mut(id)?;
        node.parent_id = Some(new_parent_id.to_string());
        node.modified_at = now;

        siblings.insert(index, id.to_string());
        self.assign_positions(&siblings);
        if old_parent_id != new_parent_id {
            self.compact_positions(&old_parent_id);
        }

        Ok(self.require(id)?.clone())
    }

    /// Apply a batch of parent/position assignments as one operation
    ///
    /// Nothing is written unless every entry is valid: ids must be unique and
    /// known, the root cannot move, every target parent must be an item of
    /// this tree, the combined assignments must not create a cycle, and the
    /// deepest resulting item must respect the depth limit.
    pub fn reorder(
        &mut self,
        entries: &[ReorderEntry],
        now: DateTime<Utc>,
    ) -> Result<(), TreeError> {
        let root_id = self.root.id.clone();

        let mut requested: HashMap<&str, (&str, u32)> = HashMap::with_capacity(entries.len());
        for entry in entries {
            let parent_id = entry.parent_id.as_deref().unwrap_or(&root_id);
            if requested
                .insert(entry.id.as_str(), (parent_id, entry.position))
                .is_some()
            {
                return Err(ValidationError::DuplicateId(entry.id.clone()).into());
            }

            if self.require(&entry.id)?.is_root() {
                return Err(TreeError::invalid_parent(
                    &entry.id,
                    "the root item cannot be moved",
                ));
            }
            if !self.contains_id(parent_id) {
                return Err(TreeError::invalid_parent(
                    &entry.id,
                    format!("'{}' is not an item of this tree", parent_id),
                ));
            }
            if parent_id == entry.id {
                return Err(TreeError::invalid_parent(
                    &entry.id,
                    "an item cannot become its own parent",
                ));
            }
        }

        // Resulting parent of every non-root item
        let proposed: HashMap<&str, &str> = self
            .items
            .values()
            .map(|item| {
                let parent = match requested.get(item.id.as_str()) {
                    Some((parent, _)) => *parent,
                    None => item.parent_id.as_deref().unwrap_or(&root_id),
                };
                (item.id.as_str(), parent)
            })
            .collect();

        let limit = self.item_count();
        let mut deepest = 0;
        for id in proposed.keys() {
            let mut depth = 0;
            let mut cursor = *id;
            while cursor != root_id {
                cursor = proposed.get(cursor).copied().unwrap_or(root_id.as_str());
                depth += 1;
                if cursor == *id || depth > limit {
                    return Err(TreeError::invalid_parent(
                        *id,
                        "the requested order would make an item its own ancestor",
                    ));
                }
            }
            deepest = deepest.max(depth as u32);
        }
        if deepest > self.max_depth() {
            return Err(TreeError::depth_exceeded(self.max_depth()));
        }

        // Validation done; apply
        let mut affected: HashSet<String> = HashSet::new();
        let moves: Vec<(String, String, u32)> = requested
            .iter()
            .map(|(id, (parent, position))| (id.to_string(), parent.to_string(), *position))
            .collect();
        for (id, parent_id, _) in &moves {
            let item = self.require_mut(id)?;
            if let Some(old) = item.parent_id.replace(parent_id.clone()) {
                affected.insert(old);
            }
            item.modified_at = now;
            affected.insert(parent_id.clone());
        }

        let wanted: HashMap<&str, u32> = moves
            .iter()
            .map(|(id, _, position)| (id.as_str(), *position))
            .collect();
        for parent_id in &affected {
            let mut group: Vec<(u32, u8, i64, String)> = self
                .items
                .values()
                .filter(|item| item.parent_id.as_deref() == Some(parent_id.as_str()))
                .map(|item| match wanted.get(item.id.as_str()) {
                    Some(position) => (*position, 0, item.range_start, item.id.clone()),
                    None => (item.position, 1, item.range_start, item.id.clone()),
                })
                .collect();
            group.sort();
            let order: Vec<String> = group.into_iter().map(|(_, _, _, id)| id).collect();
            self.assign_positions(&order);
        }

        self.renumber();
        Ok(())
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

    fn entry(id: &str, parent_id: Option<&str>, position: u32) -> ReorderEntry {
        ReorderEntry {
            id: id.to_string(),
            parent_id: parent_id.map(str::to_string),
            position,
        }
    }

    fn child_names(tree: &TreeStore, parent: &str) -> Vec<String> {
        tree.children_of(parent)
            .unwrap()
            .iter()
            .map(|c| c.name.clone())
            .collect()
    }

    #[test]
    fn test_move_within_parent() {
        let mut tree = tree(3);
        let root = tree.tree_id().to_string();
        add(&mut tree, &root, "X");
        add(&mut tree, &root, "Y");
        let z = add(&mut tree, &root, "Z");

        tree.move_node(&z, &root, 0, Utc::now()).unwrap();
        assert_eq!(child_names(&tree, &root), vec!["Z", "X", "Y"]);
        tree.check_invariants().unwrap();
    }

    #[test]
    fn test_move_carries_subtree_and_depths() {
        let mut tree = tree(3);
        let root = tree.tree_id().to_string();
        let a = add(&mut tree, &root, "A");
        let a1 = add(&mut tree, &a, "A1");
        let a1x = add(&mut tree, &a1, "A1x");
        let b = add(&mut tree, &root, "B");

        tree.move_node(&a1, &b, 0, Utc::now()).unwrap();
        assert_eq!(child_names(&tree, &b), vec!["A1"]);
        assert!(child_names(&tree, &a).is_empty());
        assert_eq!(tree.depth_of(&a1x).unwrap(), 3);
        assert!(tree.get(&b).unwrap().contains(tree.get(&a1x).unwrap()));
        tree.check_invariants().unwrap();

        // Back up one level, to the end of the root's children
        tree.move_node(&a1, &root, 99, Utc::now()).unwrap();
        assert_eq!(child_names(&tree, &root), vec!["A", "B", "A1"]);
        assert_eq!(tree.depth_of(&a1x).unwrap(), 2);
        tree.check_invariants().unwrap();
    }

    #[test]
    fn test_move_opens_gap_when_needed() {
        let mut tree = tree(3);
        let root = tree.tree_id().to_string();
        let a = add(&mut tree, &root, "A");
        for i in 0..6 {
            add(&mut tree, &a, &format!("A{}", i));
        }
        let b = add(&mut tree, &root, "B");
        let c = add(&mut tree, &root, "C");

        // A's subtree is far wider than the free space between B and C
        tree.move_node(&a, &c, 0, Utc::now()).unwrap();
        assert_eq!(child_names(&tree, &root), vec!["B", "C"]);
        assert_eq!(tree.descendants_of(&c).unwrap().len(), 7);
        assert_eq!(tree.get(&b).unwrap().position, 0);
        tree.check_invariants().unwrap();
    }

    #[test]
    fn test_move_rejected_leaves_tree_unchanged() {
        let mut tree = tree(2);
        let root = tree.tree_id().to_string();
        let a = add(&mut tree, &root, "A");
        let b = add(&mut tree, &a, "B");
        let c = add(&mut tree, &root, "C");
        let before = tree.clone();

        assert_eq!(
            tree.move_node(&c, &b, 0, Utc::now()),
            Err(TreeError::depth_exceeded(2))
        );
        assert!(matches!(
            tree.move_node(&a, &b, 0, Utc::now()),
            Err(TreeError::InvalidParent { .. })
        ));
        assert_eq!(tree, before);
    }

    #[test]
    fn test_reorder_siblings() {
        let mut tree = tree(3);
        let root = tree.tree_id().to_string();
        let x = add(&mut tree, &root, "X");
        let y = add(&mut tree, &root, "Y");
        let z = add(&mut tree, &root, "Z");

        let entries = vec![
            entry(&z, None, 0),
            entry(&x, None, 1),
            entry(&y, Some(&root), 2),
        ];
        tree.reorder(&entries, Utc::now()).unwrap();
        assert_eq!(child_names(&tree, &root), vec!["Z", "X", "Y"]);
        tree.check_invariants().unwrap();
    }

    #[test]
    fn test_reorder_reparents_and_keeps_untouched_siblings() {
        let mut tree = tree(3);
        let root = tree.tree_id().to_string();
        let a = add(&mut tree, &root, "A");
        let b = add(&mut tree, &root, "B");
        add(&mut tree, &a, "A1");
        add(&mut tree, &a, "A2");

        let entries = vec![entry(&b, Some(&a), 1)];
        tree.reorder(&entries, Utc::now()).unwrap();
        assert_eq!(child_names(&tree, &root), vec!["A"]);
        assert_eq!(child_names(&tree, &a), vec!["A1", "B", "A2"]);
        tree.check_invariants().unwrap();
    }

    #[test]
    fn test_reorder_rejects_combined_cycle() {
        let mut tree = tree(3);
        let root = tree.tree_id().to_string();
        let a = add(&mut tree, &root, "A");
        let b = add(&mut tree, &root, "B");
        let before = tree.clone();

        // Each move is fine alone; together they form a cycle
        let entries = vec![
            entry(&a, Some(&b), 0),
            entry(&b, Some(&a), 0),
        ];
        assert!(matches!(
            tree.reorder(&entries, Utc::now()),
            Err(TreeError::InvalidParent { .. })
        ));
        assert_eq!(tree, before);
    }

    #[test]
    fn test_reorder_rejects_invalid_batches() {
        let mut tree = tree(1);
        let root = tree.tree_id().to_string();
        let a = add(&mut tree, &root, "A");
        let b = add(&mut tree, &root, "B");
        let before = tree.clone();

        let too_deep = vec![entry(&b, Some(&a), 0)];
        assert_eq!(
            tree.reorder(&too_deep, Utc::now()),
            Err(TreeError::depth_exceeded(1))
        );

        let foreign = vec![entry(&b, Some("other-tree-item"), 0)];
        assert!(matches!(
            tree.reorder(&foreign, Utc::now()),
            Err(TreeError::InvalidParent { .. })
        ));

        let unknown = vec![entry("nope", None, 0)];
        assert!(matches!(
            tree.reorder(&unknown, Utc::now()),
            Err(TreeError::NodeNotFound { .. })
        ));

        let duplicate = vec![entry(&a, None, 0), entry(&a, None, 1)];
        assert!(matches!(
            tree.reorder(&duplicate, Utc::now()),
            Err(TreeError::Validation(ValidationError::DuplicateId(_)))
        ));
        assert_eq!(tree, before);
    }
}
