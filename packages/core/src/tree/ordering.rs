//! Ordering Store: the containment-interval encoding of a tree
//!
//! Ranges are gapped. A full [`renumber`](TreeStore::renumber) hands out
//! range slots with a stride of [`RANGE_STEP`], which leaves free space
//! between neighbours. `insert` places a new leaf inside that free space and
//! only shifts ranges at or to the right of the insertion point when the gap
//! is exhausted; the rest of the tree is never touched.

use super::{TreeError, TreeStore};
use crate::models::{ItemContent, MenuItem};
use chrono::{DateTime, Utc};
use std::collections::HashMap;

/// Distance between consecutive range slots after a full renumber
pub const RANGE_STEP: i64 = 16;

/// Extra room opened when an insertion point runs out of free slots
pub const RANGE_SHIFT: i64 = 16 * RANGE_STEP;

impl TreeStore {
    /// Containment interval of one item
    pub fn range_of(&self, id: &str) -> Result<(i64, i64), TreeError> {
        self.require(id).map(MenuItem::range)
    }

    /// Direct children of an item, ordered by position
    pub fn children_of(&self, id: &str) -> Result<Vec<&MenuItem>, TreeError> {
        self.require(id)?;
        let mut children: Vec<&MenuItem> = self
            .items
            .values()
            .filter(|item| item.parent_id.as_deref() == Some(id))
            .collect();
        children.sort_by_key(|item| (item.position, item.range_start));
        Ok(children)
    }

    /// Every descendant of an item in pre-order
    pub fn descendants_of(&self, id: &str) -> Result<Vec<&MenuItem>, TreeError> {
        let node = self.require(id)?;
        let mut descendants: Vec<&MenuItem> =
            self.all().filter(|item| node.contains(item)).collect();
        descendants.sort_by_key(|item| item.range_start);
        Ok(descendants)
    }

    /// Every ancestor of an item, root first
    pub fn ancestors_of(&self, id: &str) -> Result<Vec<&MenuItem>, TreeError> {
        let node = self.require(id)?;
        let mut ancestors: Vec<&MenuItem> =
            self.all().filter(|item| item.contains(node)).collect();
        ancestors.sort_by_key(|item| item.range_start);
        Ok(ancestors)
    }

    /// Ids of an item's children in sibling order
    pub(super) fn child_ids(&self, parent_id: &str) -> Vec<String> {
        let mut children: Vec<(u32, i64, &str)> = self
            .items
            .values()
            .filter(|item| item.parent_id.as_deref() == Some(parent_id))
            .map(|item| (item.position, item.range_start, item.id.as_str()))
            .collect();
        children.sort();
        children.into_iter().map(|(_, _, id)| id.to_string()).collect()
    }

    /// Free interval `(lo, hi)` where a child at `index` of `parent_id` goes
    ///
    /// `siblings` is the sibling order the new child is inserted into (not
    /// containing the child itself). Anything placed strictly between `lo`
    /// and `hi` lands inside the parent and between the two neighbours.
    pub(super) fn gap_at(
        &self,
        parent_id: &str,
        siblings: &[String],
        index: usize,
    ) -> Result<(i64, i64), TreeError> {
        let parent = self.require(parent_id)?;
        let lo = match index.checked_sub(1).and_then(|i| siblings.get(i)) {
            Some(prev) => self.require(prev)?.range_end,
            None => parent.range_start,
        };
        let hi = match siblings.get(index) {
            Some(next) => self.require(next)?.range_start,
            None => parent.range_end,
        };
        Ok((lo, hi))
    }

    /// Shift every range boundary at or right of `at` by `by`
    ///
    /// Items entirely to the right move as a block; items spanning `at`
    /// (ancestors of the insertion point) only grow at their end.
    pub(super) fn shift_from(&mut self, at: i64, by: i64) {
        for item in self.all_mut() {
            if item.range_start >= at {
                item.range_start += by;
            }
            if item.range_end >= at {
                item.range_end += by;
            }
        }
    }

    /// Reassign positions `0..n` to a parent's children, keeping their order
    pub(super) fn compact_positions(&mut self, parent_id: &str) {
        let order = self.child_ids(parent_id);
        self.assign_positions(&order);
    }

    pub(super) fn assign_positions(&mut self, order: &[String]) {
        for (position, id) in order.iter().enumerate() {
            if let Some(item) = self.items.get_mut(id) {
                item.position = position as u32;
            }
        }
    }

    /// Create a new leaf under `parent_id`
    ///
    /// `after_position = None` makes it the first child; otherwise it goes
    /// right after the sibling at that position (appended when past the end).
    pub fn insert(
        &mut self,
        parent_id: &str,
        after_position: Option<u32>,
        content: ItemContent,
        now: DateTime<Utc>,
    ) -> Result<MenuItem, TreeError> {
        let parent_depth = self.require(parent_id)?.depth;
        let depth = parent_depth + 1;
        if depth > self.max_depth() {
            return Err(TreeError::depth_exceeded(self.max_depth()));
        }

        let mut siblings = self.child_ids(parent_id);
        let index = match after_position {
            None => 0,
            Some(after) => (after as usize).saturating_add(1).min(siblings.len()),
        };

        let (lo, mut hi) = self.gap_at(parent_id, &siblings, index)?;
        if hi - lo < 3 {
            self.shift_from(hi, RANGE_SHIFT);
            hi += RANGE_SHIFT;
        }
        let third = (hi - lo) / 3;

        let mut item = MenuItem::new_leaf(self.tree_id(), parent_id, content.name, now);
        item.link = content.link;
        item.visibility = content.visibility;
        item.depth = depth;
        item.range_start = lo + third;
        item.range_end = hi - third;

        siblings.insert(index, item.id.clone());
        self.items.insert(item.id.clone(), item.clone());
        self.assign_positions(&siblings);

        Ok(self.require(&item.id)?.clone())
    }

    /// Remove an item and its entire subtree
    ///
    /// Returns the removed ids in pre-order. Freed ranges are left as gaps.
    /// The root cannot be removed this way; removing it means deleting the tree.
    pub fn remove(&mut self, id: &str) -> Result<Vec<String>, TreeError> {
        let node = self.require(id)?;
        if node.is_root() {
            return Err(TreeError::invalid_parent(
                id,
                "the root item can only be removed by deleting its tree",
            ));
        }
        let parent_id = node.parent_id.clone().unwrap_or_default();

        let removed: Vec<String> = std::iter::once(id.to_string())
            .chain(self.descendants_of(id)?.into_iter().map(|d| d.id.clone()))
            .collect();
        for removed_id in &removed {
            self.items.remove(removed_id);
        }
        self.compact_positions(&parent_id);

        Ok(removed)
    }

    /// Recompute every range, depth and position from the parent links
    ///
    /// In-order traversal from the root: `range_start` takes the counter,
    /// children follow in sibling order, then `range_end` takes the counter;
    /// the counter advances by [`RANGE_STEP`] at every step. The result only
    /// depends on the structure, so renumbering is idempotent.
    pub fn renumber(&mut self) {
        let mut children: HashMap<String, Vec<String>> = HashMap::new();
        let mut keyed: Vec<(&str, u32, i64, &str)> = self
            .items
            .values()
            .filter_map(|item| {
                item.parent_id
                    .as_deref()
                    .map(|p| (p, item.position, item.range_start, item.id.as_str()))
            })
            .collect();
        keyed.sort();
        for (parent, _, _, id) in keyed {
            children
                .entry(parent.to_string())
                .or_default()
                .push(id.to_string());
        }

        let mut counter = 0;
        let root_id = self.root.id.clone();
        self.assign_ranges(&root_id, 0, 0, &children, &mut counter);
    }

    fn assign_ranges(
        &mut self,
        id: &str,
        depth: u32,
        position: u32,
        children: &HashMap<String, Vec<String>>,
        counter: &mut i64,
    ) {
        let start = *counter;
        *counter += RANGE_STEP;

        if let Some(kids) = children.get(id) {
            for (index, child) in kids.iter().enumerate() {
                self.assign_ranges(child, depth + 1, index as u32, children, counter);
            }
        }

        let end = *counter;
        *counter += RANGE_STEP;

        if let Some(item) = self.get_mut(id) {
            item.range_start = start;
            item.range_end = end;
            item.depth = depth;
            item.position = position;
        }
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

    fn content(name: &str) -> ItemContent {
        ItemFields::named(name).validate().unwrap()
    }

    #[test]
    fn test_insert_appends_and_prepends() {
        let mut tree = tree(3);
        let root = tree.tree_id().to_string();
        let a = tree.insert(&root, Some(u32::MAX), content("A"), Utc::now()).unwrap();
        let b = tree.insert(&root, Some(u32::MAX), content("B"), Utc::now()).unwrap();
        let first = tree.insert(&root, None, content("First"), Utc::now()).unwrap();

        let names: Vec<_> = tree
            .children_of(&root)
            .unwrap()
            .iter()
            .map(|c| c.name.clone())
            .collect();
        assert_eq!(names, vec!["First", "A", "B"]);
        assert_eq!(tree.get(&first.id).unwrap().position, 0);
        assert_eq!(tree.get(&a.id).unwrap().position, 1);
        assert_eq!(tree.get(&b.id).unwrap().position, 2);
        tree.check_invariants().unwrap();
    }

    #[test]
    fn test_insert_past_last_sibling_appends() {
        let mut tree = tree(3);
        let root = tree.tree_id().to_string();
        tree.insert(&root, Some(7), content("A"), Utc::now()).unwrap();
        tree.insert(&root, Some(u32::MAX - 1), content("B"), Utc::now())
            .unwrap();
        let c = tree.insert(&root, Some(u32::MAX), content("C"), Utc::now())
            .unwrap();

        assert_eq!(c.position, 2);
        let names: Vec<_> = tree
            .children_of(&root)
            .unwrap()
            .iter()
            .map(|c| c.name.clone())
            .collect();
        assert_eq!(names, vec!["A", "B", "C"]);
        tree.check_invariants().unwrap();
    }

    #[test]
    fn test_insert_shifts_only_when_gap_exhausted() {
        let mut tree = tree(3);
        let root = tree.tree_id().to_string();
        // Repeated inserts at the same spot eventually exhaust the gap
        for i in 0..40 {
            tree.insert(&root, None, content(&format!("N{}", i)), Utc::now())
                .unwrap();
            tree.check_invariants().unwrap();
        }
        assert_eq!(tree.children_of(&root).unwrap().len(), 40);
        assert_eq!(tree.children_of(&root).unwrap()[0].name, "N39");
    }

    #[test]
    fn test_insert_rejects_depth_beyond_limit() {
        let mut tree = tree(1);
        let root = tree.tree_id().to_string();
        let a = tree.insert(&root, None, content("A"), Utc::now()).unwrap();
        let before = tree.clone();

        let err = tree.insert(&a.id, None, content("Too deep"), Utc::now());
        assert_eq!(err, Err(TreeError::depth_exceeded(1)));
        assert_eq!(tree, before);
    }

    #[test]
    fn test_remove_cascades_and_compacts() {
        let mut tree = tree(3);
        let root = tree.tree_id().to_string();
        let a = tree.insert(&root, None, content("A"), Utc::now()).unwrap();
        let b = tree.insert(&root, Some(0), content("B"), Utc::now()).unwrap();
        let a1 = tree.insert(&a.id, None, content("A1"), Utc::now()).unwrap();

        let removed = tree.remove(&a.id).unwrap();
        assert_eq!(removed, vec![a.id.clone(), a1.id.clone()]);
        assert!(!tree.contains_id(&a1.id));
        assert_eq!(tree.get(&b.id).unwrap().position, 0);
        tree.check_invariants().unwrap();
    }

    #[test]
    fn test_remove_root_rejected() {
        let mut tree = tree(3);
        let root = tree.tree_id().to_string();
        assert!(matches!(
            tree.remove(&root),
            Err(TreeError::InvalidParent { .. })
        ));
    }

    #[test]
    fn test_renumber_uses_stride_and_is_idempotent() {
        let mut tree = tree(3);
        let root = tree.tree_id().to_string();
        let a = tree.insert(&root, None, content("A"), Utc::now()).unwrap();
        tree.insert(&a.id, None, content("A1"), Utc::now()).unwrap();
        tree.insert(&root, Some(0), content("B"), Utc::now()).unwrap();

        tree.renumber();
        let first = tree.clone();
        assert_eq!(tree.root().range(), (0, 7 * RANGE_STEP));
        assert_eq!(tree.range_of(&a.id).unwrap(), (RANGE_STEP, 4 * RANGE_STEP));

        tree.renumber();
        assert_eq!(tree, first);
        tree.check_invariants().unwrap();
    }

    #[test]
    fn test_ancestors_and_descendants() {
        let mut tree = tree(3);
        let root = tree.tree_id().to_string();
        let a = tree.insert(&root, None, content("A"), Utc::now()).unwrap();
        let a1 = tree.insert(&a.id, None, content("A1"), Utc::now()).unwrap();
        let a1x = tree.insert(&a1.id, None, content("A1x"), Utc::now()).unwrap();

        let ancestors: Vec<_> = tree
            .ancestors_of(&a1x.id)
            .unwrap()
            .iter()
            .map(|i| i.id.clone())
            .collect();
        assert_eq!(ancestors, vec![root.clone(), a.id.clone(), a1.id.clone()]);

        let descendants: Vec<_> = tree
            .descendants_of(&a.id)
            .unwrap()
            .iter()
            .map(|i| i.id.clone())
            .collect();
        assert_eq!(descendants, vec![a1.id.clone(), a1x.id.clone()]);
    }
}
