//! Menu Tree Engine
//!
//! [`TreeStore`] exclusively owns every item of one menu tree and exposes the
//! only operations that may change its structure:
//!
//! - **Ordering Store** (`ordering`): gapped containment-interval encoding,
//!   `insert`, `remove`, full `renumber`, and the read accessors
//! - **Depth Validator** (`depth`): depth and subtree height, move validation
//! - **Move/Reparent Operator** (`moves`): single incremental move and batch
//!   reorder
//! - **Subtree Rebuilder** (`rebuild`): replace a subtree with a client forest
//!
//! Every mutating method validates all of its preconditions before writing, so
//! an `Err` leaves the store untouched. Callers that need transactional
//! persistence apply operations to a working copy and commit it only on
//! success (see `db::MenuStore::mutate_tree`).

mod depth;
mod error;
mod moves;
mod ordering;
mod rebuild;


pub use error::TreeError;
pub use ordering::{RANGE_SHIFT, RANGE_STEP};
pub use rebuild::RebuildSummary;

use crate::models::{ContentUpdate, CreateTreeParams, MenuItem, MenuMeta, ValidationError};
use chrono::{DateTime, Utc};
use std::collections::HashMap;

/// One menu tree: its root plus all descendants
#[derive(Debug, Clone, PartialEq)]
pub struct TreeStore {
    /// The root item; its id is the tree id
    root: MenuItem,
    /// Every non-root item keyed by id
    items: HashMap<String, MenuItem>,
}

impl TreeStore {
    /// Create a new tree consisting of its root only
    pub fn new_tree(
        params: &CreateTreeParams,
        default_max_depth: u32,
        now: DateTime<Utc>,
    ) -> Result<Self, TreeError> {
        params.validate()?;

        let meta = MenuMeta {
            slug: params.slug.clone(),
            max_depth: params.max_depth.unwrap_or(default_max_depth),
        };
        let mut root = MenuItem::new_root(params.name.trim(), meta, now);
        root.range_start = 0;
        root.range_end = RANGE_STEP;

        Ok(Self {
            root,
            items: HashMap::new(),
        })
    }

    /// Reassemble a tree from stored items
    ///
    /// Requires exactly one root, a consistent `tree_id`, and a present parent
    /// for every other item. Ranges are taken as stored; run
    /// [`check_invariants`](Self::check_invariants) to verify them.
    pub fn from_items(items: Vec<MenuItem>) -> Result<Self, TreeError> {
        let mut root = None;
        let mut rest = HashMap::with_capacity(items.len());

        for item in items {
            if item.is_root() {
                if root.is_some() {
                    return Err(TreeError::corrupt("more than one root item"));
                }
                root = Some(item);
            } else {
                rest.insert(item.id.clone(), item);
            }
        }

        let root = root.ok_or_else(|| TreeError::corrupt("tree has no root item"))?;
        if root.menu.is_none() {
            return Err(TreeError::corrupt(format!(
                "root item '{}' carries no menu metadata",
                root.id
            )));
        }

        for item in rest.values() {
            if item.tree_id != root.id {
                return Err(TreeError::corrupt(format!(
                    "item '{}' belongs to tree '{}', expected '{}'",
                    item.id, item.tree_id, root.id
                )));
            }
            let parent_known = item
                .parent_id
                .as_deref()
                .is_some_and(|p| p == root.id || rest.contains_key(p));
            if !parent_known {
                return Err(TreeError::corrupt(format!(
                    "item '{}' has a missing parent",
                    item.id
                )));
            }
        }

        Ok(Self { root, items: rest })
    }

    pub fn tree_id(&self) -> &str {
        &self.root.id
    }

    pub fn root(&self) -> &MenuItem {
        &self.root
    }

    pub fn slug(&self) -> &str {
        self.root.menu.as_ref().map_or("", |m| m.slug.as_str())
    }

    pub fn max_depth(&self) -> u32 {
        self.root.max_depth().unwrap_or(crate::models::DEFAULT_MAX_DEPTH)
    }

    /// Number of items including the root
    pub fn item_count(&self) -> usize {
        self.items.len() + 1
    }

    pub fn get(&self, id: &str) -> Option<&MenuItem> {
        if id == self.root.id {
            Some(&self.root)
        } else {
            self.items.get(id)
        }
    }

    pub fn contains_id(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    fn get_mut(&mut self, id: &str) -> Option<&mut MenuItem> {
        if id == self.root.id {
            Some(&mut self.root)
        } else {
            self.items.get_mut(id)
        }
    }

    fn require(&self, id: &str) -> Result<&MenuItem, TreeError> {
        self.get(id).ok_or_else(|| TreeError::node_not_found(id))
    }

    fn require_mut(&mut self, id: &str) -> Result<&mut MenuItem, TreeError> {
        self.get_mut(id).ok_or_else(|| TreeError::node_not_found(id))
    }

    /// All items, root first, in no particular order afterwards
    fn all(&self) -> impl Iterator<Item = &MenuItem> {
        std::iter::once(&self.root).chain(self.items.values())
    }

    fn all_mut(&mut self) -> impl Iterator<Item = &mut MenuItem> {
        std::iter::once(&mut self.root).chain(self.items.values_mut())
    }

    /// Every item in pre-order (ascending `range_start`)
    pub fn items(&self) -> Vec<&MenuItem> {
        let mut all: Vec<&MenuItem> = self.all().collect();
        all.sort_by_key(|item| item.range_start);
        all
    }

    /// Owned copy of every item in pre-order
    pub fn to_items(&self) -> Vec<MenuItem> {
        self.items().into_iter().cloned().collect()
    }

    /// Apply a validated, non-structural update to one item
    ///
    /// `slug` and `max_depth` are only accepted on the root; lowering
    /// `max_depth` below the current tree height fails with `DepthExceeded`.
    pub fn update_fields(
        &mut self,
        id: &str,
        update: &ContentUpdate,
        now: DateTime<Utc>,
    ) -> Result<MenuItem, TreeError> {
        let is_root = self.require(id)?.is_root();

        if !is_root && update.slug.is_some() {
            return Err(ValidationError::InvalidSlug(
                "slug can only be set on a tree root".to_string(),
            )
            .into());
        }
        if !is_root && update.max_depth.is_some() {
            return Err(ValidationError::InvalidMaxDepth(
                "maxDepth can only be set on a tree root".to_string(),
            )
            .into());
        }
        if let Some(limit) = update.max_depth {
            if self.height() > limit {
                return Err(TreeError::depth_exceeded(limit));
            }
        }

        let item = self.require_mut(id)?;
        if let Some(name) = &update.name {
            item.name = name.clone();
        }
        if let Some(link) = &update.link {
            item.link = link.clone();
        }
        if let Some(visibility) = &update.visibility {
            item.visibility = visibility.clone();
        }
        if let Some(meta) = item.menu.as_mut() {
            if let Some(slug) = &update.slug {
                meta.slug = slug.clone();
            }
            if let Some(max_depth) = update.max_depth {
                meta.max_depth = max_depth;
            }
        }
        item.modified_at = now;

        Ok(item.clone())
    }

    /// Verify every structural invariant of the tree
    ///
    /// - exactly one root, containing every other item
    /// - every parent exists in the tree and contains its children
    /// - sibling positions are `0..n` and sibling ranges are disjoint and
    ///   ordered like their positions
    /// - ancestry along `parent_id` matches range containment
    /// - cached depth equals ancestor count and never exceeds `max_depth`
    pub fn check_invariants(&self) -> Result<(), TreeError> {
        let root = &self.root;
        if root.menu.is_none() || root.depth != 0 {
            return Err(TreeError::corrupt("root item is malformed"));
        }

        for item in self.all() {
            if item.range_start >= item.range_end {
                return Err(TreeError::corrupt(format!(
                    "item '{}' has an empty range",
                    item.id
                )));
            }
            if item.tree_id != root.id {
                return Err(TreeError::corrupt(format!(
                    "item '{}' is tagged with another tree",
                    item.id
                )));
            }
        }

        // One sweep in range order: the innermost open range must be the
        // parent, which also rules out cycles and partial overlaps
        let mut open: Vec<&MenuItem> = Vec::new();
        for item in self.items() {
            while open
                .last()
                .is_some_and(|top| top.range_end <= item.range_start)
            {
                open.pop();
            }

            match (open.last(), item.parent_id.as_deref()) {
                (None, None) if item.id == root.id => {}
                (Some(parent), Some(parent_id)) if parent.id == parent_id => {
                    if !parent.contains(item) {
                        return Err(TreeError::corrupt(format!(
                            "parent '{}' does not contain child '{}'",
                            parent.id, item.id
                        )));
                    }
                }
                (None, _) => {
                    return Err(TreeError::corrupt(format!(
                        "root range does not contain item '{}'",
                        item.id
                    )));
                }
                (Some(enclosing), _) => {
                    return Err(TreeError::corrupt(format!(
                        "range containment of '{}' and '{}' disagrees with parent links",
                        enclosing.id, item.id
                    )));
                }
            }

            if !item.is_root() && item.menu.is_some() {
                return Err(TreeError::corrupt(format!(
                    "non-root item '{}' carries menu metadata",
                    item.id
                )));
            }
            let depth = open.len() as u32;
            if item.depth != depth {
                return Err(TreeError::corrupt(format!(
                    "item '{}' caches depth {} but sits at depth {}",
                    item.id, item.depth, depth
                )));
            }
            if depth > self.max_depth() {
                return Err(TreeError::corrupt(format!(
                    "item '{}' sits at depth {} beyond the limit of {}",
                    item.id,
                    depth,
                    self.max_depth()
                )));
            }
            open.push(item);
        }

        // Sibling groups
        let mut groups: HashMap<&str, Vec<&MenuItem>> = HashMap::new();
        for item in self.items.values() {
            if let Some(parent_id) = item.parent_id.as_deref() {
                groups.entry(parent_id).or_default().push(item);
            }
        }
        for (parent_id, mut siblings) in groups {
            siblings.sort_by_key(|s| s.position);
            for (index, pair) in siblings.windows(2).enumerate() {
                if pair[0].position != index as u32 || pair[0].range_end >= pair[1].range_start {
                    return Err(TreeError::corrupt(format!(
                        "children of '{}' are out of order at position {}",
                        parent_id, index
                    )));
                }
            }
            if let Some(last) = siblings.last() {
                if last.position as usize != siblings.len() - 1 {
                    return Err(TreeError::corrupt(format!(
                        "children of '{}' have non-contiguous positions",
                        parent_id
                    )));
                }
            }
        }

        Ok(())
    }
}
