//! Menu Service
//!
//! Orchestrates the persistent store, the resource resolver and the tree
//! engine. Every structural call runs as exactly one `MenuStore::mutate_tree`
//! transaction; payloads are validated before the store is touched.
//!
//! # Concurrency
//!
//! Structural writers of one tree are serialized per process by a
//! `tokio::sync::Mutex` keyed by tree id. The lock table only holds weak
//! handles, so a tree's entry lives as long as some writer holds its lock.
//! Across processes SQLite's write lock serializes writers and the last commit
//! wins. Field edits and reads take no lock.

use crate::db::MenuStore;
use crate::models::{
    validate_forest, ClientNode, CreateItemParams, CreateTreeParams, ItemUpdate, MenuItem,
    ReorderEntry, ValidationError, DEFAULT_MAX_DEPTH,
};
use crate::services::MenuServiceError;
use crate::tree::{RebuildSummary, TreeError, TreeStore};
use crate::visibility::{filter, Resolutions, ResourceResolver};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Weak};
use tokio::sync::Mutex;

/// Who is reading a tree
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Audience {
    /// Anonymous readers: the visibility cascade applies
    #[default]
    Public,
    /// Administrators: every item, unfiltered
    Admin,
}

/// Service configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MenuServiceConfig {
    /// Depth limit for trees created without an explicit `max_depth`
    pub default_max_depth: u32,
}

impl Default for MenuServiceConfig {
    fn default() -> Self {
        Self {
            default_max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

/// Result of a subtree rebuild
#[derive(Debug, Clone)]
pub struct RebuildOutcome {
    pub summary: RebuildSummary,
    /// Every item of the tree after the rebuild, in pre-order
    pub items: Vec<MenuItem>,
}

/// Menu tree operations over a persistent store
#[derive(Clone)]
pub struct MenuService {
    store: MenuStore,
    resolver: Arc<dyn ResourceResolver>,
    config: MenuServiceConfig,
    write_locks: Arc<Mutex<HashMap<String, Weak<Mutex<()>>>>>,
}

impl MenuService {
    pub fn new(
        store: MenuStore,
        resolver: Arc<dyn ResourceResolver>,
        config: MenuServiceConfig,
    ) -> Self {
        Self {
            store,
            resolver,
            config,
            write_locks: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn config(&self) -> &MenuServiceConfig {
        &self.config
    }

    pub fn store(&self) -> &MenuStore {
        &self.store
    }

    // Trees

    /// Create a tree consisting of its root item
    pub async fn create_tree(&self, params: CreateTreeParams) -> Result<MenuItem, MenuServiceError> {
        params.validate()?;
        if self.store.tree_id_by_slug(&params.slug).await?.is_some() {
            return Err(MenuServiceError::duplicate_slug(&params.slug));
        }

        let tree = TreeStore::new_tree(&params, self.config.default_max_depth, Utc::now())?;
        if let Err(e) = self.store.insert_tree(&tree).await {
            // A concurrent create may have claimed the slug after the check
            if self.store.tree_id_by_slug(&params.slug).await?.is_some() {
                return Err(MenuServiceError::duplicate_slug(&params.slug));
            }
            return Err(e.into());
        }

        tracing::info!(
            tree_id = tree.tree_id(),
            slug = tree.slug(),
            max_depth = tree.max_depth(),
            "Created menu tree"
        );
        Ok(tree.root().clone())
    }

    /// Root items of every tree, ordered by name
    pub async fn list_trees(&self) -> Result<Vec<MenuItem>, MenuServiceError> {
        Ok(self.store.list_roots().await?)
    }

    /// The root item of one tree
    pub async fn get_tree_meta(&self, tree_id: &str) -> Result<MenuItem, MenuServiceError> {
        Ok(self.load(tree_id).await?.root().clone())
    }

    /// Delete a tree with all of its items; returns the deleted ids
    pub async fn delete_tree(&self, tree_id: &str) -> Result<Vec<String>, MenuServiceError> {
        let lock = self.write_lock(tree_id).await;
        let _guard = lock.lock().await;

        let tree = self.load(tree_id).await?;
        let removed: Vec<String> = tree.items().iter().map(|item| item.id.clone()).collect();
        if !self.store.delete_tree(tree_id).await? {
            return Err(MenuServiceError::tree_not_found(tree_id));
        }

        tracing::info!(tree_id, deleted = removed.len(), "Deleted menu tree");
        Ok(removed)
    }

    // Reads

    /// Items of one tree in pre-order
    ///
    /// Public readers get the visibility-filtered list as of `as_of`.
    pub async fn list_items(
        &self,
        tree_id: &str,
        audience: Audience,
        as_of: DateTime<Utc>,
    ) -> Result<Vec<MenuItem>, MenuServiceError> {
        let tree = self.load(tree_id).await?;
        let items = tree.to_items();
        match audience {
            Audience::Admin => Ok(items),
            Audience::Public => {
                let resolutions = Resolutions::collect(self.resolver.as_ref(), &items).await;
                Ok(filter(items, as_of, &resolutions))
            }
        }
    }

    /// Public view of the tree with this slug, together with its tree id
    pub async fn list_public_by_slug(
        &self,
        slug: &str,
        as_of: DateTime<Utc>,
    ) -> Result<(String, Vec<MenuItem>), MenuServiceError> {
        let tree_id = self
            .store
            .tree_id_by_slug(slug)
            .await?
            .ok_or_else(|| MenuServiceError::tree_not_found(slug))?;
        let items = self.list_items(&tree_id, Audience::Public, as_of).await?;
        Ok((tree_id, items))
    }

    // Items

    /// Create one item
    ///
    /// `parent_id = None` attaches it under the root; `position = None`
    /// appends it after the last sibling.
    pub async fn create_item(
        &self,
        tree_id: &str,
        params: CreateItemParams,
    ) -> Result<MenuItem, MenuServiceError> {
        let content = params.fields.validate()?;
        self.ensure_tree(tree_id).await?;
        if let Some(parent_id) = &params.parent_id {
            self.ensure_in_tree(parent_id, parent_id, tree_id).await?;
        }
        let after_position = match params.position {
            None => Some(u32::MAX),
            Some(0) => None,
            Some(position) => Some(position - 1),
        };

        let lock = self.write_lock(tree_id).await;
        let _guard = lock.lock().await;

        let now = Utc::now();
        let (_, item) = self
            .store
            .mutate_tree::<_, MenuServiceError, _>(tree_id, |tree| {
                let parent_id = params
                    .parent_id
                    .clone()
                    .unwrap_or_else(|| tree.tree_id().to_string());
                Ok(tree.insert(&parent_id, after_position, content, now)?)
            })
            .await?
            .ok_or_else(|| MenuServiceError::tree_not_found(tree_id))?;

        tracing::info!(tree_id, item_id = %item.id, depth = item.depth, "Created menu item");
        Ok(item)
    }

    /// Update non-structural fields of one item
    pub async fn update_item(
        &self,
        item_id: &str,
        update: ItemUpdate,
    ) -> Result<MenuItem, MenuServiceError> {
        if update.is_empty() {
            return Err(ValidationError::MissingField("at least one field".to_string()).into());
        }
        let update = update.validate()?;
        let tree_id = self.tree_of_item(item_id).await?;

        if let Some(slug) = &update.slug {
            if let Some(owner) = self.store.tree_id_by_slug(slug).await? {
                if owner != tree_id {
                    return Err(MenuServiceError::duplicate_slug(slug));
                }
            }
        }

        let now = Utc::now();
        let (_, item) = self
            .store
            .mutate_tree::<_, MenuServiceError, _>(&tree_id, |tree| {
                Ok(tree.update_fields(item_id, &update, now)?)
            })
            .await?
            .ok_or_else(|| MenuServiceError::node_not_found(item_id))?;

        tracing::debug!(tree_id, item_id, "Updated menu item");
        Ok(item)
    }

    /// Delete an item with its subtree; returns the deleted ids
    ///
    /// Deleting a root deletes the whole tree.
    pub async fn delete_item(&self, item_id: &str) -> Result<Vec<String>, MenuServiceError> {
        let tree_id = self.tree_of_item(item_id).await?;
        if tree_id == item_id {
            return self.delete_tree(&tree_id).await;
        }

        let lock = self.write_lock(&tree_id).await;
        let _guard = lock.lock().await;

        let (_, removed) = self
            .store
            .mutate_tree::<_, MenuServiceError, _>(&tree_id, |tree| Ok(tree.remove(item_id)?))
            .await?
            .ok_or_else(|| MenuServiceError::node_not_found(item_id))?;

        tracing::info!(tree_id, item_id, deleted = removed.len(), "Deleted menu item");
        Ok(removed)
    }

    /// Move one item with its subtree
    ///
    /// `parent_id = None` moves it directly under the root.
    pub async fn move_item(
        &self,
        item_id: &str,
        parent_id: Option<&str>,
        position: u32,
    ) -> Result<MenuItem, MenuServiceError> {
        let tree_id = self.tree_of_item(item_id).await?;
        if let Some(parent_id) = parent_id {
            self.ensure_in_tree(item_id, parent_id, &tree_id).await?;
        }

        let lock = self.write_lock(&tree_id).await;
        let _guard = lock.lock().await;

        let now = Utc::now();
        let (_, item) = self
            .store
            .mutate_tree::<_, MenuServiceError, _>(&tree_id, |tree| {
                let parent_id = parent_id
                    .map(str::to_string)
                    .unwrap_or_else(|| tree.tree_id().to_string());
                Ok(tree.move_node(item_id, &parent_id, position, now)?)
            })
            .await?
            .ok_or_else(|| MenuServiceError::node_not_found(item_id))?;

        tracing::info!(
            tree_id,
            item_id,
            parent_id = item.parent_id.as_deref().unwrap_or_default(),
            position = item.position,
            "Moved menu item"
        );
        Ok(item)
    }

    /// Apply a batch of moves atomically; returns the tree's items afterwards
    pub async fn reorder(
        &self,
        tree_id: &str,
        entries: &[ReorderEntry],
    ) -> Result<Vec<MenuItem>, MenuServiceError> {
        self.ensure_tree(tree_id).await?;
        for entry in entries {
            match self.store.tree_id_of(&entry.id).await? {
                Some(owner) if owner == tree_id => {}
                Some(_) => {
                    return Err(TreeError::invalid_parent(
                        &entry.id,
                        format!("item '{}' belongs to another tree", entry.id),
                    )
                    .into());
                }
                None => return Err(MenuServiceError::node_not_found(&entry.id)),
            }
            if let Some(parent_id) = &entry.parent_id {
                self.ensure_in_tree(&entry.id, parent_id, tree_id).await?;
            }
        }

        let lock = self.write_lock(tree_id).await;
        let _guard = lock.lock().await;

        let now = Utc::now();
        let (tree, ()) = self
            .store
            .mutate_tree::<_, MenuServiceError, _>(tree_id, |tree| {
                Ok(tree.reorder(entries, now)?)
            })
            .await?
            .ok_or_else(|| MenuServiceError::tree_not_found(tree_id))?;

        tracing::info!(tree_id, entries = entries.len(), "Reordered menu items");
        Ok(tree.to_items())
    }

    /// Replace the subtree below `scope_id` (the root when `None`) with `forest`
    pub async fn rebuild(
        &self,
        tree_id: &str,
        scope_id: Option<&str>,
        forest: &[ClientNode],
    ) -> Result<RebuildOutcome, MenuServiceError> {
        validate_forest(forest)?;
        self.ensure_tree(tree_id).await?;

        let lock = self.write_lock(tree_id).await;
        let _guard = lock.lock().await;

        let now = Utc::now();
        let (tree, summary) = self
            .store
            .mutate_tree::<_, MenuServiceError, _>(tree_id, |tree| {
                let scope_id = scope_id
                    .map(str::to_string)
                    .unwrap_or_else(|| tree.tree_id().to_string());
                Ok(tree.rebuild(&scope_id, forest, now)?)
            })
            .await?
            .ok_or_else(|| MenuServiceError::tree_not_found(tree_id))?;

        tracing::info!(
            tree_id,
            created = summary.created,
            updated = summary.updated,
            deleted = summary.deleted,
            "Rebuilt menu subtree"
        );
        Ok(RebuildOutcome {
            summary,
            items: tree.to_items(),
        })
    }

    // Helpers

    async fn load(&self, tree_id: &str) -> Result<TreeStore, MenuServiceError> {
        self.store
            .load_tree(tree_id)
            .await?
            .ok_or_else(|| MenuServiceError::tree_not_found(tree_id))
    }

    async fn tree_of_item(&self, item_id: &str) -> Result<String, MenuServiceError> {
        self.store
            .tree_id_of(item_id)
            .await?
            .ok_or_else(|| MenuServiceError::node_not_found(item_id))
    }

    /// Reject an id that is not the root of a stored tree
    async fn ensure_tree(&self, tree_id: &str) -> Result<(), MenuServiceError> {
        match self.store.tree_id_of(tree_id).await? {
            Some(owner) if owner == tree_id => Ok(()),
            _ => Err(MenuServiceError::tree_not_found(tree_id)),
        }
    }

    /// Reject a parent that is unknown or lives in another tree
    async fn ensure_in_tree(
        &self,
        node_id: &str,
        parent_id: &str,
        tree_id: &str,
    ) -> Result<(), MenuServiceError> {
        match self.store.tree_id_of(parent_id).await? {
            Some(owner) if owner == tree_id => Ok(()),
            Some(_) => Err(TreeError::invalid_parent(
                node_id,
                format!("parent '{}' belongs to another tree", parent_id),
            )
            .into()),
            None => Err(MenuServiceError::node_not_found(parent_id)),
        }
    }

    async fn write_lock(&self, tree_id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.write_locks.lock().await;
        locks.retain(|_, lock| lock.strong_count() > 0);
        if let Some(lock) = locks.get(tree_id).and_then(Weak::upgrade) {
            return lock;
        }
        let lock = Arc::new(Mutex::new(()));
        locks.insert(tree_id.to_string(), Arc::downgrade(&lock));
        lock
    }

    /// Number of trees with a live write lock
    #[cfg(test)]
    pub(crate) async fn live_write_locks(&self) -> usize {
        let mut locks = self.write_locks.lock().await;
        locks.retain(|_, lock| lock.strong_count() > 0);
        locks.len()
    }
}
