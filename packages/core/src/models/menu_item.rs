//! Menu Item Data Structures
//!
//! This module defines the `MenuItem` node stored in a menu tree together with
//! its link target and its own (non-cascaded) visibility rule.
//!
//! # Range Encoding
//!
//! Every item owns a containment interval `[range_start, range_end]`. An item
//! N is an ancestor of item M iff `N.range_start < M.range_start` and
//! `M.range_end < N.range_end`. Sibling intervals never overlap and are
//! ordered the same way as the siblings' `position`.
//!
//! # Examples
//!
//! ```rust
//! use menutree_core::models::{MenuItem, Visibility};
//! use chrono::Utc;
//!
//! let now = Utc::now();
//! let mut item = MenuItem::new_leaf("tree-1", "root-1", "About", now);
//! item.range_start = 10;
//! item.range_end = 20;
//! assert!(!item.is_root());
//! assert!(!item.visibility.self_hidden(now));
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Default depth limit applied when a tree is created without one
pub const DEFAULT_MAX_DEPTH: u32 = 3;

/// Validation errors for menu item fields and client payloads
///
/// These are raised before any store access; a request carrying an invalid
/// field is rejected as a whole.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Conflicting link target: {0}")]
    ConflictingLink(String),

    #[error("Invalid resource reference: {0}")]
    InvalidResource(String),

    #[error("Invalid schedule: {0}")]
    InvalidSchedule(String),

    #[error("Invalid slug: {0}")]
    InvalidSlug(String),

    #[error("Duplicate item id in payload: {0}")]
    DuplicateId(String),

    #[error("Invalid max depth: {0}")]
    InvalidMaxDepth(String),
}

/// Where a menu item points to
///
/// Either a literal URL/path or a reference to an entity resolved externally.
/// A resource reference may carry a literal `fallback_url` that is used when
/// the referenced entity cannot be resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum LinkTarget {
    Url {
        url: String,
    },
    #[serde(rename_all = "camelCase")]
    Resource {
        resource_type: String,
        resource_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        fallback_url: Option<String>,
    },
}

impl LinkTarget {
    /// Literal URL that can be served without resolving anything
    pub fn literal_url(&self) -> Option<&str> {
        match self {
            LinkTarget::Url { url } => Some(url),
            LinkTarget::Resource { fallback_url, .. } => fallback_url.as_deref(),
        }
    }

    /// Validate that the link target carries usable values
    pub fn validate(&self) -> Result<(), ValidationError> {
        match self {
            LinkTarget::Url { url } => {
                if url.trim().is_empty() {
                    return Err(ValidationError::MissingField("url".to_string()));
                }
            }
            LinkTarget::Resource {
                resource_type,
                resource_id,
                fallback_url,
            } => {
                if resource_type.trim().is_empty() || resource_id.trim().is_empty() {
                    return Err(ValidationError::InvalidResource(
                        "resource type and id are both required".to_string(),
                    ));
                }
                if fallback_url.as_deref().is_some_and(|u| u.trim().is_empty()) {
                    return Err(ValidationError::MissingField("fallbackUrl".to_string()));
                }
            }
        }
        Ok(())
    }
}

/// An item's own visibility rule, before any cascading from ancestors
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Visibility {
    pub is_active: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hide_at: Option<DateTime<Utc>>,
}

impl Default for Visibility {
    fn default() -> Self {
        Self::shown()
    }
}

impl Visibility {
    /// Always visible
    pub fn shown() -> Self {
        Self {
            is_active: true,
            display_at: None,
            hide_at: None,
        }
    }

    /// Never visible
    pub fn hidden() -> Self {
        Self {
            is_active: false,
            display_at: None,
            hide_at: None,
        }
    }

    /// Visible inside `[display_at, hide_at)`
    pub fn scheduled(display_at: Option<DateTime<Utc>>, hide_at: Option<DateTime<Utc>>) -> Self {
        Self {
            is_active: true,
            display_at,
            hide_at,
        }
    }

    /// Whether this rule alone hides the item at `as_of`
    ///
    /// `display_at` is inclusive (visible exactly at `display_at`), `hide_at`
    /// is exclusive-from (hidden exactly at `hide_at`).
    pub fn self_hidden(&self, as_of: DateTime<Utc>) -> bool {
        !self.is_active
            || self.display_at.is_some_and(|at| as_of < at)
            || self.hide_at.is_some_and(|at| as_of >= at)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if let (Some(display_at), Some(hide_at)) = (self.display_at, self.hide_at) {
            if hide_at <= display_at {
                return Err(ValidationError::InvalidSchedule(format!(
                    "hideAt ({}) must be after displayAt ({})",
                    hide_at.to_rfc3339(),
                    display_at.to_rfc3339()
                )));
            }
        }
        Ok(())
    }
}

/// Tree-level metadata carried only by the root item
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MenuMeta {
    pub slug: String,
    pub max_depth: u32,
}

/// Validate a menu slug: lowercase ascii letters, digits and dashes
pub fn validate_slug(slug: &str) -> Result<(), ValidationError> {
    if slug.is_empty() {
        return Err(ValidationError::MissingField("slug".to_string()));
    }
    let well_formed = slug
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
        && !slug.starts_with('-')
        && !slug.ends_with('-');
    if !well_formed {
        return Err(ValidationError::InvalidSlug(slug.to_string()));
    }
    Ok(())
}

/// A node in exactly one menu tree
///
/// # Fields
///
/// - `id`: Immutable identifier (UUID)
/// - `tree_id`: The tree this item belongs to (the root item's id)
/// - `parent_id`: `None` only for the root
/// - `range_start` / `range_end`: Containment interval (see module docs)
/// - `depth`: 0 for the root; cached, always derivable from the ranges
/// - `position`: Order among siblings, `0..n` without holes
/// - `menu`: Tree metadata, present iff the item is the root
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MenuItem {
    pub id: String,
    pub tree_id: String,
    pub parent_id: Option<String>,
    pub range_start: i64,
    pub range_end: i64,
    pub depth: u32,
    pub position: u32,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<LinkTarget>,
    pub visibility: Visibility,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub menu: Option<MenuMeta>,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
}

impl MenuItem {
    /// Create the root item of a new tree; its id doubles as the tree id
    pub fn new_root(name: impl Into<String>, meta: MenuMeta, now: DateTime<Utc>) -> Self {
        let id = Uuid::new_v4().to_string();
        Self {
            tree_id: id.clone(),
            id,
            parent_id: None,
            range_start: 0,
            range_end: 1,
            depth: 0,
            position: 0,
            name: name.into(),
            link: None,
            visibility: Visibility::shown(),
            menu: Some(meta),
            created_at: now,
            modified_at: now,
        }
    }

    /// Create an unplaced leaf; ranges, depth and position are assigned by the tree
    pub fn new_leaf(
        tree_id: impl Into<String>,
        parent_id: impl Into<String>,
        name: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            tree_id: tree_id.into(),
            parent_id: Some(parent_id.into()),
            range_start: 0,
            range_end: 1,
            depth: 0,
            position: 0,
            name: name.into(),
            link: None,
            visibility: Visibility::shown(),
            menu: None,
            created_at: now,
            modified_at: now,
        }
    }

    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }

    /// Strict range containment: `self` is an ancestor of `other`
    pub fn contains(&self, other: &MenuItem) -> bool {
        self.range_start < other.range_start && other.range_end < self.range_end
    }

    pub fn range(&self) -> (i64, i64) {
        (self.range_start, self.range_end)
    }

    pub fn max_depth(&self) -> Option<u32> {
        self.menu.as_ref().map(|m| m.max_depth)
    }
}
