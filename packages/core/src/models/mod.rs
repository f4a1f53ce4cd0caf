//! Data Models
//!
//! This module contains the core data structures used throughout menutree:
//!
//! - `MenuItem` - A node of exactly one menu tree, with its range encoding
//! - `Visibility` / `LinkTarget` - An item's own visibility rule and link
//! - Payload types - Client-submitted shapes validated before any store access
//! - `TreeNode` - Nested view built from a flat, range-ordered item list

mod menu_item;
mod payload;
mod tree_node;

pub use menu_item::{
    validate_slug, LinkTarget, MenuItem, MenuMeta, ValidationError, Visibility,
    DEFAULT_MAX_DEPTH,
};
pub use payload::{
    validate_forest, ClientNode, ContentUpdate, CreateItemParams, CreateTreeParams, ItemContent,
    ItemFields, ItemUpdate, ReorderEntry, ResourceLink, VisibilityMode,
};
pub use tree_node::TreeNode;
