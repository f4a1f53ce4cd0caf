//! Menutree Core Business Logic Layer
//!
//! This crate provides ordered, depth-limited menu trees: the owned tree
//! engine, the public visibility cascade, libsql persistence and the service
//! layer that ties them together.
//!
//! # Architecture
//!
//! - **Range encoding**: every item owns a containment interval; ancestry is
//!   an interval test, subtree reads are one range scan
//! - **Owned trees**: `TreeStore` is the only thing that changes structure
//! - **One transaction per structural call**: failures leave the tree as it was
//! - **Explicit time**: visibility is always evaluated `as_of` a given instant
//!
//! # Modules
//!
//! - [`models`] - Data structures (MenuItem, Visibility, client payloads)
//! - [`tree`] - Ordering, depth validation, moves and subtree rebuilds
//! - [`visibility`] - Resource resolution and the cascade filter
//! - [`db`] - Database layer with libsql integration
//! - [`services`] - Business services (MenuService)

pub mod db;
pub mod models;
pub mod services;
pub mod tree;
pub mod visibility;

// Re-export commonly used types
pub use models::*;
pub use services::*;
pub use tree::{RebuildSummary, TreeError, TreeStore};
