//! Database Layer
//!
//! This module handles all database interactions using libsql:
//!
//! - Database initialization and connection management (`DatabaseService`)
//! - Row mapping and transactional tree mutations (`MenuStore`)
//!
//! Every menu tree is stored as rows of a single `menu_items` table. A tree is
//! always loaded, changed and written back as a whole inside one transaction,
//! so readers only ever see fully renumbered trees.

mod database;
mod error;
mod menu_store;

#[cfg(test)]
mod menu_store_test;

pub use database::DatabaseService;
pub use error::DatabaseError;
pub use menu_store::{MenuStore, WriteStats};
