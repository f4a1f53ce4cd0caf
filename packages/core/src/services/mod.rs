//! Business Services
//!
//! This module contains the menu business logic:
//!
//! - `MenuService` - Tree and item operations, each structural call one
//!   transaction, public reads filtered through the visibility cascade
//! - `MenuServiceError` - One error type for every service failure
//!
//! Services coordinate between the database layer and the tree engine,
//! validating payloads before the store is touched.

pub mod error;
pub mod menu_service;


pub use error::MenuServiceError;
pub use menu_service::{Audience, MenuService, MenuServiceConfig, RebuildOutcome};
