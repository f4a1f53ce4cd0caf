//! Menutree HTTP Server
//!
//! REST surface over `menutree-core`: configuration from the environment,
//! service bootstrap, and the axum router.
//!
//! # Modules
//!
//! - [`config`] - `ServerConfig` read from `MENUTREE_*` variables
//! - [`http`] - Router, endpoints, request/response bodies and `HttpError`

pub mod config;
pub mod http;

pub use config::{ConfigError, ServerConfig};

use anyhow::Context;
use menutree_core::db::{DatabaseService, MenuStore};
use menutree_core::services::{MenuService, MenuServiceConfig};
use menutree_core::visibility::StaticResourceResolver;
use std::sync::Arc;

/// Open the database and resolver named by `config` and build the service
pub async fn init_service(config: &ServerConfig) -> anyhow::Result<MenuService> {
    let db = DatabaseService::new(config.db_path.clone())
        .await
        .with_context(|| format!("Failed to open database at {}", config.db_path.display()))?;

    let resolver = match &config.resources_file {
        Some(path) => {
            let resolver = StaticResourceResolver::load(path).await?;
            tracing::info!(
                "Loaded {} resources from {}",
                resolver.len(),
                path.display()
            );
            resolver
        }
        None => {
            tracing::info!("No resources file configured; resource links resolve as missing");
            StaticResourceResolver::new()
        }
    };

    Ok(MenuService::new(
        MenuStore::new(Arc::new(db)),
        Arc::new(resolver),
        MenuServiceConfig {
            default_max_depth: config.default_max_depth,
        },
    ))
}
