//! Menutree HTTP Server Binary
//!
//! # Usage
//!
//! ```bash
//! # Start with default settings (port 3001, ~/.menutree/menutree.db)
//! cargo run --bin menutree-server
//!
//! # Custom port and database
//! MENUTREE_PORT=3002 MENUTREE_DB_PATH=/tmp/menus.db cargo run --bin menutree-server
//! ```
//!
//! # Environment Variables
//!
//! See `menutree_server::config` for the `MENUTREE_*` variables, plus
//! `RUST_LOG` for the logging level (e.g., "info", "debug", "trace").

use menutree_server::{http, init_service, ServerConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = ServerConfig::from_env()?;
    tracing::info!("Database: {}", config.db_path.display());
    tracing::info!("Default max depth: {}", config.default_max_depth);
    if let Some(origin) = &config.cors_origin {
        tracing::info!("CORS enabled for {:?}", origin);
    }

    let service = init_service(&config).await?;
    tracing::info!("Services initialized");

    http::start_server(service, &config.bind_addr(), config.cors_origin.clone()).await?;

    Ok(())
}
