//! HTTP API for menu trees
//!
//! The router is organized into endpoint modules:
//! - `tree_endpoints`: trees, listings, item creation, reorder and rebuild
//! - `node_endpoints`: per-item update, delete and move
//!
//! # Audience
//!
//! Authentication happens in front of this server. Requests it marks with
//! `x-menu-audience: admin` get unfiltered listings; all other requests are
//! treated as anonymous and see the visibility-filtered tree.
//!
//! # Usage
//!
//! ```bash
//! MENUTREE_PORT=3001 cargo run --bin menutree-server
//! ```

use axum::{
    http::{header, HeaderMap, HeaderValue, Method},
    Router,
};
use menutree_core::services::{Audience, MenuService};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

mod error;
mod node_endpoints;
mod tree_endpoints;
pub mod views;

pub use error::HttpError;

/// Header set by the authentication layer for administrative callers
pub const AUDIENCE_HEADER: &str = "x-menu-audience";

/// Application state shared across all endpoints
///
/// Read operations and field edits run concurrently; structural writes of
/// one tree are serialized inside `MenuService`.
#[derive(Clone)]
pub struct AppState {
    pub service: MenuService,
}

/// Create the main application router with all endpoint modules
pub fn create_router(state: AppState, cors_origin: Option<HeaderValue>) -> Router {
    let router = Router::new()
        .merge(tree_endpoints::routes(state.clone()))
        .merge(node_endpoints::routes(state))
        .layer(TraceLayer::new_for_http());

    match cors_origin {
        Some(origin) => router.layer(cors_layer(origin)),
        None => router,
    }
}

/// CORS for one browser origin (an admin UI served elsewhere)
fn cors_layer(origin: HeaderValue) -> CorsLayer {
    CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([
            header::CONTENT_TYPE,
            header::HeaderName::from_static(AUDIENCE_HEADER),
        ])
        .allow_credentials(false)
}

/// Audience of a request, from the header set by the authentication layer
pub fn audience(headers: &HeaderMap) -> Audience {
    match headers.get(AUDIENCE_HEADER).and_then(|v| v.to_str().ok()) {
        Some(value) if value.trim().eq_ignore_ascii_case("admin") => Audience::Admin,
        _ => Audience::Public,
    }
}

/// Start the HTTP server on `addr`
///
/// # Errors
///
/// Returns error if server fails to bind or start.
pub async fn start_server(
    service: MenuService,
    addr: &str,
    cors_origin: Option<HeaderValue>,
) -> anyhow::Result<()> {
    let app = create_router(AppState { service }, cors_origin);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Menutree server listening on http://{}", addr);
    axum::serve(listener, app).await?;

    Ok(())
}
