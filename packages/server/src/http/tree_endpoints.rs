//! Tree Endpoints
//!
//! # Endpoints
//!
//! - `GET /api/health` - Health check endpoint
//! - `GET /trees` - List tree roots
//! - `POST /trees` - Create a tree
//! - `GET /trees/:root_id` - Get a tree's root item
//! - `DELETE /trees/:root_id` - Delete a tree with all items
//! - `GET /trees/:root_id/nodes` - List a tree's items (filtered for public callers)
//! - `POST /trees/:root_id/nodes` - Create an item
//! - `PUT /trees/:root_id/nodes/reorder` - Batch move
//! - `PUT /trees/:root_id/nodes/rebuild` - Replace a subtree
//! - `GET /public/menus/:slug` - Public view of a tree by slug

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::Json,
    routing::{get, put},
    Router,
};
use chrono::Utc;
use menutree_core::models::{CreateItemParams, CreateTreeParams};
use serde::Serialize;

use crate::http::views::{
    DeleteResponse, ItemView, ListQuery, ListResponse, RebuildRequest, RebuildResponse,
    ReorderRequest, Shape,
};
use crate::http::{audience, AppState, HttpError};

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthStatus {
    pub status: String,
    pub version: String,
}

/// Health check endpoint
///
/// ```bash
/// curl http://localhost:3001/api/health
/// ```
async fn health_check() -> Json<HealthStatus> {
    Json(HealthStatus {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

async fn list_trees(State(state): State<AppState>) -> Result<Json<Vec<ItemView>>, HttpError> {
    let roots = state.service.list_trees().await?;
    Ok(Json(roots.into_iter().map(ItemView::from).collect()))
}

/// Create a tree
///
/// ```bash
/// curl -X POST http://localhost:3001/trees \
///   -H 'content-type: application/json' \
///   -d '{"name": "Main", "slug": "main", "maxDepth": 3}'
/// ```
async fn create_tree(
    State(state): State<AppState>,
    Json(params): Json<CreateTreeParams>,
) -> Result<(StatusCode, Json<ItemView>), HttpError> {
    let root = state.service.create_tree(params).await?;
    Ok((StatusCode::CREATED, Json(ItemView::from(root))))
}

async fn get_tree(
    State(state): State<AppState>,
    Path(root_id): Path<String>,
) -> Result<Json<ItemView>, HttpError> {
    let root = state.service.get_tree_meta(&root_id).await?;
    Ok(Json(ItemView::from(root)))
}

async fn delete_tree(
    State(state): State<AppState>,
    Path(root_id): Path<String>,
) -> Result<Json<DeleteResponse>, HttpError> {
    let deleted = state.service.delete_tree(&root_id).await?;
    Ok(Json(DeleteResponse { deleted }))
}

/// List the items of a tree
///
/// Callers marked as admin (`x-menu-audience: admin`) see every item; everyone
/// else sees the visibility-filtered tree as of `asOf` (default: now).
///
/// ```bash
/// curl 'http://localhost:3001/trees/<root_id>/nodes?shape=flat&asOf=2025-06-01T00:00:00Z'
/// ```
async fn list_nodes(
    State(state): State<AppState>,
    Path(root_id): Path<String>,
    Query(query): Query<ListQuery>,
    headers: HeaderMap,
) -> Result<Json<ListResponse>, HttpError> {
    let as_of = query.as_of.unwrap_or_else(Utc::now);
    let items = state
        .service
        .list_items(&root_id, audience(&headers), as_of)
        .await?;
    Ok(Json(ListResponse::new(root_id, query.shape, items)))
}

async fn create_node(
    State(state): State<AppState>,
    Path(root_id): Path<String>,
    Json(params): Json<CreateItemParams>,
) -> Result<(StatusCode, Json<ItemView>), HttpError> {
    let item = state.service.create_item(&root_id, params).await?;
    Ok((StatusCode::CREATED, Json(ItemView::from(item))))
}

/// Batch move: `{ "items": [{ "id", "parentId", "position" }] }`
async fn reorder_nodes(
    State(state): State<AppState>,
    Path(root_id): Path<String>,
    Json(request): Json<ReorderRequest>,
) -> Result<Json<ListResponse>, HttpError> {
    let items = state.service.reorder(&root_id, &request.items).await?;
    Ok(Json(ListResponse::new(root_id, Shape::Tree, items)))
}

/// Replace the subtree below `scopeId` (default: the root) with `tree`
async fn rebuild_nodes(
    State(state): State<AppState>,
    Path(root_id): Path<String>,
    Json(request): Json<RebuildRequest>,
) -> Result<Json<RebuildResponse>, HttpError> {
    let outcome = state
        .service
        .rebuild(&root_id, request.scope_id.as_deref(), &request.tree)
        .await?;
    Ok(Json(RebuildResponse {
        summary: outcome.summary,
        tree: ListResponse::new(root_id, Shape::Tree, outcome.items),
    }))
}

/// Public view of a tree by slug; never unfiltered
async fn public_menu(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    Query(query): Query<ListQuery>,
) -> Result<Json<ListResponse>, HttpError> {
    let as_of = query.as_of.unwrap_or_else(Utc::now);
    let (tree_id, items) = state.service.list_public_by_slug(&slug, as_of).await?;
    Ok(Json(ListResponse::new(tree_id, query.shape, items)))
}

pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(health_check))
        .route("/trees", get(list_trees).post(create_tree))
        .route("/trees/:root_id", get(get_tree).delete(delete_tree))
        .route("/trees/:root_id/nodes", get(list_nodes).post(create_node))
        .route("/trees/:root_id/nodes/reorder", put(reorder_nodes))
        .route("/trees/:root_id/nodes/rebuild", put(rebuild_nodes))
        .route("/public/menus/:slug", get(public_menu))
        .with_state(state)
}
