//! Item Endpoints
//!
//! # Endpoints
//!
//! - `PUT /nodes/:id` - Update non-structural fields of an item
//! - `DELETE /nodes/:id` - Delete an item with its subtree
//! - `PUT /nodes/:id/move` - Move an item with its subtree

use axum::{
    extract::{Path, State},
    response::Json,
    routing::put,
    Router,
};
use menutree_core::models::ItemUpdate;

use crate::http::views::{DeleteResponse, ItemView, MoveRequest};
use crate::http::{AppState, HttpError};

/// Update an item
///
/// Only provided fields change; `null` for `url` or `resource` clears the link.
///
/// ```bash
/// curl -X PUT http://localhost:3001/nodes/<id> \
///   -H 'content-type: application/json' \
///   -d '{"name": "About us", "visibility": {"mode": "always_show"}}'
/// ```
async fn update_node(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(update): Json<ItemUpdate>,
) -> Result<Json<ItemView>, HttpError> {
    let item = state.service.update_item(&id, update).await?;
    Ok(Json(ItemView::from(item)))
}

/// Delete an item and its subtree; deleting a root deletes the tree
async fn delete_node(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<DeleteResponse>, HttpError> {
    let deleted = state.service.delete_item(&id).await?;
    Ok(Json(DeleteResponse { deleted }))
}

/// Move an item: `{ "parentId"?: string, "position": number }`
async fn move_node(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<MoveRequest>,
) -> Result<Json<ItemView>, HttpError> {
    let item = state
        .service
        .move_item(&id, request.parent_id.as_deref(), request.position)
        .await?;
    Ok(Json(ItemView::from(item)))
}

pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/nodes/:id", put(update_node).delete(delete_node))
        .route("/nodes/:id/move", put(move_node))
        .with_state(state)
}
