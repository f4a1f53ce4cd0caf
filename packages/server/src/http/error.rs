//! HTTP error handling
//!
//! Every failure leaves the server as a JSON body `{ message, code, details? }`
//! with a status derived from the code.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use menutree_core::services::MenuServiceError;
use serde::{Deserialize, Serialize};

/// HTTP error response body
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpError {
    /// User-facing error message
    pub message: String,
    /// Machine-readable error code
    pub code: String,
    /// Optional detailed error information for debugging
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl HttpError {
    /// Create a new HTTP error
    pub fn new(message: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: code.into(),
            details: None,
        }
    }

    /// Create a new HTTP error with details
    pub fn with_details(
        message: impl Into<String>,
        code: impl Into<String>,
        details: impl Into<String>,
    ) -> Self {
        Self {
            message: message.into(),
            code: code.into(),
            details: Some(details.into()),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self.code.as_str() {
            "NODE_NOT_FOUND" | "TREE_NOT_FOUND" => StatusCode::NOT_FOUND,
            "DEPTH_EXCEEDED" | "INVALID_PARENT" | "INVALID_INPUT" => StatusCode::BAD_REQUEST,
            "VALIDATION_ERROR" => StatusCode::UNPROCESSABLE_ENTITY,
            "DUPLICATE_SLUG" => StatusCode::CONFLICT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        (self.status(), Json(self)).into_response()
    }
}

impl From<MenuServiceError> for HttpError {
    fn from(err: MenuServiceError) -> Self {
        let message = err.to_string();
        match err {
            MenuServiceError::TreeNotFound { .. } => HttpError::new(message, "TREE_NOT_FOUND"),
            MenuServiceError::NodeNotFound { .. } => HttpError::new(message, "NODE_NOT_FOUND"),
            MenuServiceError::InvalidParent { node_id, .. } => {
                HttpError::with_details(message, "INVALID_PARENT", format!("node_id: {}", node_id))
            }
            MenuServiceError::DepthExceeded { limit } => {
                HttpError::with_details(message, "DEPTH_EXCEEDED", format!("max_depth: {}", limit))
            }
            MenuServiceError::ValidationFailed(_) => HttpError::new(message, "VALIDATION_ERROR"),
            MenuServiceError::DuplicateSlug { .. } => HttpError::new(message, "DUPLICATE_SLUG"),
            MenuServiceError::DatabaseError(e) => {
                tracing::error!("Database failure while serving request: {}", e);
                HttpError::with_details("Database operation failed", "DATABASE_ERROR", message)
            }
            MenuServiceError::Corrupt(_) => {
                tracing::error!("{}", message);
                HttpError::new(message, "TREE_CORRUPT")
            }
        }
    }
}
