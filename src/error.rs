//! Application error taxonomy and HTTP status mapping

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::db::ingest::IngestError;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Missing or malformed request parameters. No side effects.
    #[error("{0}")]
    Validation(String),

    /// Missing or invalid bearer token.
    #[error("invalid or missing credentials")]
    Unauthorized,

    /// Unknown resource, or a resource the caller does not own. Ownership
    /// failures use the same status so existence does not leak.
    #[error("not found")]
    NotFound,

    #[error(transparent)]
    Ingest(#[from] IngestError),

    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, self.to_string()),
            AppError::NotFound => (StatusCode::NOT_FOUND, self.to_string()),
            AppError::Ingest(IngestError::MissingField(_)) => {
                (StatusCode::BAD_REQUEST, self.to_string())
            }
            AppError::Ingest(IngestError::Database(e)) => {
                tracing::error!("ingestion failed: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal server error".to_string(),
                )
            }
            AppError::Database(e) => {
                tracing::error!("query failed: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal server error".to_string(),
                )
            }
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}
