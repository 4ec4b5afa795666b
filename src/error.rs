use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;

use crate::export::ExportError;
use crate::model::ValidationErrors;

#[derive(Debug, thiserror::Error)]
pub enum LabelError {
    #[error("Unknown type: {0}")]
    UnknownTemplate(String),

    #[error("Unknown sheet: {0}")]
    UnknownSheet(String),

    #[error("Max {max} items per request, got {count}")]
    BatchTooLarge { count: usize, max: usize },

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("Invalid request: {0}")]
    Validation(ValidationErrors),

    #[error("Storage {0} not found")]
    StorageNotFound(i64),

    #[error("Label {label_id} not found in storage {storage_id}")]
    LabelNotFound { storage_id: i64, label_id: i64 },

    #[error("Storage '{0}' already exists")]
    StorageExists(String),

    #[error("Export failed: {0}")]
    Export(#[from] ExportError),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<ValidationErrors> for LabelError {
    fn from(errors: ValidationErrors) -> Self {
        Self::Validation(errors)
    }
}

impl IntoResponse for LabelError {
    fn into_response(self) -> Response {
        let (status, code, message) = match self {
            Self::UnknownTemplate(_) => (StatusCode::BAD_REQUEST, "UnknownTemplate", self.to_string()),
            Self::UnknownSheet(_) => (StatusCode::BAD_REQUEST, "UnknownSheet", self.to_string()),
            Self::UnsupportedFormat(_) => {
                (StatusCode::BAD_REQUEST, "UnsupportedFormat", self.to_string())
            }
            Self::BatchTooLarge { .. } => {
                (StatusCode::PAYLOAD_TOO_LARGE, "BatchTooLarge", self.to_string())
            }
            Self::Validation(ref errors) => {
                let body = Json(json!({
                    "error": "ValidationFailed",
                    "message": self.to_string(),
                    "fields": errors,
                }));
                return (StatusCode::UNPROCESSABLE_ENTITY, body).into_response();
            }
            Self::StorageNotFound(_) => (StatusCode::NOT_FOUND, "StorageNotFound", self.to_string()),
            Self::LabelNotFound { .. } => (StatusCode::NOT_FOUND, "LabelNotFound", self.to_string()),
            Self::StorageExists(_) => (StatusCode::CONFLICT, "StorageExists", self.to_string()),
            Self::Export(_) | Self::Database(_) | Self::Internal(_) => {
                tracing::error!("Internal error: {}", self);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "InternalError",
                    "An internal error occurred".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": code,
            "message": message,
        }));

        (status, body).into_response()
    }
}

pub type Result<T> = std::result::Result<T, LabelError>;
