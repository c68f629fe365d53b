use crate::api::ErrorResponse;
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("No files uploaded")]
    NoFiles,

    #[error("{reason}")]
    Validation {
        original_name: String,
        reason: String,
    },

    #[error("File size too large. Maximum size is {max_megabytes}MB")]
    FileTooLarge {
        original_name: String,
        max_megabytes: u64,
    },

    #[error("Too many files. Maximum is {max} files per upload")]
    TooManyFiles { max: usize },

    #[error("Unexpected field: {0}")]
    UnexpectedField(String),

    #[error("Malformed upload: {0}")]
    Malformed(String),

    #[error("Storage write failed: {0}")]
    StorageWrite(#[source] std::io::Error),
}

impl UploadError {
    pub fn status(&self) -> StatusCode {
        match self {
            UploadError::StorageWrite(_) => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::BAD_REQUEST,
        }
    }
}

impl IntoResponse for UploadError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match &self {
            UploadError::StorageWrite(source) => {
                tracing::error!("Upload failed while writing to storage: {}", source);
                ErrorResponse::with_detail("Error uploading files", source.to_string())
            }
            other => {
                tracing::warn!("Upload rejected: {}", other);
                ErrorResponse::new(other.to_string())
            }
        };

        (status, Json(body)).into_response()
    }
}
