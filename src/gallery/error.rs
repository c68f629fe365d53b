use crate::api::ErrorResponse;
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GalleryError {
    #[error("Storage read error: {0}")]
    StorageRead(#[from] std::io::Error),
}

impl IntoResponse for GalleryError {
    fn into_response(self) -> Response {
        let GalleryError::StorageRead(source) = &self;
        tracing::error!("Error reading images: {}", source);

        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse::with_detail(
                "Error retrieving images",
                source.to_string(),
            )),
        )
            .into_response()
    }
}
