use super::{GalleryError, GalleryResponse};
use crate::AppState;
use axum::{Json, extract::State};

pub async fn list_images_handler(
    State(app_state): State<AppState>,
) -> Result<Json<GalleryResponse>, GalleryError> {
    let listing = app_state.gallery.list().await?;
    Ok(Json(listing.into()))
}
