use crate::AppState;
use axum::{
    Json,
    extract::State,
    http::{Method, StatusCode, Uri},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};

/// Failure envelope shared by every JSON endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ErrorResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            error: None,
        }
    }

    pub fn with_detail(message: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            error: Some(error.into()),
        }
    }
}

pub async fn route_not_found() -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(ErrorResponse::new("Route not found")),
    )
        .into_response()
}

/// Serves files from the site directory for GET requests; everything else
/// that no route matched is a JSON 404.
pub async fn fallback_handler(
    State(app_state): State<AppState>,
    method: Method,
    uri: Uri,
) -> Response {
    if (method == Method::GET || method == Method::HEAD)
        && let Ok(path) = urlencoding::decode(uri.path())
        && let Some(response) = app_state.site.serve(&path).await
    {
        return response;
    }

    route_not_found().await
}
