use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub mod api;
pub mod client;
pub mod gallery;
pub mod startup_checks;
pub mod static_files;
pub mod upload;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub app: AppConfig,
    pub upload: UploadConfig,
    pub static_files: StaticConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AppConfig {
    pub name: String,
    pub log_level: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct UploadConfig {
    /// Flat directory holding every stored image.
    pub storage_directory: PathBuf,
    /// URL prefix under which the storage directory is served.
    pub public_prefix: String,
    pub field_name: String,
    pub max_files: usize,
    /// Per-file ceiling in bytes.
    pub max_file_size: u64,
    /// Report invalid files per file instead of failing the whole request.
    pub partial_success: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StaticConfig {
    pub directory: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            name: "ImageDrop".to_string(),
            log_level: "info".to_string(),
        }
    }
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            storage_directory: PathBuf::from("upload_images"),
            public_prefix: "/uploads".to_string(),
            field_name: "images".to_string(),
            max_files: 10,
            max_file_size: 5 * 1024 * 1024,
            partial_success: false,
        }
    }
}

impl Default for StaticConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("public"),
        }
    }
}

impl UploadConfig {
    /// Ceiling for a whole multipart request: every file at its maximum plus
    /// room for part headers and text fields.
    pub fn request_body_limit(&self) -> usize {
        const ENVELOPE_ALLOWANCE: usize = 1024 * 1024;
        (self.max_files as u64 * self.max_file_size) as usize + ENVELOPE_ALLOWANCE
    }
}

use axum::{
    Router,
    extract::{DefaultBodyLimit, Path, State},
    response::Response,
    routing::{get, post},
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

#[derive(Clone)]
pub struct AppState {
    pub gateway: upload::SharedGateway,
    pub gallery: gallery::SharedGallery,
    pub uploads: static_files::StaticFileHandler,
    pub site: static_files::StaticFileHandler,
    pub config: Config,
}

async fn uploaded_file_handler(
    State(app_state): State<AppState>,
    Path(path): Path<String>,
) -> Response {
    match app_state.uploads.serve(&path).await {
        Some(response) => response,
        None => api::route_not_found().await,
    }
}

/// Builds the router. Creating the storage directory is left to
/// [`startup_checks::perform_startup_checks`]; the gallery answers 500 until
/// that directory exists.
pub async fn create_app(config: Config) -> Router {
    let gateway = Arc::new(upload::UploadGateway::new(&config.upload));
    let gallery = Arc::new(gallery::GalleryIndex::new(
        config.upload.storage_directory.clone(),
        config.upload.public_prefix.clone(),
    ));
    let uploads =
        static_files::StaticFileHandler::immutable(config.upload.storage_directory.clone());
    let site = static_files::StaticFileHandler::new(config.static_files.directory.clone());

    let upload_mount = format!(
        "{}/{{*path}}",
        config.upload.public_prefix.trim_end_matches('/')
    );
    let body_limit = config.upload.request_body_limit();

    let app_state = AppState {
        gateway,
        gallery,
        uploads,
        site,
        config,
    };

    Router::new()
        .route(
            "/upload",
            post(upload::upload_handler)
                .layer(DefaultBodyLimit::max(body_limit))
                .fallback(api::route_not_found),
        )
        .route(
            "/api/images",
            get(gallery::list_images_handler).fallback(api::route_not_found),
        )
        .route(
            &upload_mount,
            get(uploaded_file_handler).fallback(api::route_not_found),
        )
        .fallback(api::fallback_handler)
        .layer(CorsLayer::permissive())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|request: &axum::http::Request<_>| {
                    let method = request.method();
                    let uri = request.uri();
                    let matched_path = request
                        .extensions()
                        .get::<axum::extract::MatchedPath>()
                        .map(|matched_path| matched_path.as_str());

                    tracing::info_span!(
                        "http_request",
                        method = %method,
                        uri = %uri,
                        matched_path,
                    )
                })
                .on_request(|request: &axum::http::Request<_>, _span: &tracing::Span| {
                    let user_agent = request
                        .headers()
                        .get("user-agent")
                        .and_then(|h| h.to_str().ok())
                        .unwrap_or("-");

                    tracing::info!(
                        target: "access_log",
                        method = %request.method(),
                        path = %request.uri().path(),
                        user_agent = %user_agent,
                        "request"
                    );
                })
                .on_response(
                    |response: &axum::http::Response<_>,
                     latency: std::time::Duration,
                     _span: &tracing::Span| {
                        tracing::info!(
                            target: "access_log",
                            status = %response.status(),
                            latency_ms = %latency.as_millis(),
                            "response"
                        );
                    },
                ),
        )
        .with_state(app_state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use tower::ServiceExt;

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: Config = toml_edit::de::from_str(
            r#"
            [server]
            port = 8080

            [upload]
            max_files = 3
            partial_success = true
            "#,
        )
        .unwrap();

        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.upload.max_files, 3);
        assert_eq!(config.upload.max_file_size, 5 * 1024 * 1024);
        assert_eq!(config.upload.field_name, "images");
        assert!(config.upload.partial_success);
        assert_eq!(config.static_files.directory, PathBuf::from("public"));
    }

    #[test]
    fn test_request_body_limit_covers_every_file() {
        let upload = UploadConfig::default();
        assert!(upload.request_body_limit() > 10 * 5 * 1024 * 1024);
    }

    #[tokio::test]
    async fn test_storage_directory_created_once_by_startup_checks() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let mut config = Config::default();
        config.upload.storage_directory = temp_dir.path().join("upload_images");
        config.static_files.directory = temp_dir.path().to_path_buf();

        let _app = create_app(config.clone()).await;
        assert!(!config.upload.storage_directory.exists());

        startup_checks::perform_startup_checks(&config).await.unwrap();
        assert!(config.upload.storage_directory.is_dir());
    }

    #[tokio::test]
    async fn test_wrong_method_on_upload_is_404() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let mut config = Config::default();
        config.upload.storage_directory = temp_dir.path().join("upload_images");
        config.static_files.directory = temp_dir.path().join("public");

        let app = create_app(config).await;
        let response = app
            .oneshot(Request::get("/upload").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
