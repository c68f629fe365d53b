use axum::{
    body::Body,
    http::{StatusCode, header},
    response::Response,
};
use std::{
    path::{Component, Path, PathBuf},
    time::UNIX_EPOCH,
};
use tokio::fs::File;
use tokio_util::io::ReaderStream;
use tracing::{debug, error, warn};

/// Public URL of a file under a mount prefix. The file name is percent-encoded
/// so names containing spaces or `#` stay addressable.
pub fn public_url(prefix: &str, file_name: &str) -> String {
    format!(
        "{}/{}",
        prefix.trim_end_matches('/'),
        urlencoding::encode(file_name)
    )
}

#[derive(Debug, Clone)]
pub struct StaticFileHandler {
    pub root: PathBuf,
    immutable: bool,
}

impl StaticFileHandler {
    pub fn new(root: PathBuf) -> Self {
        Self {
            root,
            immutable: false,
        }
    }

    /// For directories whose files never change once written, such as the
    /// upload storage directory.
    pub fn immutable(root: PathBuf) -> Self {
        Self {
            root,
            immutable: true,
        }
    }

    /// Streams the file at `path` below the root, or `None` when nothing
    /// servable exists there. Directories resolve to their `index.html`.
    pub async fn serve(&self, path: &str) -> Option<Response> {
        let Some(relative) = sanitize(path) else {
            warn!("Refusing to serve path: {:?}", path);
            return None;
        };

        let mut file_path = self.root.join(relative);
        debug!("Attempting to serve static file: {:?}", file_path);

        let mut metadata = tokio::fs::metadata(&file_path).await.ok()?;
        if metadata.is_dir() {
            file_path.push("index.html");
            metadata = tokio::fs::metadata(&file_path).await.ok()?;
        }
        if !metadata.is_file() {
            return None;
        }

        let file = match File::open(&file_path).await {
            Ok(file) => file,
            Err(e) => {
                debug!("Failed to open file {:?}: {}", file_path, e);
                return None;
            }
        };

        let content_type = mime_guess::from_path(&file_path)
            .first_or_octet_stream()
            .to_string();

        let cache_control = if self.immutable {
            "public, max-age=31536000, immutable"
        } else if content_type.starts_with("image/") {
            "public, max-age=86400"
        } else if content_type.starts_with("text/css")
            || content_type.starts_with("application/javascript")
            || content_type.starts_with("text/javascript")
        {
            "public, max-age=300, must-revalidate"
        } else {
            "no-cache"
        };

        let mut response = Response::builder()
            .status(StatusCode::OK)
            .header(header::CONTENT_TYPE, content_type)
            .header(header::CONTENT_LENGTH, metadata.len())
            .header(header::CACHE_CONTROL, cache_control);

        if let Ok(modified) = metadata.modified()
            && let Ok(duration) = modified.duration_since(UNIX_EPOCH)
        {
            response = response.header(header::LAST_MODIFIED, httpdate::fmt_http_date(modified));
            let etag = format!("\"{}-{}\"", duration.as_secs(), metadata.len());
            response = response.header(header::ETAG, etag);
        }

        let body = Body::from_stream(ReaderStream::new(file));
        match response.body(body) {
            Ok(response) => Some(response),
            Err(e) => {
                error!("Failed to build response for {:?}: {}", file_path, e);
                None
            }
        }
    }
}

/// Relative path made only of plain components. Parent references, roots and
/// dotfiles (including in-flight `.part` uploads) are refused.
fn sanitize(path: &str) -> Option<PathBuf> {
    let mut relative = PathBuf::new();
    for component in Path::new(path.trim_start_matches('/')).components() {
        match component {
            Component::Normal(part) => {
                if part.to_str().is_none_or(|p| p.starts_with('.')) {
                    return None;
                }
                relative.push(part);
            }
            Component::CurDir => {}
            _ => return None,
        }
    }
    Some(relative)
}
