// Client side of the upload page and gallery: selection, previews,
// transport and session state.
mod error;
mod gallery_view;
mod preview;
mod selection;
mod session;
mod transport;

pub use error::{ClientError, PreviewRenderError};
pub use gallery_view::{EMPTY_HINT, EMPTY_TITLE, GalleryTile, GalleryView, load_gallery};
pub use preview::{Preview, PreviewSlot, render_preview, render_previews};
pub use selection::{SelectedFile, SelectionState};
pub use session::{
    MessageKind, SelectionRejected, StatusMessage, TrackedUpload, UploadSession, UploadState,
};
pub use transport::{HttpTransport, UploadEvent, UploadTicket, UploadTransport};

use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ClientConfig {
    pub base_url: String,
    pub upload_endpoint: String,
    pub images_endpoint: String,
    pub field_name: String,
    pub timeout_secs: u64,
    /// Size of the pieces file bodies are streamed in; one progress event
    /// per piece.
    pub chunk_size: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:3000".to_string(),
            upload_endpoint: "/upload".to_string(),
            images_endpoint: "/api/images".to_string(),
            field_name: "images".to_string(),
            timeout_secs: 10,
            chunk_size: 64 * 1024,
        }
    }
}

impl ClientConfig {
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}
