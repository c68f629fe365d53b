use super::preview::{self, PreviewSlot};
use bytes::Bytes;
use std::path::Path;

/// A file handed over by a picker or a drop, held in memory on the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectedFile {
    pub name: String,
    pub mime_type: String,
    pub bytes: Bytes,
}

impl SelectedFile {
    pub fn new(
        name: impl Into<String>,
        mime_type: impl Into<String>,
        bytes: impl Into<Bytes>,
    ) -> Self {
        Self {
            name: name.into(),
            mime_type: mime_type.into(),
            bytes: bytes.into(),
        }
    }

    /// Reads a file from disk, guessing its MIME type from the extension the
    /// way a browser file picker does.
    pub async fn from_path(path: &Path) -> std::io::Result<Self> {
        let bytes = tokio::fs::read(path).await?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        let mime_type = mime_guess::from_path(path)
            .first_or_octet_stream()
            .to_string();

        Ok(Self::new(name, mime_type, bytes))
    }

    pub fn is_image(&self) -> bool {
        self.mime_type.starts_with("image/")
    }

    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }
}

/// The ordered files chosen during this session. Additions append, removal
/// is by current position, and nothing here talks to the server.
#[derive(Debug, Clone, Default)]
pub struct SelectionState {
    files: Vec<SelectedFile>,
}

impl SelectionState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends the image candidates and returns exactly those, so the caller
    /// uploads only what is new. Non-image candidates are dropped.
    pub fn add_files(
        &mut self,
        candidates: impl IntoIterator<Item = SelectedFile>,
    ) -> Vec<SelectedFile> {
        let added: Vec<SelectedFile> = candidates.into_iter().filter(|f| f.is_image()).collect();
        self.files.extend(added.iter().cloned());
        added
    }

    /// Removes the file at `position`. Negative or out of range positions
    /// leave the selection untouched and return `None`.
    pub fn remove_at<P: TryInto<usize>>(&mut self, position: P) -> Option<SelectedFile> {
        let position = position.try_into().ok()?;
        if position < self.files.len() {
            Some(self.files.remove(position))
        } else {
            None
        }
    }

    pub fn files(&self) -> &[SelectedFile] {
        &self.files
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// One slot per selected file, in order. A file that cannot be rendered
    /// yields an error in its own slot only.
    pub async fn current_previews(&self) -> Vec<PreviewSlot> {
        preview::render_previews(&self.files).await
    }
}
