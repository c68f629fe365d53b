use super::{GalleryError, GalleryImage, GalleryListing};
use crate::{static_files::public_url, upload::has_allowed_extension};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Derives the gallery from the storage directory on every call. Holds no
/// cache, so there is nothing to invalidate when uploads land.
#[derive(Debug, Clone)]
pub struct GalleryIndex {
    storage_directory: PathBuf,
    public_prefix: String,
}

impl GalleryIndex {
    pub fn new(storage_directory: PathBuf, public_prefix: String) -> Self {
        Self {
            storage_directory,
            public_prefix,
        }
    }

    pub fn storage_directory(&self) -> &Path {
        &self.storage_directory
    }

    /// Regular files with an allowed image extension, sorted by file name.
    /// Anything else in the directory is skipped without error.
    pub async fn list(&self) -> Result<GalleryListing, GalleryError> {
        let mut entries = tokio::fs::read_dir(&self.storage_directory).await?;
        let mut images = Vec::new();

        while let Some(entry) = entries.next_entry().await? {
            let Ok(file_name) = entry.file_name().into_string() else {
                continue;
            };

            if !has_allowed_extension(&file_name) {
                continue;
            }

            match entry.file_type().await {
                Ok(file_type) if file_type.is_file() => {}
                _ => continue,
            }

            images.push(GalleryImage {
                url: public_url(&self.public_prefix, &file_name),
                filename: file_name,
            });
        }

        images.sort_by(|a, b| a.filename.cmp(&b.filename));

        debug!(
            "Listed {} images in {:?}",
            images.len(),
            self.storage_directory
        );

        Ok(GalleryListing::new(images))
    }
}
