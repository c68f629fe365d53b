use super::{
    IncomingFile, Rejection, StorageNamer, StoredImage, UploadBatch, UploadError, UploadResult,
    UploadValidator,
};
use crate::{UploadConfig, static_files::public_url};
use std::{
    io,
    path::{Path, PathBuf},
};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

const MAX_NAME_ATTEMPTS: usize = 5;

/// Validates, names and persists uploaded files.
///
/// Bytes are first written to hidden `.{uuid}.part` files and only linked
/// to their stored name once every accepted file of the batch is on disk, so
/// a concurrent gallery listing never sees a partially written image. Any
/// failure removes everything the batch created.
pub struct UploadGateway {
    storage_directory: PathBuf,
    public_prefix: String,
    partial_success: bool,
    namer: StorageNamer,
    validator: UploadValidator,
}

impl UploadGateway {
    pub fn new(config: &UploadConfig) -> Self {
        Self {
            storage_directory: config.storage_directory.clone(),
            public_prefix: config.public_prefix.clone(),
            partial_success: config.partial_success,
            namer: StorageNamer::new(),
            validator: UploadValidator::new(config.max_file_size),
        }
    }

    pub fn validator(&self) -> &UploadValidator {
        &self.validator
    }

    pub fn storage_directory(&self) -> &Path {
        &self.storage_directory
    }

    /// Whether invalid files are reported individually instead of failing the request.
    pub fn partial_success(&self) -> bool {
        self.partial_success
    }

    pub async fn submit(&self, batch: UploadBatch) -> Result<UploadResult, UploadError> {
        if batch.is_empty() {
            return Err(UploadError::NoFiles);
        }

        let mut accepted = Vec::with_capacity(batch.len());
        let mut rejections = Vec::new();

        for file in batch.files {
            match self
                .validator
                .validate(&file.original_name, &file.content_type, file.size())
            {
                Ok(()) => accepted.push(file),
                Err(e) if self.partial_success => {
                    warn!("Rejected '{}': {}", file.original_name, e);
                    rejections.push(Rejection {
                        original_name: file.original_name,
                        reason: e.to_string(),
                    });
                }
                Err(e) => return Err(e),
            }
        }

        if accepted.is_empty() {
            return Err(match rejections.into_iter().next() {
                Some(first) => UploadError::Validation {
                    original_name: first.original_name,
                    reason: first.reason,
                },
                None => UploadError::NoFiles,
            });
        }

        let files = self.persist(&accepted).await?;

        info!(
            accepted = files.len(),
            rejected = rejections.len(),
            "Stored upload batch"
        );

        Ok(UploadResult { files, rejections })
    }

    async fn persist(&self, files: &[IncomingFile]) -> Result<Vec<StoredImage>, UploadError> {
        tokio::fs::create_dir_all(&self.storage_directory)
            .await
            .map_err(UploadError::StorageWrite)?;

        let mut created = Vec::with_capacity(files.len());
        match self.write_all(files, &mut created).await {
            Ok(stored) => Ok(stored),
            Err(e) => {
                discard(&created).await;
                Err(UploadError::StorageWrite(e))
            }
        }
    }

    /// Records every path it creates in `created` so the caller can roll back.
    async fn write_all(
        &self,
        files: &[IncomingFile],
        created: &mut Vec<PathBuf>,
    ) -> io::Result<Vec<StoredImage>> {
        let mut staged = Vec::with_capacity(files.len());
        for file in files {
            let temp_path = self
                .storage_directory
                .join(format!(".{}.part", uuid::Uuid::new_v4()));
            created.push(temp_path.clone());
            write_file(&temp_path, &file.data).await?;
            staged.push(temp_path);
        }

        let mut stored = Vec::with_capacity(files.len());
        for (file, temp_path) in files.iter().zip(staged) {
            let stored_name = self.commit(&temp_path, &file.original_name).await?;
            created.push(self.storage_directory.join(&stored_name));

            stored.push(StoredImage {
                public_path: public_url(&self.public_prefix, &stored_name),
                stored_name,
                original_name: file.original_name.clone(),
                size_bytes: file.size(),
            });
        }

        Ok(stored)
    }

    async fn commit(&self, temp_path: &Path, original_name: &str) -> io::Result<String> {
        let candidates = std::iter::repeat_with(|| self.namer.stored_name(original_name))
            .take(MAX_NAME_ATTEMPTS);
        publish(&self.storage_directory, temp_path, candidates).await
    }
}

/// Links `temp_path` under the first candidate name not yet present in
/// `directory`, then drops the temporary name. Linking fails atomically when
/// the target exists, so a stored file is never replaced.
async fn publish(
    directory: &Path,
    temp_path: &Path,
    candidates: impl IntoIterator<Item = String>,
) -> io::Result<String> {
    for stored_name in candidates {
        let final_path = directory.join(&stored_name);
        match tokio::fs::hard_link(temp_path, &final_path).await {
            Ok(()) => {
                if let Err(e) = tokio::fs::remove_file(temp_path).await {
                    warn!("Failed to remove staged upload {:?}: {}", temp_path, e);
                }
                return Ok(stored_name);
            }
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                debug!("Stored name {} already taken, regenerating", stored_name);
            }
            Err(e) => return Err(e),
        }
    }

    Err(io::Error::new(
        io::ErrorKind::AlreadyExists,
        "could not allocate a unique stored name",
    ))
}

async fn write_file(path: &Path, data: &[u8]) -> io::Result<()> {
    let mut file = tokio::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .await?;
    file.write_all(data).await?;
    file.sync_all().await
}

async fn discard(paths: &[PathBuf]) {
    for path in paths {
        if let Err(e) = tokio::fs::remove_file(path).await
            && e.kind() != io::ErrorKind::NotFound
        {
            warn!("Failed to remove {:?} after aborted upload: {}", path, e);
        }
    }
}
