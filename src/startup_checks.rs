use crate::{Config, UploadConfig};
use std::path::PathBuf;
use thiserror::Error;
use tracing::{error, info, warn};

#[derive(Debug, Error)]
pub enum StartupCheckError {
    #[error("Failed to create storage directory {0:?}: {1}")]
    StorageDirectoryCreationFailed(PathBuf, #[source] std::io::Error),

    #[error("Storage directory is not readable {0:?}: {1}")]
    StorageDirectoryUnreadable(PathBuf, #[source] std::io::Error),

    #[error("Site directory does not exist: {0:?}")]
    SiteDirectoryMissing(PathBuf),
}

impl StartupCheckError {
    /// Whether the server cannot do its job at all without this being fixed.
    pub fn is_critical(&self) -> bool {
        matches!(
            self,
            StartupCheckError::StorageDirectoryCreationFailed(..)
                | StartupCheckError::StorageDirectoryUnreadable(..)
        )
    }
}

/// Creates the storage directory on first start.
pub async fn ensure_storage_directory(config: &UploadConfig) -> Result<(), StartupCheckError> {
    let storage_dir = &config.storage_directory;
    if tokio::fs::try_exists(storage_dir).await.unwrap_or(false) {
        return Ok(());
    }

    info!(
        "Storage directory does not exist, creating: {:?}",
        storage_dir
    );
    tokio::fs::create_dir_all(storage_dir)
        .await
        .map_err(|e| StartupCheckError::StorageDirectoryCreationFailed(storage_dir.clone(), e))
}

pub async fn perform_startup_checks(config: &Config) -> Result<(), Vec<StartupCheckError>> {
    let mut errors = Vec::new();

    info!("Performing startup checks...");

    let storage_dir = &config.upload.storage_directory;
    match ensure_storage_directory(&config.upload).await {
        Ok(()) => match tokio::fs::read_dir(storage_dir).await {
            Ok(_) => info!("Storage directory is accessible: {:?}", storage_dir),
            Err(e) => {
                error!("Storage directory is not accessible: {}", e);
                errors.push(StartupCheckError::StorageDirectoryUnreadable(
                    storage_dir.clone(),
                    e,
                ));
            }
        },
        Err(e) => {
            error!("{}", e);
            errors.push(e);
        }
    }

    let site_dir = &config.static_files.directory;
    if site_dir.exists() {
        info!("Site directory exists: {:?}", site_dir);
        if !site_dir.join("index.html").exists() {
            warn!("Site directory has no index.html, / will return 404");
        }
    } else {
        warn!("Site directory does not exist: {:?}", site_dir);
        errors.push(StartupCheckError::SiteDirectoryMissing(site_dir.clone()));
    }

    if errors.is_empty() {
        info!("All startup checks passed");
        Ok(())
    } else {
        error!("Startup checks failed with {} errors", errors.len());
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn config_in(temp_dir: &TempDir) -> Config {
        let mut config = Config::default();
        config.upload.storage_directory = temp_dir.path().join("upload_images");
        config.static_files.directory = temp_dir.path().join("public");
        config
    }

    #[tokio::test]
    async fn test_storage_directory_created() {
        let temp_dir = TempDir::new().unwrap();
        let config = config_in(&temp_dir);
        std::fs::create_dir_all(&config.static_files.directory).unwrap();

        assert!(perform_startup_checks(&config).await.is_ok());
        assert!(config.upload.storage_directory.is_dir());
    }

    #[tokio::test]
    async fn test_missing_site_directory_is_not_critical() {
        let temp_dir = TempDir::new().unwrap();
        let config = config_in(&temp_dir);

        let errors = perform_startup_checks(&config).await.unwrap_err();
        assert_eq!(errors.len(), 1);
        assert!(matches!(errors[0], StartupCheckError::SiteDirectoryMissing(_)));
        assert!(!errors[0].is_critical());
    }

    #[tokio::test]
    async fn test_storage_creation_failure_is_critical() {
        let temp_dir = TempDir::new().unwrap();
        let mut config = config_in(&temp_dir);
        let blocker = temp_dir.path().join("blocker");
        std::fs::write(&blocker, b"x").unwrap();
        config.upload.storage_directory = blocker.join("uploads");

        let err = ensure_storage_directory(&config.upload).await.unwrap_err();
        assert!(err.is_critical());
    }
}
