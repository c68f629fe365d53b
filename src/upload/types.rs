use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// One file as received from the transport, before validation.
#[derive(Debug, Clone)]
pub struct IncomingFile {
    pub original_name: String,
    pub content_type: String,
    /// Received bytes. The transport stops buffering one byte past the size
    /// ceiling, so an oversized file is still detectable from its length.
    pub data: Bytes,
}

impl IncomingFile {
    pub fn new(
        original_name: impl Into<String>,
        content_type: impl Into<String>,
        data: impl Into<Bytes>,
    ) -> Self {
        Self {
            original_name: original_name.into(),
            content_type: content_type.into(),
            data: data.into(),
        }
    }

    pub fn size(&self) -> u64 {
        self.data.len() as u64
    }
}

/// The files submitted in one request, in arrival order.
#[derive(Debug, Clone, Default)]
pub struct UploadBatch {
    pub files: Vec<IncomingFile>,
}

impl UploadBatch {
    pub fn new(files: Vec<IncomingFile>) -> Self {
        Self { files }
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }
}

/// A file persisted in the storage directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredImage {
    #[serde(rename = "filename")]
    pub stored_name: String,
    #[serde(rename = "originalname")]
    pub original_name: String,
    #[serde(rename = "size")]
    pub size_bytes: u64,
    #[serde(rename = "path")]
    pub public_path: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rejection {
    #[serde(rename = "originalname")]
    pub original_name: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default)]
pub struct UploadResult {
    pub files: Vec<StoredImage>,
    pub rejections: Vec<Rejection>,
}

impl UploadResult {
    pub fn accepted_count(&self) -> usize {
        self.files.len()
    }
}

/// Body of a successful `POST /upload`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadResponse {
    pub success: bool,
    pub message: String,
    pub files: Vec<StoredImage>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rejections: Vec<Rejection>,
}

impl From<UploadResult> for UploadResponse {
    fn from(result: UploadResult) -> Self {
        Self {
            success: true,
            message: format!("Successfully uploaded {} file(s)", result.accepted_count()),
            files: result.files,
            rejections: result.rejections,
        }
    }
}
