use super::{UploadError, namer};
use mime_guess::mime;

/// Extensions (without dot, lowercase) accepted for upload and listed by the gallery.
pub const ALLOWED_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "webp"];

const REJECTED_TYPE_REASON: &str = "Only image files are allowed!";

pub fn has_allowed_extension(file_name: &str) -> bool {
    let (_, extension) = namer::split_extension(namer::base_name(file_name));
    extension
        .strip_prefix('.')
        .is_some_and(is_allowed_token)
}

pub fn has_allowed_mime(content_type: &str) -> bool {
    match content_type.trim().parse::<mime::Mime>() {
        Ok(parsed) => {
            parsed.type_().as_str().eq_ignore_ascii_case(mime::IMAGE.as_str())
                && is_allowed_token(parsed.subtype().as_str())
        }
        Err(_) => false,
    }
}

fn is_allowed_token(token: &str) -> bool {
    let token = token.to_ascii_lowercase();
    ALLOWED_EXTENSIONS.contains(&token.as_str())
}

/// Per-file acceptance rules: extension, declared MIME type and size must all pass.
#[derive(Debug, Clone, Copy)]
pub struct UploadValidator {
    max_file_size: u64,
}

impl UploadValidator {
    pub fn new(max_file_size: u64) -> Self {
        Self { max_file_size }
    }

    pub fn max_file_size(&self) -> u64 {
        self.max_file_size
    }

    /// Type checks only; usable before any byte of the file has been read.
    pub fn check_type(&self, original_name: &str, content_type: &str) -> Result<(), UploadError> {
        if has_allowed_extension(original_name) && has_allowed_mime(content_type) {
            Ok(())
        } else {
            Err(UploadError::Validation {
                original_name: original_name.to_string(),
                reason: REJECTED_TYPE_REASON.to_string(),
            })
        }
    }

    pub fn check_size(&self, original_name: &str, size: u64) -> Result<(), UploadError> {
        if size > self.max_file_size {
            return Err(UploadError::FileTooLarge {
                original_name: original_name.to_string(),
                max_megabytes: self.max_file_size / (1024 * 1024),
            });
        }
        Ok(())
    }

    pub fn validate(
        &self,
        original_name: &str,
        content_type: &str,
        size: u64,
    ) -> Result<(), UploadError> {
        self.check_type(original_name, content_type)?;
        self.check_size(original_name, size)
    }
}
