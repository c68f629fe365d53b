// Upload module - receipt, validation, naming and persistence of images
mod error;
mod gateway;
mod handlers;
mod namer;
mod types;
mod validator;

pub use error::UploadError;
pub use gateway::UploadGateway;
pub use handlers::{receive_batch, upload_handler};
pub use namer::{StorageNamer, base_name, split_extension};
pub use types::*;
pub use validator::{ALLOWED_EXTENSIONS, UploadValidator, has_allowed_extension, has_allowed_mime};

pub type SharedGateway = std::sync::Arc<UploadGateway>;
