// Gallery module - listing derived from the storage directory
mod error;
mod handlers;
mod index;
mod types;

pub use error::GalleryError;
pub use handlers::list_images_handler;
pub use index::GalleryIndex;
pub use types::*;

pub type SharedGallery = std::sync::Arc<GalleryIndex>;
