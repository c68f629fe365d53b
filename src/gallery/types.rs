use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GalleryImage {
    pub filename: String,
    pub url: String,
}

/// Every image currently in the storage directory. `count` always equals
/// `images.len()`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct GalleryListing {
    pub count: usize,
    pub images: Vec<GalleryImage>,
}

impl GalleryListing {
    pub fn new(images: Vec<GalleryImage>) -> Self {
        Self {
            count: images.len(),
            images,
        }
    }
}

/// Body of `GET /api/images`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GalleryResponse {
    pub success: bool,
    #[serde(flatten)]
    pub listing: GalleryListing,
}

impl From<GalleryListing> for GalleryResponse {
    fn from(listing: GalleryListing) -> Self {
        Self {
            success: true,
            listing,
        }
    }
}
