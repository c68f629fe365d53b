use super::UploadTransport;
use crate::gallery::GalleryResponse;
use tracing::warn;

pub const EMPTY_TITLE: &str = "No Images Yet";
pub const EMPTY_HINT: &str = "Upload some images to see them in your gallery!";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GalleryTile {
    pub url: String,
    pub alt: String,
}

/// What the gallery page shows: either the empty state or one tile per image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GalleryView {
    Empty,
    Images(Vec<GalleryTile>),
}

impl GalleryView {
    /// Entries without a URL are skipped. The first tile is alt-texted
    /// "Image 1".
    pub fn from_response(response: &GalleryResponse) -> Self {
        if !response.success {
            return GalleryView::Empty;
        }

        let tiles: Vec<GalleryTile> = response
            .listing
            .images
            .iter()
            .filter(|image| !image.url.is_empty())
            .enumerate()
            .map(|(i, image)| GalleryTile {
                url: image.url.clone(),
                alt: format!("Image {}", i + 1),
            })
            .collect();

        if tiles.is_empty() {
            GalleryView::Empty
        } else {
            GalleryView::Images(tiles)
        }
    }

    pub fn tiles(&self) -> &[GalleryTile] {
        match self {
            GalleryView::Empty => &[],
            GalleryView::Images(tiles) => tiles,
        }
    }

    /// Plain-text rendering used by the CLI.
    pub fn render(&self) -> String {
        match self {
            GalleryView::Empty => format!("{}\n{}\n", EMPTY_TITLE, EMPTY_HINT),
            GalleryView::Images(tiles) => tiles
                .iter()
                .map(|tile| format!("{}  {}\n", tile.alt, tile.url))
                .collect(),
        }
    }
}

/// Fetches the listing once. Any failure renders the empty state.
pub async fn load_gallery(transport: &dyn UploadTransport) -> GalleryView {
    match transport.fetch_gallery().await {
        Ok(response) => GalleryView::from_response(&response),
        Err(e) => {
            warn!("Error loading gallery: {}", e);
            GalleryView::Empty
        }
    }
}
