use super::{PreviewRenderError, SelectedFile};
use base64::{Engine, engine::general_purpose};
use std::io::Cursor;
use tracing::warn;

/// A displayable preview of one selected file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Preview {
    /// Position in the selection when the preview was rendered; the handle
    /// for removing this file.
    pub position: usize,
    pub name: String,
    /// `data:` URL carrying the original bytes.
    pub source: String,
    pub dimensions: (u32, u32),
}

pub type PreviewSlot = Result<Preview, PreviewRenderError>;

pub fn render_preview(position: usize, file: &SelectedFile) -> PreviewSlot {
    let dimensions = image::ImageReader::new(Cursor::new(&file.bytes[..]))
        .with_guessed_format()
        .map_err(|e| PreviewRenderError::Decode {
            position,
            name: file.name.clone(),
            source: image::ImageError::IoError(e),
        })?
        .into_dimensions()
        .map_err(|source| PreviewRenderError::Decode {
            position,
            name: file.name.clone(),
            source,
        })?;

    let source = format!(
        "data:{};base64,{}",
        file.mime_type,
        general_purpose::STANDARD.encode(&file.bytes)
    );

    Ok(Preview {
        position,
        name: file.name.clone(),
        source,
        dimensions,
    })
}

/// Renders every file concurrently on the blocking pool and returns the
/// slots in selection order.
pub async fn render_previews(files: &[SelectedFile]) -> Vec<PreviewSlot> {
    let tasks = files.iter().cloned().enumerate().map(|(position, file)| async move {
        let name = file.name.clone();
        match tokio::task::spawn_blocking(move || render_preview(position, &file)).await {
            Ok(slot) => slot,
            Err(e) => {
                warn!("Preview task for {} failed: {}", name, e);
                Err(PreviewRenderError::Interrupted { position, name })
            }
        }
    });

    let slots = futures::future::join_all(tasks).await;

    for failed in slots.iter().filter_map(|slot| slot.as_ref().err()) {
        warn!("{}", failed);
    }

    slots
}
