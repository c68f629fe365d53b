use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// The server answered with a failure envelope.
    #[error("{message}")]
    Server { status: u16, message: String },
}

/// Rendering one selected file failed. Never affects other previews.
#[derive(Debug, Error)]
pub enum PreviewRenderError {
    #[error("Error reading file: {name}")]
    Decode {
        position: usize,
        name: String,
        #[source]
        source: image::ImageError,
    },

    #[error("Preview of {name} was interrupted")]
    Interrupted { position: usize, name: String },
}

impl PreviewRenderError {
    pub fn position(&self) -> usize {
        match self {
            PreviewRenderError::Decode { position, .. }
            | PreviewRenderError::Interrupted { position, .. } => *position,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            PreviewRenderError::Decode { name, .. } | PreviewRenderError::Interrupted { name, .. } => {
                name
            }
        }
    }
}
