use super::{ClientConfig, ClientError, SelectedFile};
use crate::{api::ErrorResponse, gallery::GalleryResponse, upload::UploadResponse};
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::multipart::{Form, Part};
use std::{
    fmt,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
};
use tokio::sync::mpsc::UnboundedSender;
use tracing::debug;
use url::Url;
use uuid::Uuid;

/// Identifies one upload request so its events update only its own state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UploadTicket(Uuid);

impl UploadTicket {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for UploadTicket {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for UploadTicket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone)]
pub enum UploadEvent {
    Progress {
        ticket: UploadTicket,
        sent: u64,
        total: u64,
    },
    Completed {
        ticket: UploadTicket,
        response: UploadResponse,
    },
    Failed {
        ticket: UploadTicket,
        message: String,
    },
}

impl UploadEvent {
    pub fn ticket(&self) -> UploadTicket {
        match self {
            UploadEvent::Progress { ticket, .. }
            | UploadEvent::Completed { ticket, .. }
            | UploadEvent::Failed { ticket, .. } => *ticket,
        }
    }
}

/// The server calls the client makes. Progress is reported on `events`;
/// the final outcome is the return value.
#[async_trait]
pub trait UploadTransport: Send + Sync {
    async fn upload(
        &self,
        ticket: UploadTicket,
        files: Vec<SelectedFile>,
        events: UnboundedSender<UploadEvent>,
    ) -> Result<UploadResponse, ClientError>;

    async fn fetch_gallery(&self) -> Result<GalleryResponse, ClientError>;
}

pub struct HttpTransport {
    client: reqwest::Client,
    config: ClientConfig,
    base_url: Url,
    upload_url: Url,
    images_url: Url,
}

impl HttpTransport {
    pub fn new(config: ClientConfig) -> Result<Self, ClientError> {
        let base_url = Url::parse(&config.base_url)?;
        let upload_url = base_url.join(&config.upload_endpoint)?;
        let images_url = base_url.join(&config.images_endpoint)?;
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()?;

        Ok(Self {
            client,
            config,
            base_url,
            upload_url,
            images_url,
        })
    }

    /// Resolves a server-relative path such as a gallery image URL.
    pub fn absolute_url(&self, path: &str) -> Result<Url, ClientError> {
        Ok(self.base_url.join(path)?)
    }

    fn streamed_part(
        &self,
        ticket: UploadTicket,
        file: SelectedFile,
        sent: Arc<AtomicU64>,
        total: u64,
        events: UnboundedSender<UploadEvent>,
    ) -> Result<Part, ClientError> {
        let length = file.size();
        let chunk_size = self.config.chunk_size.max(1);
        let chunks: Vec<_> = (0..file.bytes.len())
            .step_by(chunk_size)
            .map(|start| file.bytes.slice(start..(start + chunk_size).min(file.bytes.len())))
            .collect();

        let stream = futures::stream::iter(chunks).map(move |chunk| {
            let len = chunk.len() as u64;
            let now = sent.fetch_add(len, Ordering::Relaxed) + len;
            // Receiver gone means nobody is watching progress any more.
            let _ = events.send(UploadEvent::Progress {
                ticket,
                sent: now,
                total,
            });
            Ok::<_, std::io::Error>(chunk)
        });

        let part = Part::stream_with_length(reqwest::Body::wrap_stream(stream), length)
            .file_name(file.name)
            .mime_str(&file.mime_type)?;
        Ok(part)
    }
}

#[async_trait]
impl UploadTransport for HttpTransport {
    async fn upload(
        &self,
        ticket: UploadTicket,
        files: Vec<SelectedFile>,
        events: UnboundedSender<UploadEvent>,
    ) -> Result<UploadResponse, ClientError> {
        let total: u64 = files.iter().map(SelectedFile::size).sum();
        let sent = Arc::new(AtomicU64::new(0));

        let mut form = Form::new();
        for file in files {
            let part = self.streamed_part(ticket, file, sent.clone(), total, events.clone())?;
            form = form.part(self.config.field_name.clone(), part);
        }

        debug!("Uploading {} bytes to {} (ticket {})", total, self.upload_url, ticket);
        let response = self
            .client
            .post(self.upload_url.clone())
            .multipart(form)
            .send()
            .await?;

        if response.status().is_success() {
            Ok(response.json::<UploadResponse>().await?)
        } else {
            Err(server_error(response).await)
        }
    }

    async fn fetch_gallery(&self) -> Result<GalleryResponse, ClientError> {
        let response = self.client.get(self.images_url.clone()).send().await?;

        if response.status().is_success() {
            Ok(response.json::<GalleryResponse>().await?)
        } else {
            Err(server_error(response).await)
        }
    }
}

async fn server_error(response: reqwest::Response) -> ClientError {
    let status = response.status();
    let message = match response.json::<ErrorResponse>().await {
        Ok(body) => body.message,
        Err(_) => status
            .canonical_reason()
            .unwrap_or("Unknown error")
            .to_string(),
    };

    ClientError::Server {
        status: status.as_u16(),
        message,
    }
}
