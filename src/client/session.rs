use super::{
    Preview, SelectedFile, SelectionState, UploadEvent, UploadTicket, UploadTransport,
};
use crate::upload::StoredImage;
use std::{collections::HashMap, fmt, sync::Arc};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{debug, info, warn};

const INTERRUPTED_MESSAGE: &str = "Upload interrupted";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    Success,
    Error,
}

/// The single inline status line shown next to the drop zone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusMessage {
    pub kind: MessageKind,
    pub text: String,
}

impl StatusMessage {
    fn success(text: impl Into<String>) -> Self {
        Self {
            kind: MessageKind::Success,
            text: text.into(),
        }
    }

    fn error(text: impl Into<String>) -> Self {
        Self {
            kind: MessageKind::Error,
            text: text.into(),
        }
    }
}

impl fmt::Display for StatusMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// Why a pick or drop did not start an upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SelectionRejected {
    #[error("No files selected")]
    NoFiles,
    #[error("Please select valid image files")]
    NoImages,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadState {
    InFlight { sent: u64 },
    Completed { stored: Vec<StoredImage> },
    Failed { message: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackedUpload {
    pub files: Vec<String>,
    pub total: u64,
    pub state: UploadState,
}

impl TrackedUpload {
    pub fn is_in_flight(&self) -> bool {
        matches!(self.state, UploadState::InFlight { .. })
    }
}

/// Client-side state of the upload page: the selection, every upload started
/// from it and the status line. Uploads run as spawned tasks and report back
/// through an event channel; removing a file from the selection never cancels
/// an upload already started.
pub struct UploadSession {
    selection: SelectionState,
    transport: Arc<dyn UploadTransport>,
    events_tx: UnboundedSender<UploadEvent>,
    events_rx: UnboundedReceiver<UploadEvent>,
    uploads: HashMap<UploadTicket, TrackedUpload>,
    message: Option<StatusMessage>,
}

impl UploadSession {
    pub fn new(transport: Arc<dyn UploadTransport>) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            selection: SelectionState::new(),
            transport,
            events_tx,
            events_rx,
            uploads: HashMap::new(),
            message: None,
        }
    }

    pub fn selection(&self) -> &SelectionState {
        &self.selection
    }

    pub fn message(&self) -> Option<&StatusMessage> {
        self.message.as_ref()
    }

    pub fn upload(&self, ticket: UploadTicket) -> Option<&TrackedUpload> {
        self.uploads.get(&ticket)
    }

    pub fn in_flight(&self) -> usize {
        self.uploads.values().filter(|u| u.is_in_flight()).count()
    }

    /// Forgets completed and failed uploads, returning how many were dropped.
    /// Late events for a forgotten ticket are ignored.
    pub fn clear_finished(&mut self) -> usize {
        let before = self.uploads.len();
        self.uploads.retain(|_, upload| upload.is_in_flight());
        before - self.uploads.len()
    }

    /// Adds picked or dropped files and starts uploading the image ones.
    /// Must be called from within a tokio runtime.
    pub fn handle_files(
        &mut self,
        candidates: Vec<SelectedFile>,
    ) -> Result<UploadTicket, SelectionRejected> {
        self.message = None;

        if candidates.is_empty() {
            return Err(self.reject(SelectionRejected::NoFiles));
        }

        let added = self.selection.add_files(candidates);
        if added.is_empty() {
            return Err(self.reject(SelectionRejected::NoImages));
        }

        let ticket = UploadTicket::new();
        self.uploads.insert(
            ticket,
            TrackedUpload {
                files: added.iter().map(|f| f.name.clone()).collect(),
                total: added.iter().map(SelectedFile::size).sum(),
                state: UploadState::InFlight { sent: 0 },
            },
        );

        let transport = self.transport.clone();
        let progress = self.events_tx.clone();
        let upload =
            tokio::spawn(async move { transport.upload(ticket, added, progress).await });

        // Every ticket gets exactly one terminal event, even if the transport panics
        let events = self.events_tx.clone();
        tokio::spawn(async move {
            let outcome = match upload.await {
                Ok(Ok(response)) => UploadEvent::Completed { ticket, response },
                Ok(Err(e)) => {
                    warn!("Upload {} failed: {}", ticket, e);
                    UploadEvent::Failed {
                        ticket,
                        message: e.to_string(),
                    }
                }
                Err(e) => {
                    warn!("Upload task {} ended abnormally: {}", ticket, e);
                    UploadEvent::Failed {
                        ticket,
                        message: INTERRUPTED_MESSAGE.to_string(),
                    }
                }
            };
            let _ = events.send(outcome);
        });

        debug!("Started upload {}", ticket);
        Ok(ticket)
    }

    fn reject(&mut self, reason: SelectionRejected) -> SelectionRejected {
        self.message = Some(StatusMessage::error(reason.to_string()));
        reason
    }

    /// Drops a file from the local selection only; the server keeps whatever
    /// was already uploaded.
    pub fn remove_at<P: TryInto<usize>>(&mut self, position: P) -> Option<SelectedFile> {
        self.selection.remove_at(position)
    }

    /// Renders previews of the whole selection. Files that fail to render
    /// are left out and reported on the status line.
    pub async fn previews(&mut self) -> Vec<Preview> {
        let mut previews = Vec::with_capacity(self.selection.len());
        for slot in self.selection.current_previews().await {
            match slot {
                Ok(preview) => previews.push(preview),
                Err(e) => self.message = Some(StatusMessage::error(e.to_string())),
            }
        }
        previews
    }

    pub async fn next_event(&mut self) -> Option<UploadEvent> {
        self.events_rx.recv().await
    }

    /// Folds one event into the state of the upload it belongs to.
    pub fn apply(&mut self, event: UploadEvent) {
        let Some(tracked) = self.uploads.get_mut(&event.ticket()) else {
            debug!("Ignoring event for unknown upload {}", event.ticket());
            return;
        };

        match event {
            UploadEvent::Progress { sent, total, .. } => {
                if !tracked.is_in_flight() {
                    return;
                }
                tracked.state = UploadState::InFlight { sent };
                let percent = if total == 0 {
                    100
                } else {
                    ((sent as f64 / total as f64) * 100.0).round() as u64
                };
                self.message = Some(StatusMessage::success(format!(
                    "Uploading... {}%",
                    percent
                )));
            }
            UploadEvent::Completed { response, .. } => {
                info!("{}", response.message);
                let count = tracked.files.len();
                tracked.state = UploadState::Completed {
                    stored: response.files,
                };
                self.message = Some(StatusMessage::success(format!(
                    "Successfully uploaded {} image(s)!",
                    count
                )));
            }
            UploadEvent::Failed { message, .. } => {
                self.message = Some(StatusMessage::error(format!("Upload failed: {}", message)));
                tracked.state = UploadState::Failed { message };
            }
        }
    }

    /// Applies events until no upload is in flight.
    pub async fn settle(&mut self) {
        while self.in_flight() > 0 {
            match self.next_event().await {
                Some(event) => self.apply(event),
                None => break,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        client::ClientError,
        gallery::{GalleryListing, GalleryResponse},
        upload::UploadResponse,
    };
    use async_trait::async_trait;
    use image::{ImageBuffer, ImageFormat, Rgb};
    use std::{io::Cursor, sync::Mutex};
    use tokio::sync::Notify;

    /// Accepts everything, echoing names back, unless a file is called
    /// `fail.png` (server error) or `panic.png` (task dies). Waits on `gate`
    /// when one is installed.
    #[derive(Default)]
    struct FakeTransport {
        gate: Option<Arc<Notify>>,
        received: Mutex<Vec<Vec<String>>>,
    }

    #[async_trait]
    impl UploadTransport for FakeTransport {
        async fn upload(
            &self,
            ticket: UploadTicket,
            files: Vec<SelectedFile>,
            events: UnboundedSender<UploadEvent>,
        ) -> Result<UploadResponse, ClientError> {
            self.received
                .lock()
                .unwrap()
                .push(files.iter().map(|f| f.name.clone()).collect());

            if let Some(gate) = &self.gate {
                gate.notified().await;
            }

            let total = files.iter().map(SelectedFile::size).sum();
            let _ = events.send(UploadEvent::Progress {
                ticket,
                sent: total,
                total,
            });

            if files.iter().any(|f| f.name == "panic.png") {
                panic!("transport crashed");
            }

            if files.iter().any(|f| f.name == "fail.png") {
                return Err(ClientError::Server {
                    status: 400,
                    message: "Only image files are allowed!".to_string(),
                });
            }

            let stored = files
                .iter()
                .map(|f| StoredImage {
                    stored_name: format!("stored-{}", f.name),
                    original_name: f.name.clone(),
                    size_bytes: f.size(),
                    public_path: format!("/uploads/stored-{}", f.name),
                })
                .collect();

            Ok(UploadResponse {
                success: true,
                message: format!("Successfully uploaded {} file(s)", files.len()),
                files: stored,
                rejections: Vec::new(),
            })
        }

        async fn fetch_gallery(&self) -> Result<GalleryResponse, ClientError> {
            Ok(GalleryListing::default().into())
        }
    }

    fn image_file(name: &str) -> SelectedFile {
        let img = ImageBuffer::from_fn(3, 3, |_, _| Rgb([1u8, 2, 3]));
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, ImageFormat::Png).unwrap();
        SelectedFile::new(name, "image/png", out.into_inner())
    }

    #[tokio::test]
    async fn test_empty_selection_sets_message() {
        let mut session = UploadSession::new(Arc::new(FakeTransport::default()));

        assert_eq!(session.handle_files(vec![]), Err(SelectionRejected::NoFiles));
        assert_eq!(session.message().unwrap().text, "No files selected");
        assert_eq!(session.message().unwrap().kind, MessageKind::Error);
    }

    #[tokio::test]
    async fn test_only_non_images_sets_message() {
        let mut session = UploadSession::new(Arc::new(FakeTransport::default()));

        let result = session.handle_files(vec![SelectedFile::new("a.txt", "text/plain", "x")]);
        assert_eq!(result, Err(SelectionRejected::NoImages));
        assert_eq!(
            session.message().unwrap().text,
            "Please select valid image files"
        );
        assert!(session.selection().is_empty());
    }

    #[tokio::test]
    async fn test_upload_completes() {
        let transport = Arc::new(FakeTransport::default());
        let mut session = UploadSession::new(transport.clone());

        let ticket = session
            .handle_files(vec![image_file("a.png"), image_file("b.png")])
            .unwrap();
        session.settle().await;

        let tracked = session.upload(ticket).unwrap();
        match &tracked.state {
            UploadState::Completed { stored } => assert_eq!(stored.len(), 2),
            other => panic!("unexpected state {:?}", other),
        }
        assert_eq!(
            session.message().unwrap().text,
            "Successfully uploaded 2 image(s)!"
        );
    }

    #[tokio::test]
    async fn test_only_new_files_are_uploaded() {
        let transport = Arc::new(FakeTransport::default());
        let mut session = UploadSession::new(transport.clone());

        session.handle_files(vec![image_file("a.png")]).unwrap();
        session.settle().await;
        session
            .handle_files(vec![
                image_file("b.png"),
                SelectedFile::new("skip.txt", "text/plain", "x"),
            ])
            .unwrap();
        session.settle().await;

        let received = transport.received.lock().unwrap().clone();
        assert_eq!(received, vec![vec!["a.png".to_string()], vec!["b.png".to_string()]]);
        assert_eq!(session.selection().len(), 2);
    }

    #[tokio::test]
    async fn test_failed_upload_reports_message() {
        let mut session = UploadSession::new(Arc::new(FakeTransport::default()));

        let ticket = session.handle_files(vec![image_file("fail.png")]).unwrap();
        session.settle().await;

        assert!(matches!(
            session.upload(ticket).unwrap().state,
            UploadState::Failed { .. }
        ));
        assert_eq!(
            session.message().unwrap().text,
            "Upload failed: Only image files are allowed!"
        );
    }

    #[tokio::test]
    async fn test_concurrent_uploads_keep_separate_state() {
        let mut session = UploadSession::new(Arc::new(FakeTransport::default()));

        let good = session.handle_files(vec![image_file("good.png")]).unwrap();
        let bad = session.handle_files(vec![image_file("fail.png")]).unwrap();
        assert_eq!(session.in_flight(), 2);
        session.settle().await;

        assert!(matches!(
            session.upload(good).unwrap().state,
            UploadState::Completed { .. }
        ));
        assert!(matches!(
            session.upload(bad).unwrap().state,
            UploadState::Failed { .. }
        ));
        assert_eq!(session.upload(good).unwrap().files, vec!["good.png"]);
        assert_eq!(session.upload(bad).unwrap().files, vec!["fail.png"]);
    }

    #[tokio::test]
    async fn test_removing_preview_does_not_cancel_upload() {
        let gate = Arc::new(Notify::new());
        let transport = Arc::new(FakeTransport {
            gate: Some(gate.clone()),
            ..FakeTransport::default()
        });
        let mut session = UploadSession::new(transport);

        let ticket = session.handle_files(vec![image_file("a.png")]).unwrap();
        assert!(session.remove_at(0usize).is_some());
        assert!(session.selection().is_empty());

        gate.notify_one();
        session.settle().await;

        assert!(matches!(
            session.upload(ticket).unwrap().state,
            UploadState::Completed { .. }
        ));
    }

    #[tokio::test]
    async fn test_crashed_upload_task_still_settles() {
        let mut session = UploadSession::new(Arc::new(FakeTransport::default()));

        let crashed = session.handle_files(vec![image_file("panic.png")]).unwrap();
        let fine = session.handle_files(vec![image_file("ok.png")]).unwrap();
        session.settle().await;

        assert_eq!(session.in_flight(), 0);
        assert_eq!(
            session.upload(crashed).unwrap().state,
            UploadState::Failed {
                message: "Upload interrupted".to_string()
            }
        );
        assert!(matches!(
            session.upload(fine).unwrap().state,
            UploadState::Completed { .. }
        ));
    }

    #[tokio::test]
    async fn test_clear_finished_keeps_in_flight_uploads() {
        let gate = Arc::new(Notify::new());
        let transport = Arc::new(FakeTransport {
            gate: Some(gate.clone()),
            ..FakeTransport::default()
        });
        let mut session = UploadSession::new(transport);

        let first = session.handle_files(vec![image_file("a.png")]).unwrap();
        gate.notify_one();
        while session.upload(first).unwrap().is_in_flight() {
            let event = session.next_event().await.unwrap();
            session.apply(event);
        }

        let second = session.handle_files(vec![image_file("b.png")]).unwrap();
        assert_eq!(session.clear_finished(), 1);
        assert!(session.upload(first).is_none());
        assert!(session.upload(second).unwrap().is_in_flight());

        gate.notify_one();
        session.settle().await;
        assert!(matches!(
            session.upload(second).unwrap().state,
            UploadState::Completed { .. }
        ));
    }

    #[tokio::test]
    async fn test_progress_message() {
        let mut session = UploadSession::new(Arc::new(FakeTransport::default()));
        let gate_free_ticket = session.handle_files(vec![image_file("a.png")]).unwrap();

        session.apply(UploadEvent::Progress {
            ticket: gate_free_ticket,
            sent: 1,
            total: 3,
        });
        assert_eq!(session.message().unwrap().text, "Uploading... 33%");
        assert_eq!(
            session.upload(gate_free_ticket).unwrap().state,
            UploadState::InFlight { sent: 1 }
        );
        session.settle().await;
    }

    #[tokio::test]
    async fn test_previews_skip_broken_files() {
        let mut session = UploadSession::new(Arc::new(FakeTransport::default()));
        session
            .handle_files(vec![
                image_file("a.png"),
                SelectedFile::new("broken.png", "image/png", b"nope".to_vec()),
                image_file("c.png"),
            ])
            .unwrap();

        let previews = session.previews().await;
        assert_eq!(previews.len(), 2);
        assert_eq!(previews[0].position, 0);
        assert_eq!(previews[1].position, 2);
        assert_eq!(
            session.message().unwrap().text,
            "Error reading file: broken.png"
        );
        session.settle().await;
    }
}
