use image::{ImageBuffer, ImageFormat, Rgb};
use imagedrop::{
    Config,
    client::{
        ClientConfig, GalleryView, HttpTransport, SelectedFile, UploadSession, UploadState,
        UploadTransport, load_gallery,
    },
    create_app,
    startup_checks::perform_startup_checks,
};
use std::{io::Cursor, sync::Arc};
use tempfile::TempDir;
use tokio::net::TcpListener;

fn png_file(name: &str) -> SelectedFile {
    let img = ImageBuffer::from_fn(16, 16, |x, _| Rgb([x as u8 * 10, 0, 0]));
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, ImageFormat::Png).unwrap();
    SelectedFile::new(name, "image/png", out.into_inner())
}

/// Starts the server on an ephemeral port and returns its base URL.
async fn spawn_server(temp_dir: &TempDir) -> String {
    let mut config = Config::default();
    config.upload.storage_directory = temp_dir.path().join("upload_images");
    config.static_files.directory = temp_dir.path().join("public");
    if let Err(errors) = perform_startup_checks(&config).await {
        assert!(errors.iter().all(|e| !e.is_critical()));
    }

    let app = create_app(config).await;
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    format!("http://{}", addr)
}

fn client_config(base_url: &str) -> ClientConfig {
    ClientConfig {
        chunk_size: 256,
        ..ClientConfig::with_base_url(base_url)
    }
}

#[tokio::test]
async fn test_upload_then_gallery_over_http() {
    let temp_dir = TempDir::new().unwrap();
    let base_url = spawn_server(&temp_dir).await;
    let transport = Arc::new(HttpTransport::new(client_config(&base_url)).unwrap());

    assert_eq!(load_gallery(transport.as_ref()).await, GalleryView::Empty);

    let mut session = UploadSession::new(transport.clone());
    let ticket = session
        .handle_files(vec![
            png_file("first.png"),
            SelectedFile::new("notes.txt", "text/plain", "skip me"),
            png_file("second.png"),
        ])
        .unwrap();

    let mut progress_seen = false;
    while session.in_flight() > 0 {
        let event = session.next_event().await.unwrap();
        progress_seen |= matches!(event, imagedrop::client::UploadEvent::Progress { .. });
        session.apply(event);
    }
    assert!(progress_seen);

    let stored = match &session.upload(ticket).unwrap().state {
        UploadState::Completed { stored } => stored.clone(),
        other => panic!("upload did not complete: {:?}", other),
    };
    assert_eq!(stored.len(), 2);
    assert_eq!(
        session.message().unwrap().text,
        "Successfully uploaded 2 image(s)!"
    );

    let view = load_gallery(transport.as_ref()).await;
    assert_eq!(view.tiles().len(), 2);
    for tile in view.tiles() {
        let url = transport.absolute_url(&tile.url).unwrap();
        let bytes = reqwest::get(url).await.unwrap().bytes().await.unwrap();
        assert!(bytes.starts_with(b"\x89PNG"));
    }
}

#[tokio::test]
async fn test_server_rejection_reaches_client() {
    let temp_dir = TempDir::new().unwrap();
    let base_url = spawn_server(&temp_dir).await;
    let transport = HttpTransport::new(client_config(&base_url)).unwrap();

    let (events, _rx) = tokio::sync::mpsc::unbounded_channel();
    let err = transport
        .upload(
            imagedrop::client::UploadTicket::new(),
            vec![SelectedFile::new("fake.png", "image/svg+xml", "<svg/>")],
            events,
        )
        .await
        .unwrap_err();

    assert_eq!(err.to_string(), "Only image files are allowed!");
}

#[tokio::test]
async fn test_unreachable_server_renders_empty_gallery() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let transport = HttpTransport::new(client_config(&format!("http://{}", addr))).unwrap();
    assert_eq!(load_gallery(&transport).await, GalleryView::Empty);
}
