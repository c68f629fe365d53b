use super::{IncomingFile, UploadBatch, UploadError, UploadGateway, UploadResponse};
use crate::AppState;
use axum::{
    Json,
    extract::{
        Multipart, State,
        multipart::{Field, MultipartError, MultipartRejection},
    },
    http::StatusCode,
};
use bytes::{Bytes, BytesMut};
use tracing::{debug, info};

pub async fn upload_handler(
    State(app_state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<UploadResponse>, UploadError> {
    let multipart = multipart.map_err(|rejection| {
        debug!("Upload request is not multipart: {}", rejection);
        UploadError::NoFiles
    })?;

    let upload_config = &app_state.config.upload;
    let batch = receive_batch(
        multipart,
        &app_state.gateway,
        &upload_config.field_name,
        upload_config.max_files,
    )
    .await?;

    let result = app_state.gateway.submit(batch).await?;
    info!("Successfully uploaded {} file(s)", result.accepted_count());

    Ok(Json(result.into()))
}

/// Reads the multipart body into an [`UploadBatch`], enforcing the transport
/// limits: at most `max_files` files under `field_name`, and no file buffered
/// beyond one byte past the size ceiling. Text fields are ignored. Unless the
/// gateway reports rejections per file, the first invalid file aborts the
/// request before the rest of the body is read.
pub async fn receive_batch(
    mut multipart: Multipart,
    gateway: &UploadGateway,
    field_name: &str,
    max_files: usize,
) -> Result<UploadBatch, UploadError> {
    let validator = gateway.validator();
    let strict = !gateway.partial_success();
    let max_megabytes = validator.max_file_size() / (1024 * 1024);
    let mut batch = UploadBatch::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error(e, max_megabytes))?
    {
        let Some(original_name) = field.file_name().map(str::to_string) else {
            continue;
        };

        let name = field.name().unwrap_or_default();
        if name != field_name {
            return Err(UploadError::UnexpectedField(name.to_string()));
        }

        if batch.len() >= max_files {
            return Err(UploadError::TooManyFiles { max: max_files });
        }

        let content_type = field
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_string();

        if strict {
            validator.check_type(&original_name, &content_type)?;
        }

        let data = read_capped(field, validator.max_file_size() + 1, max_megabytes).await?;

        if strict {
            validator.check_size(&original_name, data.len() as u64)?;
        }

        debug!(
            "Received '{}' ({}, {} bytes)",
            original_name,
            content_type,
            data.len()
        );
        batch
            .files
            .push(IncomingFile::new(original_name, content_type, data));
    }

    Ok(batch)
}

async fn read_capped(
    mut field: Field<'_>,
    cap: u64,
    max_megabytes: u64,
) -> Result<Bytes, UploadError> {
    let mut buffer = BytesMut::new();

    while let Some(chunk) = field
        .chunk()
        .await
        .map_err(|e| multipart_error(e, max_megabytes))?
    {
        let remaining = cap.saturating_sub(buffer.len() as u64) as usize;
        if chunk.len() >= remaining {
            buffer.extend_from_slice(&chunk[..remaining]);
            break;
        }
        buffer.extend_from_slice(&chunk);
    }

    Ok(buffer.freeze())
}

fn multipart_error(error: MultipartError, max_megabytes: u64) -> UploadError {
    if error.status() == StatusCode::PAYLOAD_TOO_LARGE {
        UploadError::FileTooLarge {
            original_name: String::new(),
            max_megabytes,
        }
    } else {
        UploadError::Malformed(error.body_text())
    }
}
