use std::sync::Arc;

use anyhow::Context;
use axum::{
    body::Body,
    extract::{Multipart, Path, State},
    http::{header, StatusCode},
    response::Response,
    routing::{get, post},
    Json, Router,
};
use futures_core::Stream;
use tokio::io::AsyncReadExt;
use uuid::Uuid;

use crate::{
    error::{ApiError, ApiResult},
    events::{ServerEvent, FILE_UPLOADED},
    main_lib::AppState,
    models::UploadedFile,
};

const CHUNK_SIZE: usize = 64 * 1024;

/// Reads `file` chunk by chunk so large downloads are never buffered whole.
pub(crate) fn chunk_stream(
    file: tokio::fs::File,
) -> impl Stream<Item = std::io::Result<Vec<u8>>> {
    futures::stream::unfold(file, |mut file| async move {
        let mut buf = vec![0u8; CHUNK_SIZE];
        match file.read(&mut buf).await {
            Ok(0) => None,
            Ok(n) => {
                buf.truncate(n);
                Some((Ok(buf), file))
            }
            Err(err) => Some((Err(err), file)),
        }
    })
}

async fn upload_file(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> ApiResult<Json<UploadedFile>> {
    while let Some(field) = multipart.next_field().await.map_err(|e| {
        ApiError::BadRequest(format!("Failed to read multipart field: {}", e))
    })? {
        if field.name() != Some("file") {
            continue;
        }
        let file_name = field
            .file_name()
            .unwrap_or("upload.bin")
            .rsplit(['/', '\\'])
            .next()
            .unwrap_or("upload.bin")
            .to_string();
        let data = field
            .bytes()
            .await
            .map_err(|e| ApiError::BadRequest(format!("Failed to read file content: {}", e)))?;

        let stored_name = format!("{}-{}", Uuid::new_v4(), file_name);
        let path = state.uploads_dir.join(&stored_name);
        tokio::fs::write(&path, &data)
            .await
            .with_context(|| format!("Failed to store upload {}", path.display()))?;

        let uploaded = UploadedFile {
            file_name,
            stored_name,
            size: data.len() as u64,
        };
        // Notify only once the file is on disk.
        let payload =
            serde_json::to_value(&uploaded).context("Failed to serialize event payload")?;
        state
            .event_bus
            .publish(ServerEvent::new(FILE_UPLOADED, payload));
        return Ok(Json(uploaded));
    }
    Err(ApiError::BadRequest(
        "Missing file in multipart request".to_string(),
    ))
}

async fn download_file(
    Path(name): Path<String>,
    State(state): State<Arc<AppState>>,
) -> ApiResult<Response> {
    if name.contains('/') || name.contains('\\') || name.contains("..") {
        return Err(ApiError::BadRequest("Invalid file name".to_string()));
    }
    let path = state.uploads_dir.join(&name);
    let file = tokio::fs::File::open(&path)
        .await
        .map_err(|_| ApiError::NotFound)?;

    let body = Body::from_stream(chunk_stream(file));
    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "application/octet-stream")
        .body(body)
        .map_err(|e| ApiError::Internal(format!("Failed to build response: {}", e)))
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/files", post(upload_file))
        .route("/files/{name}", get(download_file))
}
