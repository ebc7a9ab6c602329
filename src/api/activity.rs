use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{header, StatusCode},
    response::Response,
    routing::get,
    Router,
};

use crate::{
    api::files::chunk_stream,
    error::{ApiError, ApiResult},
    main_lib::AppState,
};

/// Streams the activity log as plain text. An empty or never-written log
/// yields an empty 200 body.
async fn stream_activity_log(State(state): State<Arc<AppState>>) -> ApiResult<Response> {
    let body = match tokio::fs::File::open(state.activity_log.path()).await {
        Ok(file) => Body::from_stream(chunk_stream(file)),
        Err(_) => Body::empty(),
    };
    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "text/plain; charset=utf-8")
        .body(body)
        .map_err(|e| ApiError::Internal(format!("Failed to build response: {}", e)))
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/activity/log", get(stream_activity_log))
}
