use std::sync::Arc;

use anyhow::Context;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use chrono::Utc;

use crate::{
    error::{ApiError, ApiResult},
    events::{ServerEvent, ANNOUNCEMENT_CREATED},
    main_lib::AppState,
    models::{Announcement, NewAnnouncement},
};

async fn list_announcements(
    State(state): State<Arc<AppState>>,
) -> ApiResult<Json<Vec<Announcement>>> {
    let announcements = state.announcements.load()?;
    Ok(Json(announcements))
}

async fn create_announcement(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<NewAnnouncement>,
) -> ApiResult<Json<Announcement>> {
    let created_at = Utc::now().to_rfc3339();
    let created = state.announcements.update(|announcements| {
        let id = announcements.iter().map(|a| a.id).max().unwrap_or(0) + 1;
        let announcement = Announcement {
            id,
            title: payload.title,
            body: payload.body,
            created_at,
        };
        announcements.push(announcement.clone());
        announcement
    })?;

    let payload = serde_json::to_value(&created).context("Failed to serialize event payload")?;
    state
        .event_bus
        .publish(ServerEvent::new(ANNOUNCEMENT_CREATED, payload));
    Ok(Json(created))
}

async fn delete_announcement(
    Path(id): Path<u64>,
    State(state): State<Arc<AppState>>,
) -> ApiResult<StatusCode> {
    let removed = state.announcements.update(|announcements| {
        let before = announcements.len();
        announcements.retain(|a| a.id != id);
        announcements.len() != before
    })?;
    if !removed {
        return Err(ApiError::NotFound);
    }
    Ok(StatusCode::NO_CONTENT)
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/announcements",
            get(list_announcements).post(create_announcement),
        )
        .route("/announcements/{id}", axum::routing::delete(delete_announcement))
}
