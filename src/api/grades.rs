use std::sync::Arc;

use anyhow::Context;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::Deserialize;

use crate::{
    error::{ApiError, ApiResult},
    events::{ServerEvent, GRADE_UPDATED},
    main_lib::AppState,
    models::{Grade, GradeUpdate, NewGrade},
};

#[derive(Deserialize)]
pub struct GradesQuery {
    #[serde(rename = "studentId")]
    student_id: Option<u64>,
}

async fn list_grades(
    State(state): State<Arc<AppState>>,
    Query(q): Query<GradesQuery>,
) -> ApiResult<Json<Vec<Grade>>> {
    let mut grades = state.grades.load()?;
    if let Some(student_id) = q.student_id {
        grades.retain(|g| g.student_id == student_id);
    }
    Ok(Json(grades))
}

async fn create_grade(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<NewGrade>,
) -> ApiResult<Json<Grade>> {
    let created = state.grades.update(|grades| {
        let id = grades.iter().map(|g| g.id).max().unwrap_or(0) + 1;
        let grade = Grade {
            id,
            student_id: payload.student_id,
            subject: payload.subject,
            score: payload.score,
        };
        grades.push(grade.clone());
        grade
    })?;

    let payload = serde_json::to_value(&created).context("Failed to serialize event payload")?;
    state
        .event_bus
        .publish(ServerEvent::new(GRADE_UPDATED, payload));
    Ok(Json(created))
}

async fn update_grade(
    Path(id): Path<u64>,
    State(state): State<Arc<AppState>>,
    Json(payload): Json<GradeUpdate>,
) -> ApiResult<Json<Grade>> {
    let updated = state.grades.update(|grades| {
        let grade = grades.iter_mut().find(|g| g.id == id)?;
        if let Some(subject) = payload.subject {
            grade.subject = subject;
        }
        if let Some(score) = payload.score {
            grade.score = score;
        }
        Some(grade.clone())
    })?;
    let grade = updated.ok_or(ApiError::NotFound)?;

    let payload = serde_json::to_value(&grade).context("Failed to serialize event payload")?;
    state
        .event_bus
        .publish(ServerEvent::new(GRADE_UPDATED, payload));
    Ok(Json(grade))
}

async fn delete_grade(
    Path(id): Path<u64>,
    State(state): State<Arc<AppState>>,
) -> ApiResult<StatusCode> {
    let removed = state.grades.update(|grades| {
        let before = grades.len();
        grades.retain(|g| g.id != id);
        grades.len() != before
    })?;
    if !removed {
        return Err(ApiError::NotFound);
    }
    Ok(StatusCode::NO_CONTENT)
}

async fn get_grade(
    Path(id): Path<u64>,
    State(state): State<Arc<AppState>>,
) -> ApiResult<Json<Grade>> {
    let grades = state.grades.load()?;
    let grade = grades
        .into_iter()
        .find(|g| g.id == id)
        .ok_or(ApiError::NotFound)?;
    Ok(Json(grade))
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/grades", get(list_grades).post(create_grade))
        .route(
            "/grades/{id}",
            get(get_grade).put(update_grade).delete(delete_grade),
        )
}
