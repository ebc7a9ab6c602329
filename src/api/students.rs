use std::sync::Arc;

use anyhow::Context;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};

use crate::{
    error::{ApiError, ApiResult},
    events::{ServerEvent, STUDENT_ADDED},
    main_lib::AppState,
    models::{NewStudent, Student, StudentUpdate},
};

#[utoipa::path(get, path = "/api/v1/students", responses((status = 200, body = [Student])))]
pub async fn list_students(State(state): State<Arc<AppState>>) -> ApiResult<Json<Vec<Student>>> {
    let students = state.students.load()?;
    Ok(Json(students))
}

#[utoipa::path(post, path = "/api/v1/students", request_body = NewStudent, responses((status = 200, body = Student)))]
pub async fn create_student(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<NewStudent>,
) -> ApiResult<Json<Student>> {
    let created = state.students.update(|students| {
        let id = students.iter().map(|s| s.id).max().unwrap_or(0) + 1;
        let student = Student {
            id,
            name: payload.name,
            email: payload.email,
            grade_level: payload.grade_level,
        };
        students.push(student.clone());
        student
    })?;

    // Notify only once the record has been persisted.
    let payload = serde_json::to_value(&created).context("Failed to serialize event payload")?;
    state
        .event_bus
        .publish(ServerEvent::new(STUDENT_ADDED, payload));
    Ok(Json(created))
}

#[utoipa::path(get, path = "/api/v1/students/{id}", responses((status = 200, body = Student), (status = 404)))]
pub async fn get_student(
    Path(id): Path<u64>,
    State(state): State<Arc<AppState>>,
) -> ApiResult<Json<Student>> {
    let students = state.students.load()?;
    let student = students
        .into_iter()
        .find(|s| s.id == id)
        .ok_or(ApiError::NotFound)?;
    Ok(Json(student))
}

#[utoipa::path(put, path = "/api/v1/students/{id}", request_body = StudentUpdate, responses((status = 200, body = Student), (status = 404)))]
pub async fn update_student(
    Path(id): Path<u64>,
    State(state): State<Arc<AppState>>,
    Json(payload): Json<StudentUpdate>,
) -> ApiResult<Json<Student>> {
    let updated = state.students.update(|students| {
        let student = students.iter_mut().find(|s| s.id == id)?;
        if let Some(name) = payload.name {
            student.name = name;
        }
        if let Some(email) = payload.email {
            student.email = Some(email);
        }
        if let Some(grade_level) = payload.grade_level {
            student.grade_level = Some(grade_level);
        }
        Some(student.clone())
    })?;
    let student = updated.ok_or(ApiError::NotFound)?;
    Ok(Json(student))
}

#[utoipa::path(delete, path = "/api/v1/students/{id}", responses((status = 204), (status = 404)))]
pub async fn delete_student(
    Path(id): Path<u64>,
    State(state): State<Arc<AppState>>,
) -> ApiResult<StatusCode> {
    let removed = state.students.update(|students| {
        let before = students.len();
        students.retain(|s| s.id != id);
        students.len() != before
    })?;
    if !removed {
        return Err(ApiError::NotFound);
    }
    Ok(StatusCode::NO_CONTENT)
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/students", get(list_students).post(create_student))
        .route(
            "/students/{id}",
            get(get_student).put(update_student).delete(delete_student),
        )
}
