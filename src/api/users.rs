use std::sync::Arc;

use axum::{extract::State, routing::get, Json, Router};

use crate::{error::ApiResult, main_lib::AppState, models::UserProfile};

/// Bearer-protected listing of the stored users, password hashes excluded.
async fn list_users(State(state): State<Arc<AppState>>) -> ApiResult<Json<Vec<UserProfile>>> {
    let users = state.users.load()?;
    Ok(Json(users.iter().map(UserProfile::from).collect()))
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/users", get(list_users))
}
