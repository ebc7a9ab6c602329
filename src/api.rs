pub mod activity;
pub mod announcements;
pub mod events;
pub mod files;
pub mod grades;
pub mod students;
pub mod users;

use std::sync::Arc;

use axum::{middleware, routing::get, routing::post, Json, Router};
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use utoipa::OpenApi;

use crate::{
    auth,
    config::Config,
    main_lib::AppState,
    models::{NewStudent, Student, StudentUpdate},
};

#[utoipa::path(get, path = "/api/v1/healthz", responses((status = 200, description = "Health")))]
pub async fn healthz() -> &'static str {
    "ok"
}

#[utoipa::path(get, path = "/api/v1/readyz", responses((status = 200, description = "Ready")))]
pub async fn readyz() -> &'static str {
    "ok"
}

#[derive(OpenApi)]
#[openapi(
    paths(
        healthz,
        readyz,
        students::list_students,
        students::create_student,
        students::get_student,
        students::update_student,
        students::delete_student
    ),
    components(schemas(Student, NewStudent, StudentUpdate)),
    tags((name = "school-cms"))
)]
pub struct ApiDoc;

pub fn app_router(state: Arc<AppState>, config: &Config) -> Router {
    let cors = if config.cors_allow.iter().any(|o| o == "*") {
        CorsLayer::new().allow_origin(Any)
    } else {
        let origins = config
            .cors_allow
            .iter()
            .map(|o| o.parse().unwrap())
            .collect::<Vec<_>>();
        CorsLayer::new().allow_origin(origins)
    };

    let openapi = ApiDoc::openapi();

    let protected = users::router().route_layer(middleware::from_fn_with_state(
        state.clone(),
        auth::require_jwt,
    ));

    let api = Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/auth/login", post(auth::login))
        .route("/auth/status", get(auth::auth_status))
        .merge(students::router())
        .merge(grades::router())
        .merge(announcements::router())
        .merge(files::router())
        .merge(activity::router())
        .merge(events::router())
        .merge(protected);

    Router::new()
        .nest("/api/v1", api)
        .route("/openapi.json", get(|| async { Json(openapi) }))
        .with_state(state)
        .layer(cors)
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(TimeoutLayer::new(config.request_timeout))
        .layer(TraceLayer::new_for_http())
}
