use std::path::PathBuf;
use std::sync::Arc;

use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

use crate::{
    activity_log::{attach_logger, ActivityLog},
    auth::{seed_demo_users, AuthManager},
    config::Config,
    events::EventBus,
    models::{Announcement, Grade, Student, User},
    store::JsonStore,
};

pub struct AppState {
    pub students: JsonStore<Student>,
    pub grades: JsonStore<Grade>,
    pub announcements: JsonStore<Announcement>,
    pub users: JsonStore<User>,
    pub uploads_dir: PathBuf,
    pub activity_log: Arc<ActivityLog>,
    pub event_bus: EventBus,
    pub auth: Option<Arc<AuthManager>>,
}

pub fn init_tracing() {
    let fmt_layer = fmt::layer().json().with_current_span(false);
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .init();
}

pub async fn build_state(config: &Config) -> anyhow::Result<Arc<AppState>> {
    std::fs::create_dir_all(&config.data_dir)?;
    tracing::info!("Data directory in use: {}", config.data_dir.display());

    let students = JsonStore::open(config.data_dir.join("students.json"))?;
    let grades = JsonStore::open(config.data_dir.join("grades.json"))?;
    let announcements = JsonStore::open(config.data_dir.join("announcements.json"))?;
    let users = JsonStore::open(config.data_dir.join("users.json"))?;
    seed_demo_users(&users)?;

    let uploads_dir = config.data_dir.join("uploads");
    std::fs::create_dir_all(&uploads_dir)?;

    let activity_log = Arc::new(ActivityLog::open(config.data_dir.join("activity.log"))?);

    let event_bus = EventBus::new();
    // The audit logger subscribes once here and is never removed.
    attach_logger(&event_bus, activity_log.clone());

    let auth = config
        .auth
        .as_ref()
        .map(AuthManager::new)
        .transpose()?
        .map(Arc::new);

    Ok(Arc::new(AppState {
        students,
        grades,
        announcements,
        users,
        uploads_dir,
        activity_log,
        event_bus,
        auth,
    }))
}
