pub mod activity_log;
pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod events;
pub mod models;
pub mod store;
mod main_lib;

pub use main_lib::{build_state, init_tracing, AppState};
