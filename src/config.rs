use std::{net::SocketAddr, path::PathBuf, time::Duration};

use crate::auth::{decode_secret_key, AuthConfig};

pub struct Config {
    pub listen_addr: SocketAddr,
    pub data_dir: PathBuf,
    pub cors_allow: Vec<String>,
    pub request_timeout: Duration,
    pub static_dir: String,
    pub auth: Option<AuthConfig>,
}

impl Config {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        let listen_addr: SocketAddr = std::env::var("SCMS_LISTEN_ADDR")
            .unwrap_or_else(|_| "0.0.0.0:8080".to_string())
            .parse()
            .expect("Invalid SCMS_LISTEN_ADDR");
        let data_dir = PathBuf::from(std::env::var("SCMS_DATA_DIR").unwrap_or_else(|_| "./data".into()));
        let cors_allow = std::env::var("SCMS_CORS_ALLOW_ORIGINS")
            .unwrap_or_else(|_| "*".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        let timeout_ms: u64 = std::env::var("SCMS_REQUEST_TIMEOUT_MS")
            .unwrap_or_else(|_| "30000".into())
            .parse()
            .unwrap_or(30000);
        let static_dir = std::env::var("SCMS_STATIC_DIR").unwrap_or_else(|_| "dist".into());
        let token_ttl_secs: u64 = std::env::var("SCMS_TOKEN_TTL_SECS")
            .unwrap_or_else(|_| "3600".into())
            .parse()
            .unwrap_or(3600);
        let auth = std::env::var("SCMS_JWT_SECRET").ok().map(|raw| AuthConfig {
            jwt_secret: decode_secret_key(&raw).expect("Invalid SCMS_JWT_SECRET"),
            access_token_ttl: Duration::from_secs(token_ttl_secs),
        });
        Self {
            listen_addr,
            data_dir,
            cors_allow,
            request_timeout: Duration::from_millis(timeout_ms),
            static_dir,
            auth,
        }
    }
}
