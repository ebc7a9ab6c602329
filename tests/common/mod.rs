use std::path::Path;
use std::time::Duration;

use school_cms_server::auth::AuthConfig;
use school_cms_server::config::Config;

pub fn test_config(data_dir: &Path) -> Config {
    Config {
        listen_addr: "127.0.0.1:0".parse().unwrap(),
        data_dir: data_dir.to_path_buf(),
        cors_allow: vec!["*".to_string()],
        request_timeout: Duration::from_secs(30),
        static_dir: "dist".to_string(),
        auth: None,
    }
}

#[allow(dead_code)]
pub fn test_config_with_auth(data_dir: &Path) -> Config {
    let mut config = test_config(data_dir);
    config.auth = Some(AuthConfig {
        jwt_secret: b"0123456789abcdef0123456789abcdef".to_vec(),
        access_token_ttl: Duration::from_secs(3600),
    });
    config
}
