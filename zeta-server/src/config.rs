//! Server configuration from the environment

use std::env;
use zeta_engine::DatabaseCreds;

/// Settings read from environment variables. `REDIS_URL` absent or empty
/// means the in-memory nonce store.
#[derive(Debug, Clone)]
pub struct Config {
    pub redis_url: Option<String>,
    pub database: DatabaseCreds,
}

impl Config {
    pub fn from_env() -> Self {
        Config {
            redis_url: env::var("REDIS_URL").ok().filter(|url| !url.is_empty()),
            database: DatabaseCreds {
                host: env::var("ZETA_DB_HOST").unwrap_or_else(|_| "localhost".to_string()),
                port: env::var("ZETA_DB_PORT")
                    .ok()
                    .and_then(|port| port.parse().ok())
                    .unwrap_or(5432),
                dbname: env::var("ZETA_DB_NAME").unwrap_or_else(|_| "zeta".to_string()),
                user: env::var("ZETA_DB_USER").unwrap_or_else(|_| "zeta".to_string()),
                password: env::var("ZETA_DB_PASSWORD").unwrap_or_default(),
            },
        }
    }
}
