use serde::{Deserialize, Serialize};

/// PostgreSQL connection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostgresConfig {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub username: String,
    pub password: String,
    pub max_pool_size: usize,
    /// How long a caller waits for a free pooled connection before failing
    pub acquire_timeout_ms: u64,
}

impl Default for PostgresConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5432,
            database: "trackline".to_string(),
            username: "trackline".to_string(),
            password: "trackline".to_string(),
            max_pool_size: 20,
            acquire_timeout_ms: 5_000,
        }
    }
}
