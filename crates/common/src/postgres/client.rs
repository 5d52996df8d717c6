use crate::postgres::PostgresConfig;
use anyhow::{Context, Result};
use deadpool_postgres::{
    Config, ManagerConfig, Pool, PoolConfig, RecyclingMethod, Runtime, Timeouts,
};
use std::time::Duration;
use tokio_postgres::NoTls;
use tracing::debug;

/// PostgreSQL client wrapper with connection pooling.
///
/// Connections are checked out per call and returned to the pool when the
/// handle is dropped, on success and on error alike.
#[derive(Clone)]
pub struct PostgresClient {
    pool: Pool,
}

impl PostgresClient {
    /// Creates a new PostgreSQL client with a bounded connection pool
    pub fn new(config: &PostgresConfig) -> Result<Self> {
        let mut cfg = Config::new();
        cfg.host = Some(config.host.clone());
        cfg.port = Some(config.port);
        cfg.dbname = Some(config.database.clone());
        cfg.user = Some(config.username.clone());
        cfg.password = Some(config.password.clone());
        cfg.manager = Some(ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        });
        let acquire_timeout = Duration::from_millis(config.acquire_timeout_ms);
        cfg.pool = Some(PoolConfig {
            max_size: config.max_pool_size,
            timeouts: Timeouts {
                wait: Some(acquire_timeout),
                create: Some(acquire_timeout),
                ..Default::default()
            },
            ..Default::default()
        });

        let pool = cfg
            .create_pool(Some(Runtime::Tokio1), NoTls)
            .context("failed to create postgres pool")?;

        debug!(
            host = %config.host,
            database = %config.database,
            max_pool_size = config.max_pool_size,
            "postgres pool created"
        );

        Ok(Self { pool })
    }

    /// Pings the database to verify connectivity
    pub async fn ping(&self) -> Result<()> {
        let client = self.get_connection().await?;
        client
            .execute("SELECT 1", &[])
            .await
            .context("postgres ping failed")?;
        debug!("postgres connection successful");
        Ok(())
    }

    /// Gets a connection from the pool
    pub async fn get_connection(&self) -> Result<deadpool_postgres::Client> {
        self.pool
            .get()
            .await
            .context("failed to acquire postgres connection")
    }

    /// Closes the pool; outstanding connections are dropped as they are returned
    pub fn close(&self) {
        self.pool.close();
    }
}
