use common::domain::LedgerSettings;
use common::postgres::{PostgresConfig, RetryPolicy};
use common::telemetry::TelemetryConfig;
use config::{Config, ConfigError, Environment};
use ingest_worker::{ConsumerConfig, DemoProducerConfig};
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServiceConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    // Ledger store
    #[serde(default = "default_postgres_host")]
    pub postgres_host: String,

    #[serde(default = "default_postgres_port")]
    pub postgres_port: u16,

    #[serde(default = "default_postgres_database")]
    pub postgres_database: String,

    #[serde(default = "default_postgres_username")]
    pub postgres_username: String,

    #[serde(default = "default_postgres_password")]
    pub postgres_password: String,

    #[serde(default = "default_max_pool_size")]
    pub postgres_max_pool_size: usize,

    // Queue store, with its own credentials and pool
    #[serde(default = "default_postgres_host")]
    pub queue_postgres_host: String,

    #[serde(default = "default_postgres_port")]
    pub queue_postgres_port: u16,

    #[serde(default = "default_postgres_database")]
    pub queue_postgres_database: String,

    #[serde(default = "default_postgres_username")]
    pub queue_postgres_username: String,

    #[serde(default = "default_postgres_password")]
    pub queue_postgres_password: String,

    #[serde(default = "default_max_pool_size")]
    pub queue_postgres_max_pool_size: usize,

    /// How long a caller waits for a pooled connection, in milliseconds
    #[serde(default = "default_pool_acquire_timeout_ms")]
    pub pool_acquire_timeout_ms: u64,

    // Consumer loop
    #[serde(default = "default_queue_name")]
    pub queue_name: String,

    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    #[serde(default = "default_visibility_timeout_secs")]
    pub visibility_timeout_secs: u64,

    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Multiplier for the poll interval after a failed queue read
    #[serde(default = "default_error_backoff_multiplier")]
    pub error_backoff_multiplier: u32,

    // Storage retries
    #[serde(default = "default_retry_max_attempts")]
    pub retry_max_attempts: u32,

    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,

    // Ledger identifiers
    #[serde(default = "default_event_definition_id")]
    pub event_definition_id: i64,

    #[serde(default = "default_new_tenant_definition_id")]
    pub new_tenant_definition_id: i64,

    #[serde(default = "default_meta_workspace_id")]
    pub meta_workspace_id: i64,

    // Demo producer
    #[serde(default)]
    pub demo_producer_enabled: bool,

    #[serde(default = "default_demo_producer_interval_secs")]
    pub demo_producer_interval_secs: u64,

    #[serde(default = "default_demo_tenant_external_id")]
    pub demo_tenant_external_id: String,

    // OpenTelemetry
    #[serde(default)]
    pub otel_enabled: bool,

    #[serde(default = "default_otel_endpoint")]
    pub otel_endpoint: String,

    #[serde(default = "default_otel_service_name")]
    pub otel_service_name: String,

    /// Time allowed for closers after shutdown starts
    #[serde(default = "default_shutdown_timeout_secs")]
    pub shutdown_timeout_secs: u64,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_postgres_host() -> String {
    "localhost".to_string()
}

fn default_postgres_port() -> u16 {
    5432
}

fn default_postgres_database() -> String {
    "trackline".to_string()
}

fn default_postgres_username() -> String {
    "trackline".to_string()
}

fn default_postgres_password() -> String {
    "trackline".to_string()
}

fn default_max_pool_size() -> usize {
    20
}

fn default_pool_acquire_timeout_ms() -> u64 {
    5_000
}

fn default_queue_name() -> String {
    "events".to_string()
}

fn default_batch_size() -> usize {
    10
}

fn default_visibility_timeout_secs() -> u64 {
    300
}

fn default_poll_interval_ms() -> u64 {
    1_000
}

fn default_error_backoff_multiplier() -> u32 {
    5
}

fn default_retry_max_attempts() -> u32 {
    3
}

fn default_retry_delay_ms() -> u64 {
    1_000
}

fn default_event_definition_id() -> i64 {
    67
}

fn default_new_tenant_definition_id() -> i64 {
    68
}

fn default_meta_workspace_id() -> i64 {
    1
}

fn default_demo_producer_interval_secs() -> u64 {
    5
}

fn default_demo_tenant_external_id() -> String {
    "demo-tenant".to_string()
}

fn default_otel_endpoint() -> String {
    "http://localhost:4317".to_string()
}

fn default_otel_service_name() -> String {
    "trackline".to_string()
}

fn default_shutdown_timeout_secs() -> u64 {
    10
}

impl ServiceConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let config: Self = Config::builder()
            .add_source(Environment::with_prefix("TRACKLINE"))
            .build()?
            .try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Rejects consumer settings that would stall the loop or spin it.
    /// A zero visibility timeout lets concurrent readers lease the same message.
    fn validate(&self) -> Result<(), ConfigError> {
        let zero_settings = [
            ("batch_size", self.batch_size == 0),
            ("visibility_timeout_secs", self.visibility_timeout_secs == 0),
            ("poll_interval_ms", self.poll_interval_ms == 0),
            ("error_backoff_multiplier", self.error_backoff_multiplier == 0),
        ];

        match zero_settings.iter().find(|(_, is_zero)| *is_zero) {
            Some((name, _)) => Err(ConfigError::Message(format!("{} must be at least 1", name))),
            None => Ok(()),
        }
    }

    pub fn ledger_postgres(&self) -> PostgresConfig {
        PostgresConfig {
            host: self.postgres_host.clone(),
            port: self.postgres_port,
            database: self.postgres_database.clone(),
            username: self.postgres_username.clone(),
            password: self.postgres_password.clone(),
            max_pool_size: self.postgres_max_pool_size,
            acquire_timeout_ms: self.pool_acquire_timeout_ms,
        }
    }

    pub fn queue_postgres(&self) -> PostgresConfig {
        PostgresConfig {
            host: self.queue_postgres_host.clone(),
            port: self.queue_postgres_port,
            database: self.queue_postgres_database.clone(),
            username: self.queue_postgres_username.clone(),
            password: self.queue_postgres_password.clone(),
            max_pool_size: self.queue_postgres_max_pool_size,
            acquire_timeout_ms: self.pool_acquire_timeout_ms,
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.retry_max_attempts,
            Duration::from_millis(self.retry_delay_ms),
        )
    }

    pub fn consumer(&self) -> ConsumerConfig {
        ConsumerConfig {
            queue_name: self.queue_name.clone(),
            batch_size: self.batch_size,
            visibility_timeout: Duration::from_secs(self.visibility_timeout_secs),
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            error_backoff_multiplier: self.error_backoff_multiplier,
        }
    }

    pub fn ledger(&self) -> LedgerSettings {
        LedgerSettings {
            event_definition_id: self.event_definition_id,
            new_tenant_definition_id: self.new_tenant_definition_id,
            meta_workspace_id: self.meta_workspace_id,
        }
    }

    pub fn demo_producer(&self) -> Option<DemoProducerConfig> {
        self.demo_producer_enabled.then(|| DemoProducerConfig {
            interval: Duration::from_secs(self.demo_producer_interval_secs),
            tenant_external_id: self.demo_tenant_external_id.clone(),
        })
    }

    pub fn telemetry(&self) -> TelemetryConfig {
        TelemetryConfig {
            service_name: self.otel_service_name.clone(),
            log_level: self.log_level.clone(),
            otel_enabled: self.otel_enabled,
            otel_endpoint: self.otel_endpoint.clone(),
        }
    }
}
