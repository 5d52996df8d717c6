mod config;

use crate::config::ServiceConfig;
use common::postgres::{PostgresClient, PostgresLedgerRepository, StorageGateway};
use common::queue::PgmqQueue;
use common::telemetry::{init_telemetry, shutdown_telemetry, TracingTelemetrySink};
use ingest_worker::{IngestWorker, IngestWorkerConfig};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use trackline_runner::Runner;

#[tokio::main]
async fn main() {
    let config = match ServiceConfig::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    let telemetry_providers = match init_telemetry(&config.telemetry()) {
        Ok(providers) => providers,
        Err(e) => {
            eprintln!("Failed to initialize telemetry: {:#}", e);
            std::process::exit(1);
        }
    };

    info!(
        queue = %config.queue_name,
        ledger_host = %config.postgres_host,
        queue_host = %config.queue_postgres_host,
        otel_enabled = config.otel_enabled,
        demo_producer_enabled = config.demo_producer_enabled,
        "Starting trackline service"
    );

    // The ledger and the queue use separate credentials and separate pools
    let (ledger_client, queue_client) = match create_clients(&config) {
        Ok(clients) => clients,
        Err(e) => {
            error!(error = %format!("{:#}", e), "Failed to create postgres clients");
            shutdown_telemetry(telemetry_providers);
            std::process::exit(1);
        }
    };

    // Ledger outages are retried per message, so an unreachable ledger only warns
    if let Err(e) = ledger_client.ping().await {
        warn!(error = %format!("{:#}", e), "Ledger database is not reachable yet");
    }

    let repository = Arc::new(PostgresLedgerRepository::new(StorageGateway::new(
        ledger_client.clone(),
        config.retry_policy(),
    )));
    let queue = Arc::new(PgmqQueue::new(queue_client.clone()));

    let ingest_worker = IngestWorker::new(
        repository,
        queue,
        Arc::new(TracingTelemetrySink::new()),
        IngestWorkerConfig {
            consumer: config.consumer(),
            ledger: config.ledger(),
            demo_producer: config.demo_producer(),
        },
    );

    if let Err(e) = ingest_worker.initialize().await {
        error!(error = %e, "Failed to initialize queue, refusing to start");
        shutdown_telemetry(telemetry_providers);
        std::process::exit(1);
    }

    let mut runner = Runner::new();
    for (name, process) in ingest_worker.into_runner_processes() {
        runner = runner.with_named_process(name, process);
    }

    runner
        .with_closer("postgres_pools", move || async move {
            ledger_client.close();
            queue_client.close();
            info!("Postgres pools closed");
            Ok(())
        })
        .with_closer("telemetry", move || async move {
            shutdown_telemetry(telemetry_providers);
            Ok(())
        })
        .with_closer_timeout(Duration::from_secs(config.shutdown_timeout_secs))
        .run_and_exit()
        .await;
}

fn create_clients(config: &ServiceConfig) -> anyhow::Result<(PostgresClient, PostgresClient)> {
    let ledger = PostgresClient::new(&config.ledger_postgres())?;
    let queue = PostgresClient::new(&config.queue_postgres())?;
    Ok((ledger, queue))
}
