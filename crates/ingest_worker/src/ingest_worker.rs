use crate::domain::{IngestService, LedgerRecordBuilder, TenantResolver};
use crate::queue::{
    run_demo_producer, ConsumerConfig, DemoProducerConfig, EventProducer, EventPublisher,
    QueueConsumer,
};
use common::domain::{DomainResult, LedgerRepository, LedgerSettings, MessageQueue};
use common::telemetry::TelemetrySink;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;

pub type WorkerProcess = Box<
    dyn FnOnce(CancellationToken) -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send>>
        + Send,
>;

pub struct IngestWorkerConfig {
    pub consumer: ConsumerConfig,
    pub ledger: LedgerSettings,
    /// Runs the demo producer alongside the consumer when set
    pub demo_producer: Option<DemoProducerConfig>,
}

/// Event ingestion module: queue consumer, producer and optional demo producer
pub struct IngestWorker {
    consumer: QueueConsumer,
    producer: Arc<EventProducer>,
    demo_producer: Option<DemoProducerConfig>,
}

impl IngestWorker {
    pub fn new(
        repository: Arc<dyn LedgerRepository>,
        queue: Arc<dyn MessageQueue>,
        telemetry: Arc<dyn TelemetrySink>,
        config: IngestWorkerConfig,
    ) -> Self {
        info!(queue = %config.consumer.queue_name, "initializing ingest worker module");

        let records = LedgerRecordBuilder::new(config.ledger);
        let resolver = TenantResolver::new(repository.clone(), telemetry.clone(), records);
        let service = Arc::new(IngestService::new(resolver, repository, records));

        let producer = Arc::new(EventProducer::new(
            queue.clone(),
            config.consumer.queue_name.clone(),
        ));
        let consumer = QueueConsumer::new(queue, service, telemetry, config.consumer);

        Self {
            consumer,
            producer,
            demo_producer: config.demo_producer,
        }
    }

    /// Create the queue channel. Must succeed before any process starts.
    pub async fn initialize(&self) -> DomainResult<()> {
        self.consumer.initialize().await
    }

    pub fn consumer(&self) -> &QueueConsumer {
        &self.consumer
    }

    pub fn producer(&self) -> Arc<dyn EventPublisher> {
        self.producer.clone()
    }

    pub fn into_runner_processes(self) -> Vec<(&'static str, WorkerProcess)> {
        let mut processes: Vec<(&'static str, WorkerProcess)> = vec![(
            "queue_consumer",
            Box::new({
                let consumer = self.consumer;
                move |ctx| Box::pin(async move { consumer.run(ctx).await })
            }),
        )];

        if let Some(config) = self.demo_producer {
            let publisher: Arc<dyn EventPublisher> = self.producer;
            processes.push((
                "demo_producer",
                Box::new(move |ctx| Box::pin(run_demo_producer(ctx, config, publisher))),
            ));
        }

        processes
    }
}
