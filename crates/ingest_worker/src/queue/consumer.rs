use crate::domain::MessageProcessor;
use anyhow::Result;
use common::domain::{DomainResult, MessageQueue, QueueMessage};
use common::telemetry::{ReportContext, TelemetrySink};
use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone)]
pub struct ConsumerConfig {
    pub queue_name: String,
    /// Maximum number of messages leased per poll
    pub batch_size: usize,
    /// Lease duration for each read; unarchived messages reappear after it
    pub visibility_timeout: Duration,
    /// Pause between polls, whether or not the batch was empty
    pub poll_interval: Duration,
    /// Poll interval multiplier applied after a failed read
    pub error_backoff_multiplier: u32,
}

impl Default for ConsumerConfig {
    fn default() -> Self {
        Self {
            queue_name: "events".to_string(),
            batch_size: 10,
            visibility_timeout: Duration::from_secs(300),
            poll_interval: Duration::from_millis(1000),
            error_backoff_multiplier: 5,
        }
    }
}

/// Result of processing one batch.
/// Archived messages are done; retained ones are redelivered once their lease expires.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct BatchOutcome {
    pub archived: Vec<i64>,
    pub retained: Vec<(i64, String)>,
}

impl BatchOutcome {
    pub fn len(&self) -> usize {
        self.archived.len() + self.retained.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

enum MessageOutcome {
    Archived(i64),
    Retained(i64, String),
}

/// Polls a durable queue channel and dispatches each leased message to a processor
pub struct QueueConsumer {
    queue: Arc<dyn MessageQueue>,
    processor: Arc<dyn MessageProcessor>,
    telemetry: Arc<dyn TelemetrySink>,
    config: ConsumerConfig,
}

impl QueueConsumer {
    pub fn new(
        queue: Arc<dyn MessageQueue>,
        processor: Arc<dyn MessageProcessor>,
        telemetry: Arc<dyn TelemetrySink>,
        config: ConsumerConfig,
    ) -> Self {
        Self {
            queue,
            processor,
            telemetry,
            config,
        }
    }

    /// Ensure the channel exists. A failure here must stop startup.
    pub async fn initialize(&self) -> DomainResult<()> {
        self.queue.ensure_queue(&self.config.queue_name).await?;
        info!(queue = %self.config.queue_name, "consumer initialized");
        Ok(())
    }

    /// Poll until cancelled.
    ///
    /// A batch in progress always runs to completion; cancellation is only
    /// observed while waiting between polls. Read failures are reported and
    /// followed by a longer backoff, they never end the loop.
    pub async fn run(&self, ctx: CancellationToken) -> Result<()> {
        info!(
            queue = %self.config.queue_name,
            batch_size = self.config.batch_size,
            "starting consumer loop"
        );

        let error_backoff = self
            .config
            .poll_interval
            .saturating_mul(self.config.error_backoff_multiplier);

        loop {
            if ctx.is_cancelled() {
                break;
            }

            let delay = match self.poll_once().await {
                Ok(outcome) => {
                    if !outcome.is_empty() {
                        info!(
                            archived = outcome.archived.len(),
                            retained = outcome.retained.len(),
                            "batch processed"
                        );
                    }
                    self.config.poll_interval
                }
                Err(e) => {
                    error!(
                        error = %e,
                        backoff_ms = error_backoff.as_millis() as u64,
                        "error polling queue"
                    );
                    self.telemetry.report_exception(
                        &e.into(),
                        &ReportContext::new("consumer.poll")
                            .with("queue", &self.config.queue_name),
                    );
                    error_backoff
                }
            };

            tokio::select! {
                _ = ctx.cancelled() => break,
                _ = tokio::time::sleep(delay) => {}
            }
        }

        info!("consumer stopped gracefully");
        Ok(())
    }

    /// Read one batch and settle every message in it concurrently
    pub async fn poll_once(&self) -> DomainResult<BatchOutcome> {
        let messages = self
            .queue
            .read(
                &self.config.queue_name,
                self.config.visibility_timeout,
                self.config.batch_size,
            )
            .await?;

        if messages.is_empty() {
            debug!("no messages in batch");
            return Ok(BatchOutcome::default());
        }

        debug!(message_count = messages.len(), "received message batch");

        let results = join_all(messages.iter().map(|message| self.process_message(message))).await;

        let mut outcome = BatchOutcome::default();
        for result in results {
            match result {
                MessageOutcome::Archived(id) => outcome.archived.push(id),
                MessageOutcome::Retained(id, reason) => outcome.retained.push((id, reason)),
            }
        }
        Ok(outcome)
    }

    /// Process one message and archive it if it settled.
    /// Failed messages stay leased and reappear after the visibility timeout.
    async fn process_message(&self, message: &QueueMessage) -> MessageOutcome {
        match self.processor.process(message).await {
            Ok(resolution) => debug!(msg_id = message.id, ?resolution, "message settled"),
            Err(e) => {
                warn!(
                    msg_id = message.id,
                    read_count = message.read_count,
                    error = %e,
                    "message processing failed, leaving for redelivery"
                );
                return MessageOutcome::Retained(message.id, e.to_string());
            }
        }

        match self.queue.archive(&self.config.queue_name, message.id).await {
            Ok(()) => {
                debug!(msg_id = message.id, "message archived");
                MessageOutcome::Archived(message.id)
            }
            Err(e) => {
                error!(msg_id = message.id, error = %e, "failed to archive message");
                MessageOutcome::Retained(message.id, e.to_string())
            }
        }
    }
}
