use async_trait::async_trait;
use chrono::Utc;
use common::domain::{DomainResult, EventEnvelope, MessageQueue, QueuedEvent};
use std::sync::Arc;
use tracing::{debug, instrument};

/// Entry point for inbound events
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Stamp the event with its arrival time and enqueue it. Returns the queue message id.
    async fn publish(
        &self,
        tenant_external_id: Option<String>,
        event: EventEnvelope,
    ) -> DomainResult<i64>;
}

/// Enqueues inbound events on the durable queue channel
pub struct EventProducer {
    queue: Arc<dyn MessageQueue>,
    queue_name: String,
}

impl EventProducer {
    pub fn new(queue: Arc<dyn MessageQueue>, queue_name: String) -> Self {
        Self { queue, queue_name }
    }
}

#[async_trait]
impl EventPublisher for EventProducer {
    #[instrument(skip(self, event), fields(event_type = %event.kind))]
    async fn publish(
        &self,
        tenant_external_id: Option<String>,
        event: EventEnvelope,
    ) -> DomainResult<i64> {
        let queued = QueuedEvent {
            tenant_external_id,
            event,
            received_at: Some(Utc::now()),
        };
        let payload = serde_json::to_value(&queued)?;

        let message_id = self.queue.enqueue(&self.queue_name, &payload).await?;

        debug!(
            queue = %self.queue_name,
            msg_id = message_id,
            "event enqueued"
        );
        Ok(message_id)
    }
}
