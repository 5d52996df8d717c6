use crate::domain::result::{DomainError, DomainResult};
use crate::domain::QueuedEvent;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::time::Duration;

/// A message leased from a durable queue channel.
///
/// Metadata is owned by the queue store; consumers only read it.
#[derive(Debug, Clone, PartialEq)]
pub struct QueueMessage {
    /// Monotonic identifier assigned at enqueue time
    pub id: i64,
    /// Number of times the message has been read, including the current lease
    pub read_count: i32,
    pub enqueued_at: DateTime<Utc>,
    /// The message is hidden from other readers until this instant
    pub visible_at: DateTime<Utc>,
    pub payload: serde_json::Value,
}

impl QueueMessage {
    /// Decode the payload as a queued event envelope
    pub fn decode_event(&self) -> DomainResult<QueuedEvent> {
        serde_json::from_value(self.payload.clone()).map_err(|e| {
            DomainError::InvalidPayload(format!("message {}: {}", self.id, e))
        })
    }
}

/// Durable queue primitives over named channels.
///
/// Reads lease messages for a visibility timeout instead of removing them;
/// a message that is never archived or deleted becomes visible again once
/// its lease expires.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait MessageQueue: Send + Sync {
    /// Create the channel if it does not exist. Succeeds when it already exists.
    async fn ensure_queue(&self, queue_name: &str) -> DomainResult<()>;

    /// Durably append a payload and return the assigned message id
    async fn enqueue(&self, queue_name: &str, payload: &serde_json::Value) -> DomainResult<i64>;

    /// Lease up to `max_count` visible messages for `visibility_timeout`.
    /// Returns an empty batch when nothing is visible.
    async fn read(
        &self,
        queue_name: &str,
        visibility_timeout: Duration,
        max_count: usize,
    ) -> DomainResult<Vec<QueueMessage>>;

    /// Move a message to the channel archive. Archiving a missing or
    /// already archived message is not an error.
    async fn archive(&self, queue_name: &str, message_id: i64) -> DomainResult<()>;

    /// Permanently remove a message
    async fn delete(&self, queue_name: &str, message_id: i64) -> DomainResult<()>;
}
