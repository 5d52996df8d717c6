use crate::domain::{DomainError, DomainResult, MessageQueue, QueueMessage};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::debug;

#[derive(Default)]
struct Channel {
    next_id: i64,
    active: BTreeMap<i64, QueueMessage>,
    archived: Vec<QueueMessage>,
}

struct State {
    channels: HashMap<String, Channel>,
    clock_offset: chrono::Duration,
}

impl Default for State {
    fn default() -> Self {
        Self {
            channels: HashMap::new(),
            clock_offset: chrono::Duration::zero(),
        }
    }
}

impl State {
    fn now(&self) -> DateTime<Utc> {
        Utc::now() + self.clock_offset
    }

    fn channel_mut(&mut self, queue_name: &str) -> DomainResult<&mut Channel> {
        self.channels
            .get_mut(queue_name)
            .ok_or_else(|| DomainError::QueueNotFound(queue_name.to_string()))
    }
}

/// In-process queue with the same lease semantics as the durable store.
///
/// Used by tests and local runs. The clock can be advanced to expire leases
/// without waiting.
#[derive(Default)]
pub struct InMemoryMessageQueue {
    state: Mutex<State>,
}

impl InMemoryMessageQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Messages not yet archived or deleted, in id order
    pub async fn active_messages(&self, queue_name: &str) -> Vec<QueueMessage> {
        let state = self.state.lock().await;
        state
            .channels
            .get(queue_name)
            .map(|channel| channel.active.values().cloned().collect())
            .unwrap_or_default()
    }

    pub async fn archived_messages(&self, queue_name: &str) -> Vec<QueueMessage> {
        let state = self.state.lock().await;
        state
            .channels
            .get(queue_name)
            .map(|channel| channel.archived.clone())
            .unwrap_or_default()
    }

    pub async fn channel_count(&self) -> usize {
        self.state.lock().await.channels.len()
    }

    /// Move the queue clock forward
    pub async fn advance(&self, by: chrono::Duration) {
        let mut state = self.state.lock().await;
        state.clock_offset += by;
    }

    pub async fn now(&self) -> DateTime<Utc> {
        self.state.lock().await.now()
    }
}

#[async_trait]
impl MessageQueue for InMemoryMessageQueue {
    async fn ensure_queue(&self, queue_name: &str) -> DomainResult<()> {
        let mut state = self.state.lock().await;
        state.channels.entry(queue_name.to_string()).or_default();
        Ok(())
    }

    async fn enqueue(&self, queue_name: &str, payload: &serde_json::Value) -> DomainResult<i64> {
        let mut state = self.state.lock().await;
        let now = state.now();
        let channel = state.channel_mut(queue_name)?;

        channel.next_id += 1;
        let id = channel.next_id;
        channel.active.insert(
            id,
            QueueMessage {
                id,
                read_count: 0,
                enqueued_at: now,
                visible_at: now,
                payload: payload.clone(),
            },
        );

        debug!(queue = %queue_name, msg_id = id, "message enqueued in memory");
        Ok(id)
    }

    async fn read(
        &self,
        queue_name: &str,
        visibility_timeout: Duration,
        max_count: usize,
    ) -> DomainResult<Vec<QueueMessage>> {
        let mut state = self.state.lock().await;
        let now = state.now();
        let lease = chrono::Duration::from_std(visibility_timeout)
            .map_err(|e| DomainError::ProcessingFailed(e.to_string()))?;
        let channel = state.channel_mut(queue_name)?;

        let leased = channel
            .active
            .values_mut()
            .filter(|message| message.visible_at <= now)
            .take(max_count)
            .map(|message| {
                message.read_count += 1;
                message.visible_at = now + lease;
                message.clone()
            })
            .collect();

        Ok(leased)
    }

    async fn archive(&self, queue_name: &str, message_id: i64) -> DomainResult<()> {
        let mut state = self.state.lock().await;
        let channel = state.channel_mut(queue_name)?;

        if let Some(message) = channel.active.remove(&message_id) {
            channel.archived.push(message);
        }
        Ok(())
    }

    async fn delete(&self, queue_name: &str, message_id: i64) -> DomainResult<()> {
        let mut state = self.state.lock().await;
        let channel = state.channel_mut(queue_name)?;
        channel.active.remove(&message_id);
        Ok(())
    }
}
