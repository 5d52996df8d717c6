use crate::domain::{DomainError, DomainResult, MessageQueue, QueueMessage};
use crate::postgres::PostgresClient;
use anyhow::Context;
use async_trait::async_trait;
use std::time::Duration;
use tokio_postgres::error::SqlState;
use tracing::{debug, info, instrument};

/// Durable queue backed by the pgmq PostgreSQL extension.
///
/// Uses its own connection pool, separate from the ledger store.
#[derive(Clone)]
pub struct PgmqQueue {
    client: PostgresClient,
}

impl PgmqQueue {
    pub fn new(client: PostgresClient) -> Self {
        Self { client }
    }

    async fn connection(&self) -> DomainResult<deadpool_postgres::Client> {
        self.client
            .get_connection()
            .await
            .map_err(DomainError::RepositoryError)
    }
}

fn is_already_exists(error: &tokio_postgres::Error) -> bool {
    match error.as_db_error() {
        Some(db_error) => {
            *db_error.code() == SqlState::DUPLICATE_TABLE
                || *db_error.code() == SqlState::DUPLICATE_OBJECT
                || db_error.message().contains("already exists")
        }
        None => error.to_string().contains("already exists"),
    }
}

fn clamp_to_i32<T: TryInto<i32>>(value: T) -> i32 {
    value.try_into().unwrap_or(i32::MAX)
}

#[async_trait]
impl MessageQueue for PgmqQueue {
    #[instrument(skip(self))]
    async fn ensure_queue(&self, queue_name: &str) -> DomainResult<()> {
        let conn = self.client.get_connection().await.map_err(|e| {
            DomainError::QueueInitialization(queue_name.to_string(), format!("{:#}", e))
        })?;

        match conn.execute("SELECT pgmq.create($1)", &[&queue_name]).await {
            Ok(_) => {
                info!(queue = %queue_name, "queue initialized");
                Ok(())
            }
            Err(e) if is_already_exists(&e) => {
                debug!(queue = %queue_name, "queue already exists");
                Ok(())
            }
            Err(e) => Err(DomainError::QueueInitialization(
                queue_name.to_string(),
                e.to_string(),
            )),
        }
    }

    #[instrument(skip(self, payload))]
    async fn enqueue(&self, queue_name: &str, payload: &serde_json::Value) -> DomainResult<i64> {
        let conn = self.connection().await?;

        let row = conn
            .query_one("SELECT pgmq.send($1, $2::jsonb)", &[&queue_name, payload])
            .await
            .context("failed to enqueue message")?;

        let message_id: i64 = row.try_get(0).context("pgmq.send returned no id")?;

        debug!(queue = %queue_name, msg_id = message_id, "message enqueued");
        Ok(message_id)
    }

    #[instrument(skip(self))]
    async fn read(
        &self,
        queue_name: &str,
        visibility_timeout: Duration,
        max_count: usize,
    ) -> DomainResult<Vec<QueueMessage>> {
        let conn = self.connection().await?;

        let vt_secs = clamp_to_i32(visibility_timeout.as_secs());
        let qty = clamp_to_i32(max_count);

        let rows = conn
            .query(
                "SELECT msg_id, read_ct, enqueued_at, vt, message FROM pgmq.read($1, $2, $3)",
                &[&queue_name, &vt_secs, &qty],
            )
            .await
            .context("failed to read messages")?;

        let messages = rows
            .iter()
            .map(|row| -> anyhow::Result<QueueMessage> {
                Ok(QueueMessage {
                    id: row.try_get("msg_id")?,
                    read_count: row.try_get("read_ct")?,
                    enqueued_at: row.try_get("enqueued_at")?,
                    visible_at: row.try_get("vt")?,
                    payload: row
                        .try_get::<_, Option<serde_json::Value>>("message")?
                        .unwrap_or(serde_json::Value::Null),
                })
            })
            .collect::<anyhow::Result<Vec<_>>>()
            .context("unexpected pgmq.read row shape")?;

        debug!(queue = %queue_name, count = messages.len(), "messages read");
        Ok(messages)
    }

    #[instrument(skip(self))]
    async fn archive(&self, queue_name: &str, message_id: i64) -> DomainResult<()> {
        let conn = self.connection().await?;

        let row = conn
            .query_one(
                "SELECT pgmq.archive($1::text, $2::bigint)",
                &[&queue_name, &message_id],
            )
            .await
            .context("failed to archive message")?;

        let archived: bool = row.try_get(0).unwrap_or(false);
        if archived {
            debug!(queue = %queue_name, msg_id = message_id, "message archived");
        } else {
            debug!(
                queue = %queue_name,
                msg_id = message_id,
                "message already archived or missing"
            );
        }
        Ok(())
    }

    #[instrument(skip(self))]
    async fn delete(&self, queue_name: &str, message_id: i64) -> DomainResult<()> {
        let conn = self.connection().await?;

        let row = conn
            .query_one(
                "SELECT pgmq.delete($1::text, $2::bigint)",
                &[&queue_name, &message_id],
            )
            .await
            .context("failed to delete message")?;

        let deleted: bool = row.try_get(0).unwrap_or(false);
        debug!(queue = %queue_name, msg_id = message_id, deleted, "message delete requested");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamp_to_i32_saturates() {
        assert_eq!(clamp_to_i32(300u64), 300);
        assert_eq!(clamp_to_i32(u64::MAX), i32::MAX);
        assert_eq!(clamp_to_i32(10usize), 10);
    }
}
