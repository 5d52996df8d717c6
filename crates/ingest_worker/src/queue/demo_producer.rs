use crate::queue::EventPublisher;
use anyhow::Result;
use common::domain::{EventEnvelope, EventKind};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

pub struct DemoProducerConfig {
    /// Interval between published events
    pub interval: Duration,
    /// Tenant the synthetic events are attributed to
    pub tenant_external_id: String,
}

impl Default for DemoProducerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
            tenant_external_id: "demo-tenant".to_string(),
        }
    }
}

fn demo_event() -> EventEnvelope {
    let id = xid::new().to_string();
    EventEnvelope::new(
        EventKind::MessageCreate,
        json!({
            "id": id,
            "type": 0,
            "content": "demo message",
            "author": { "id": "demo-author", "username": "trackline" },
            "timestamp": chrono::Utc::now().to_rfc3339(),
        }),
    )
}

/// Publish a synthetic chat message at a fixed interval until cancelled.
///
/// Publish failures are logged and the loop keeps going.
pub async fn run_demo_producer(
    ctx: CancellationToken,
    config: DemoProducerConfig,
    publisher: Arc<dyn EventPublisher>,
) -> Result<()> {
    info!(
        interval_secs = config.interval.as_secs(),
        tenant_external_id = %config.tenant_external_id,
        "demo producer started"
    );

    loop {
        tokio::select! {
            _ = ctx.cancelled() => {
                info!("received shutdown signal, stopping demo producer");
                break;
            }
            _ = tokio::time::sleep(config.interval) => {
                match publisher
                    .publish(Some(config.tenant_external_id.clone()), demo_event())
                    .await
                {
                    Ok(msg_id) => debug!(msg_id, "published demo event"),
                    Err(e) => error!(error = %e, "failed to publish demo event"),
                }
            }
        }
    }

    info!("demo producer stopped gracefully");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::MockEventPublisher;
    use common::domain::DomainError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test(start_paused = true)]
    async fn test_demo_producer_publishes_each_interval_until_cancelled() {
        // Arrange
        let published = Arc::new(AtomicUsize::new(0));
        let counter = published.clone();
        let mut publisher = MockEventPublisher::new();
        publisher
            .expect_publish()
            .withf(|tenant, event| {
                tenant.as_deref() == Some("demo-tenant") && event.kind == EventKind::MessageCreate
            })
            .returning(move |_, _| {
                let n = counter.fetch_add(1, Ordering::SeqCst);
                if n == 1 {
                    Err(DomainError::RepositoryError(anyhow::anyhow!("down")))
                } else {
                    Ok(n as i64)
                }
            });
        let ctx = CancellationToken::new();

        // Act
        let handle = tokio::spawn(run_demo_producer(
            ctx.clone(),
            DemoProducerConfig::default(),
            Arc::new(publisher),
        ));
        tokio::time::sleep(Duration::from_secs(16)).await;
        ctx.cancel();
        let result = handle.await.unwrap();

        // Assert: ticks at 5s, 10s and 15s, one of which failed
        assert!(result.is_ok());
        assert_eq!(published.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_demo_event_is_a_default_chat_message() {
        let event = demo_event();

        assert_eq!(event.kind, EventKind::MessageCreate);
        assert_eq!(event.body["type"], 0);
        assert!(event.body["id"].as_str().is_some());
    }
}
