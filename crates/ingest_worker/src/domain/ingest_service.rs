use crate::domain::{LedgerRecordBuilder, Resolution, TenantResolver};
use async_trait::async_trait;
use chrono::Utc;
use common::domain::{DomainError, DomainResult, LedgerRepository, QueueMessage};
use std::sync::Arc;
use tracing::{debug, info, instrument};

/// Processes one dequeued message to a final outcome.
///
/// `Ok` means the message is settled and may be archived. `Err` means it
/// must stay in the queue for redelivery.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait MessageProcessor: Send + Sync {
    async fn process(&self, message: &QueueMessage) -> DomainResult<Resolution>;
}

/// Decodes queued events, resolves their tenant and appends them to the ledger
pub struct IngestService {
    resolver: TenantResolver,
    repository: Arc<dyn LedgerRepository>,
    records: LedgerRecordBuilder,
}

impl IngestService {
    pub fn new(
        resolver: TenantResolver,
        repository: Arc<dyn LedgerRepository>,
        records: LedgerRecordBuilder,
    ) -> Self {
        Self {
            resolver,
            repository,
            records,
        }
    }
}

#[async_trait]
impl MessageProcessor for IngestService {
    #[instrument(skip(self, message), fields(msg_id = message.id, read_count = message.read_count))]
    async fn process(&self, message: &QueueMessage) -> DomainResult<Resolution> {
        let decoded = message.decode_event()?;
        let queued = &decoded;
        let envelope = serde_json::to_value(&queued.event)?;

        debug!(event_type = %queued.event.kind, "processing queued event");

        let resolution = self
            .resolver
            .with_resolved_workspace(
                queued.tenant(),
                queued.event.kind,
                &envelope,
                |workspace_id| async move {
                    let record = self
                        .records
                        .event_record(workspace_id, message, queued, Utc::now());
                    let ledger_id = self.repository.append_record(&record).await?;
                    info!(
                        ledger_id,
                        workspace_id,
                        event_type = %queued.event.kind,
                        "event saved"
                    );
                    Ok(())
                },
            )
            .await;

        match resolution {
            Resolution::Failed(reason) => Err(DomainError::ProcessingFailed(reason)),
            settled => Ok(settled),
        }
    }
}
