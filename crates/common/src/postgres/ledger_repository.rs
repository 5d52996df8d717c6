use crate::domain::{DomainError, DomainResult, LedgerRecord, LedgerRepository, WorkspaceBinding};
use crate::postgres::StorageGateway;
use anyhow::Context;
use async_trait::async_trait;
use tracing::{debug, instrument};

/// Binding lookup, returning zero or one row with a `workspace_id` column
const WORKSPACE_BINDING_QUERY: &str = "SELECT workspace_id::bigint AS workspace_id
     FROM __retrievers.tenant_workspace_binding($1::text)";

const APPEND_RECORD_STATEMENT: &str = "INSERT INTO ledger.tracks (definition_id, project_id, data)
     VALUES ($1::bigint, $2::bigint, $3::jsonb)
     RETURNING id::bigint";

const APPEND_RECORD_WITH_RECEIVED_AT_STATEMENT: &str =
    "INSERT INTO ledger.tracks (definition_id, project_id, data, received_at)
     VALUES ($1::bigint, $2::bigint, $3::jsonb, $4::timestamptz)
     RETURNING id::bigint";

/// PostgreSQL implementation of LedgerRepository
#[derive(Clone)]
pub struct PostgresLedgerRepository {
    gateway: StorageGateway,
}

impl PostgresLedgerRepository {
    pub fn new(gateway: StorageGateway) -> Self {
        Self { gateway }
    }
}

#[async_trait]
impl LedgerRepository for PostgresLedgerRepository {
    #[instrument(skip(self))]
    async fn find_workspace_binding(
        &self,
        tenant_external_id: &str,
    ) -> DomainResult<Option<WorkspaceBinding>> {
        let Some(row) = self
            .gateway
            .execute_one(WORKSPACE_BINDING_QUERY, &[&tenant_external_id])
            .await?
        else {
            debug!(tenant_external_id, "no workspace binding found");
            return Ok(None);
        };

        let workspace_id: Option<i64> = row
            .try_get("workspace_id")
            .context("unexpected workspace binding row shape")
            .map_err(DomainError::RepositoryError)?;

        Ok(Some(WorkspaceBinding {
            tenant_external_id: tenant_external_id.to_string(),
            workspace_id,
        }))
    }

    #[instrument(
        skip(self, record),
        fields(definition_id = record.definition_id, project_id = record.project_id)
    )]
    async fn append_record(&self, record: &LedgerRecord) -> DomainResult<i64> {
        let row = match &record.received_at {
            Some(received_at) => {
                self.gateway
                    .execute_one(
                        APPEND_RECORD_WITH_RECEIVED_AT_STATEMENT,
                        &[
                            &record.definition_id,
                            &record.project_id,
                            &record.data,
                            received_at,
                        ],
                    )
                    .await?
            }
            None => {
                self.gateway
                    .execute_one(
                        APPEND_RECORD_STATEMENT,
                        &[&record.definition_id, &record.project_id, &record.data],
                    )
                    .await?
            }
        };

        let id: i64 = row
            .context("ledger insert returned no id")
            .and_then(|row| row.try_get(0).context("ledger insert id is not a bigint"))
            .map_err(DomainError::RepositoryError)?;

        debug!(ledger_id = id, "ledger record appended");
        Ok(id)
    }
}
