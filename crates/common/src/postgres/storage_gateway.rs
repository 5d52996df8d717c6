use crate::postgres::{with_retry, PostgresClient, RetryPolicy};
use anyhow::{Context, Result};
use tokio_postgres::types::ToSql;
use tokio_postgres::Row;
use tracing::{debug, instrument};

/// Stateless executor for parameterized ledger statements.
///
/// Every call checks out its own pooled connection and is its own unit of
/// work. Pool acquisition failures and statement failures are retried
/// together under the configured [`RetryPolicy`].
#[derive(Clone)]
pub struct StorageGateway {
    client: PostgresClient,
    retry: RetryPolicy,
}

impl StorageGateway {
    pub fn new(client: PostgresClient, retry: RetryPolicy) -> Self {
        Self { client, retry }
    }

    /// Executes a statement and returns all result rows
    #[instrument(skip(self, statement, params), fields(param_count = params.len()))]
    pub async fn execute(
        &self,
        statement: &str,
        params: &[&(dyn ToSql + Sync)],
    ) -> Result<Vec<Row>> {
        with_retry(&self.retry, "ledger statement", |attempt| async move {
            let conn = self.client.get_connection().await?;
            debug!(attempt, "executing ledger statement");
            conn.query(statement, params)
                .await
                .context("ledger statement failed")
        })
        .await
    }

    /// Executes a statement and returns its first row, if any
    pub async fn execute_one(
        &self,
        statement: &str,
        params: &[&(dyn ToSql + Sync)],
    ) -> Result<Option<Row>> {
        Ok(self.execute(statement, params).await?.into_iter().next())
    }
}
