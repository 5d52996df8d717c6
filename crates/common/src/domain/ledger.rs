use crate::domain::result::DomainResult;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Append-only ledger row
#[derive(Debug, Clone, PartialEq)]
pub struct LedgerRecord {
    /// Event-type schema the row is written under
    pub definition_id: i64,
    /// Workspace scope of the row
    pub project_id: i64,
    pub data: serde_json::Value,
    /// Original arrival time, distinct from the ledger insert time
    pub received_at: Option<DateTime<Utc>>,
}

/// Mapping from an external tenant identifier to an internal workspace
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkspaceBinding {
    pub tenant_external_id: String,
    pub workspace_id: Option<i64>,
}

impl WorkspaceBinding {
    /// Bound workspace id, ignoring null and zero ids
    pub fn usable_workspace_id(&self) -> Option<i64> {
        self.workspace_id.filter(|id| *id != 0)
    }
}

/// Fixed ledger identifiers used by the ingestion pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LedgerSettings {
    /// Definition id for externally sourced events
    pub event_definition_id: i64,
    /// Definition id for unregistered-tenant notices
    pub new_tenant_definition_id: i64,
    /// Reserved workspace for bookkeeping records
    pub meta_workspace_id: i64,
}

impl Default for LedgerSettings {
    fn default() -> Self {
        Self {
            event_definition_id: 67,
            new_tenant_definition_id: 68,
            meta_workspace_id: 1,
        }
    }
}

/// Ledger store operations used by the ingestion pipeline
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait LedgerRepository: Send + Sync {
    /// Look up the workspace bound to an external tenant. `None` when the tenant is unregistered.
    async fn find_workspace_binding(
        &self,
        tenant_external_id: &str,
    ) -> DomainResult<Option<WorkspaceBinding>>;

    /// Append a record and return its ledger id
    async fn append_record(&self, record: &LedgerRecord) -> DomainResult<i64>;
}
