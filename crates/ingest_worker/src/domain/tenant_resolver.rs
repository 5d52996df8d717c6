use crate::domain::LedgerRecordBuilder;
use chrono::Utc;
use common::domain::{DomainResult, EventKind, LedgerRepository};
use common::telemetry::{ReportContext, ReportLevel, TelemetrySink};
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};

/// Outcome of attributing an event to a workspace
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// The handler ran to completion for the bound workspace
    Handled { workspace_id: i64 },
    /// The event carried no tenant identifier and was dropped
    NoTenant,
    /// The tenant has no binding. A notice was written to the meta workspace
    /// when `notice_id` is set; a failed notice write is reported only.
    Unregistered { notice_id: Option<i64> },
    /// The binding exists but its workspace id is null or zero
    MissingWorkspace,
    /// The lookup or the handler failed. The failure has been reported.
    Failed(String),
}

impl Resolution {
    /// Whether the event reached a final outcome. Only failures are worth redelivering.
    pub fn is_settled(&self) -> bool {
        !matches!(self, Resolution::Failed(_))
    }
}

/// Maps external tenant identifiers to workspaces and runs work in their scope.
///
/// Never returns an error: every failure is logged, reported to the
/// telemetry sink, and surfaced as [`Resolution::Failed`].
pub struct TenantResolver {
    repository: Arc<dyn LedgerRepository>,
    telemetry: Arc<dyn TelemetrySink>,
    records: LedgerRecordBuilder,
}

impl TenantResolver {
    pub fn new(
        repository: Arc<dyn LedgerRepository>,
        telemetry: Arc<dyn TelemetrySink>,
        records: LedgerRecordBuilder,
    ) -> Self {
        Self {
            repository,
            telemetry,
            records,
        }
    }

    /// Resolve `tenant_external_id` and invoke `handler` with the bound workspace id.
    ///
    /// `event` is the serialized envelope, nested into the unregistered-tenant
    /// notice when no binding exists.
    #[instrument(skip(self, event, handler), fields(event_type = %kind))]
    pub async fn with_resolved_workspace<F, Fut>(
        &self,
        tenant_external_id: Option<&str>,
        kind: EventKind,
        event: &serde_json::Value,
        handler: F,
    ) -> Resolution
    where
        F: FnOnce(i64) -> Fut,
        Fut: Future<Output = DomainResult<()>>,
    {
        let Some(tenant) = tenant_external_id.map(str::trim).filter(|id| !id.is_empty()) else {
            info!("event has no tenant identifier, dropping");
            return Resolution::NoTenant;
        };

        let context = ReportContext::new("tenant_resolver.with_resolved_workspace")
            .with("tenant_external_id", tenant)
            .with("event_type", kind);

        let binding = match self.repository.find_workspace_binding(tenant).await {
            Ok(binding) => binding,
            Err(e) => {
                error!(tenant_external_id = %tenant, error = %e, "workspace lookup failed");
                let reason = e.to_string();
                self.telemetry.report_exception(&e.into(), &context);
                return Resolution::Failed(reason);
            }
        };

        let Some(binding) = binding else {
            let notice_id = self.record_unregistered_tenant(tenant, event).await;
            return Resolution::Unregistered { notice_id };
        };

        let Some(workspace_id) = binding.usable_workspace_id() else {
            warn!(
                tenant_external_id = %tenant,
                workspace_id = ?binding.workspace_id,
                "workspace binding has no usable workspace id"
            );
            self.telemetry.report_message(
                "workspace binding has no usable workspace id",
                ReportLevel::Warning,
                &context,
            );
            return Resolution::MissingWorkspace;
        };

        debug!(tenant_external_id = %tenant, workspace_id, "tenant resolved");

        match handler(workspace_id).await {
            Ok(()) => Resolution::Handled { workspace_id },
            Err(e) => {
                error!(
                    tenant_external_id = %tenant,
                    workspace_id,
                    error = %e,
                    "event handler failed"
                );
                let reason = e.to_string();
                self.telemetry
                    .report_exception(&e.into(), &context.with("workspace_id", workspace_id));
                Resolution::Failed(reason)
            }
        }
    }

    /// Write a notice for a tenant without a workspace binding to the meta
    /// workspace. Returns the ledger id, or `None` when the write failed; the
    /// failure is reported and not retried.
    #[instrument(skip(self, event))]
    pub async fn record_unregistered_tenant(
        &self,
        tenant_external_id: &str,
        event: &serde_json::Value,
    ) -> Option<i64> {
        let record = self
            .records
            .new_tenant_notice(tenant_external_id, event, Utc::now());

        match self.repository.append_record(&record).await {
            Ok(notice_id) => {
                info!(
                    tenant_external_id,
                    notice_id,
                    meta_workspace_id = record.project_id,
                    "recorded unregistered tenant"
                );
                Some(notice_id)
            }
            Err(e) => {
                error!(tenant_external_id, error = %e, "failed to record unregistered tenant");
                self.telemetry.report_exception(
                    &e.into(),
                    &ReportContext::new("tenant_resolver.record_unregistered_tenant")
                        .with("tenant_external_id", tenant_external_id),
                );
                None
            }
        }
    }
}
