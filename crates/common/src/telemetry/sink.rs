use std::fmt;
use tracing::{error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportLevel {
    Info,
    Warning,
    Error,
}

impl fmt::Display for ReportLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReportLevel::Info => write!(f, "info"),
            ReportLevel::Warning => write!(f, "warning"),
            ReportLevel::Error => write!(f, "error"),
        }
    }
}

/// Structured context attached to a telemetry report
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReportContext {
    pub operation: String,
    pub fields: Vec<(String, String)>,
}

impl ReportContext {
    pub fn new(operation: impl Into<String>) -> Self {
        Self {
            operation: operation.into(),
            fields: Vec::new(),
        }
    }

    pub fn with(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.fields.push((key.into(), value.to_string()));
        self
    }

    pub fn field(&self, key: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

impl fmt::Display for ReportContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.operation)?;
        for (key, value) in &self.fields {
            write!(f, " {}={}", key, value)?;
        }
        Ok(())
    }
}

/// Out-of-band error reporting.
///
/// Implementations are best effort and must never fail back into the caller.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
pub trait TelemetrySink: Send + Sync {
    fn report_exception(&self, error: &anyhow::Error, context: &ReportContext);

    fn report_message(&self, message: &str, level: ReportLevel, context: &ReportContext);
}

/// Sink that forwards reports to the tracing pipeline, and from there to
/// the OTLP log exporter when it is enabled.
#[derive(Debug, Clone, Default)]
pub struct TracingTelemetrySink;

impl TracingTelemetrySink {
    pub fn new() -> Self {
        Self
    }
}

impl TelemetrySink for TracingTelemetrySink {
    fn report_exception(&self, err: &anyhow::Error, context: &ReportContext) {
        let detail = format!("{:#}", err);
        error!(
            report = "exception",
            operation = %context.operation,
            context = %context,
            error = %detail,
            "reported exception"
        );
    }

    fn report_message(&self, message: &str, level: ReportLevel, context: &ReportContext) {
        match level {
            ReportLevel::Info => info!(
                report = "message",
                operation = %context.operation,
                context = %context,
                "{}",
                message
            ),
            ReportLevel::Warning => warn!(
                report = "message",
                operation = %context.operation,
                context = %context,
                "{}",
                message
            ),
            ReportLevel::Error => error!(
                report = "message",
                operation = %context.operation,
                context = %context,
                "{}",
                message
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_display_lists_fields_in_order() {
        let context = ReportContext::new("consumer.poll")
            .with("queue", "events")
            .with("batch_size", 10);

        assert_eq!(context.to_string(), "consumer.poll queue=events batch_size=10");
        assert_eq!(context.field("batch_size"), Some("10"));
        assert_eq!(context.field("missing"), None);
    }

    #[test]
    fn test_tracing_sink_accepts_reports_without_subscriber() {
        let sink = TracingTelemetrySink::new();
        let context = ReportContext::new("test");

        sink.report_exception(&anyhow::anyhow!("boom"), &context);
        sink.report_message("hello", ReportLevel::Warning, &context);
    }
}
