use opentelemetry_sdk::{logs::LoggerProvider, trace::TracerProvider as SdkTracerProvider};

#[derive(Clone, Debug)]
pub struct TelemetryConfig {
    pub service_name: String,
    pub log_level: String,
    /// Export spans and logs over OTLP in addition to stdout
    pub otel_enabled: bool,
    pub otel_endpoint: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            service_name: "trackline".to_string(),
            log_level: "info".to_string(),
            otel_enabled: false,
            otel_endpoint: "http://localhost:4317".to_string(),
        }
    }
}

/// Exporter providers kept alive until shutdown so pending data is flushed
pub struct TelemetryProviders {
    pub tracer_provider: SdkTracerProvider,
    pub logger_provider: LoggerProvider,
}
