pub mod domain;
pub mod postgres;
pub mod queue;
pub mod telemetry;

// Re-export mocks when testing feature is enabled
#[cfg(any(test, feature = "testing"))]
pub use domain::MockLedgerRepository;
#[cfg(any(test, feature = "testing"))]
pub use domain::MockMessageQueue;
#[cfg(any(test, feature = "testing"))]
pub use telemetry::MockTelemetrySink;
