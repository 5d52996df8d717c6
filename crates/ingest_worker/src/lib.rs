pub mod domain;
pub mod ingest_worker;
pub mod queue;

pub use domain::*;
pub use ingest_worker::*;
pub use queue::*;
