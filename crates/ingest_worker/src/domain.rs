mod ingest_service;
mod record_builder;
mod tenant_resolver;

pub use ingest_service::*;
pub use record_builder::*;
pub use tenant_resolver::*;
