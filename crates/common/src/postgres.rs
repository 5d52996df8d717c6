mod client;
mod config;
mod ledger_repository;
mod retry;
mod storage_gateway;

pub use client::*;
pub use config::*;
pub use ledger_repository::*;
pub use retry::*;
pub use storage_gateway::*;
