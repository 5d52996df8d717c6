mod config;
mod init;
mod sink;

pub use config::*;
pub use init::*;
pub use sink::*;
