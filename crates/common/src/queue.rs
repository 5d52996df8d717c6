mod in_memory;
mod pgmq;

pub use in_memory::*;
pub use pgmq::*;
