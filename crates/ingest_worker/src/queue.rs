mod consumer;
mod demo_producer;
mod producer;

pub use consumer::*;
pub use demo_producer::*;
pub use producer::*;
