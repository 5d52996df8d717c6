mod event;
mod ledger;
mod queue;
mod result;

pub use event::*;
pub use ledger::*;
pub use queue::*;
pub use result::*;
