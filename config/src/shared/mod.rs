mod base;
mod replicator;
mod schedule;
mod table;

pub use base::*;
pub use replicator::*;
pub use schedule::*;
pub use table::*;
