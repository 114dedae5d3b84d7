//! Durable replication progress, one checkpoint per destination table.

mod base;
mod fs;
mod memory;

pub use base::*;
pub use fs::*;
pub use memory::*;
