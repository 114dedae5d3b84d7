//! Destination store contract and the in-memory adapter.

mod base;
mod memory;

pub use base::*;
pub use memory::*;
