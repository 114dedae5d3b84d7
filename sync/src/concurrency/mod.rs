//! Coordination primitives shared across sync invocations.

pub mod run_control;
pub mod run_lock;
pub mod shutdown;
