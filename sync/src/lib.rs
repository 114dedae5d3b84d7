pub mod checkpoint;
pub mod concurrency;
pub mod conversions;
pub mod destination;
pub mod engine;
pub mod error;
mod macros;
pub mod run_log;
pub mod scheduler;
pub mod source;
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
pub mod types;
