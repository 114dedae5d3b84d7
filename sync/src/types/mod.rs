//! Common types used throughout the sync pipeline.
//!
//! Row and cell values, table schemas, watermarks, and run tracking records.

mod cell;
mod row;
mod run;
mod schema;
mod watermark;

pub use cell::*;
pub use row::*;
pub use run::*;
pub use schema::*;
pub use watermark::*;
