//! Report sinks
//!
//! - `CsvReport`: one tabular report, header first
//! - `StatusSink`: human-readable progress lines

mod csv;
mod status;

pub use csv::{escape_cell, CsvReport};
pub use status::{LogStatus, RecordingStatus, StatusSink};
