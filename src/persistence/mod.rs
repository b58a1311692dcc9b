//! Telemetry persistence
//!
//! Sinks that receive a finished session's event ledger:
//! - `NdjsonSink`: one JSON object per line under a telemetry directory
//! - `MemorySink`: keeps sessions in memory (tests, dry runs)

pub mod memory;
pub mod ndjson;

pub use memory::{MemorySink, StoredSession};
pub use ndjson::NdjsonSink;
