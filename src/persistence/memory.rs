//! In-memory telemetry sink

use crate::sim::telemetry::{TelemetryBatch, TelemetryError, TelemetryEvent, TelemetrySink};

/// A flushed session kept in memory
#[derive(Debug, Clone)]
pub struct StoredSession {
    pub drill_id: String,
    pub events: Vec<TelemetryEvent>,
}

/// Collects every flushed session; locators are `memory://<drill>/<index>`
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    sessions: Vec<StoredSession>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sessions(&self) -> &[StoredSession] {
        &self.sessions
    }
}

impl TelemetrySink for MemorySink {
    fn persist(&mut self, batch: &TelemetryBatch<'_>) -> Result<String, TelemetryError> {
        let locator = format!("memory://{}/{}", batch.drill_id, self.sessions.len());
        self.sessions.push(StoredSession {
            drill_id: batch.drill_id.to_string(),
            events: batch.events.to_vec(),
        });
        Ok(locator)
    }
}
