//! Newline-delimited JSON telemetry files

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::PathBuf;

use crate::sim::telemetry::{TelemetryBatch, TelemetryError, TelemetrySink};

/// Writes `telemetry_<drill>_<YYYYMMDD_HHMMSS>.ndjson` into `output_dir`
#[derive(Debug, Clone)]
pub struct NdjsonSink {
    output_dir: PathBuf,
}

impl NdjsonSink {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    /// File path a batch will be written to
    pub fn path_for(&self, batch: &TelemetryBatch<'_>) -> PathBuf {
        let stamp = batch.started_at.format("%Y%m%d_%H%M%S");
        self.output_dir
            .join(format!("telemetry_{}_{}.ndjson", batch.drill_id, stamp))
    }
}

impl TelemetrySink for NdjsonSink {
    fn persist(&mut self, batch: &TelemetryBatch<'_>) -> Result<String, TelemetryError> {
        fs::create_dir_all(&self.output_dir)?;
        let path = self.path_for(batch);

        let mut out = BufWriter::new(File::create(&path)?);
        for event in batch.events {
            serde_json::to_writer(&mut out, event)?;
            out.write_all(b"\n")?;
        }
        out.flush()?;

        log::info!(
            "Telemetry written: {} ({} events)",
            path.display(),
            batch.events.len()
        );
        Ok(path.display().to_string())
    }
}
