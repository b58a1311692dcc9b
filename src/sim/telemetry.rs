//! Session telemetry ledger
//!
//! Events accumulate in memory for the whole session and are handed to a
//! `TelemetrySink` exactly once when the session ends.

use glam::Vec2;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::state::BeadId;

/// Event payloads, serialized as `"event": <kind>, "payload": {..}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "payload", rename_all = "snake_case")]
pub enum EventPayload {
    Spawn {
        position: Vec2,
    },
    Grasp {
        instrument: String,
        bead_position: Vec2,
    },
    Release {
        instrument: String,
    },
    Score {
        aperture: String,
        multiplier: f32,
        perfect_bonus: f32,
    },
    Miss {
        position: Vec2,
        penalty: f32,
    },
    TissueContact {
        zone: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        instrument: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        bead: Option<BeadId>,
        penalty: f32,
    },
    SessionEnd {
        score: f32,
        drops: u32,
        misses: u32,
        tissue_contacts: u32,
    },
}

impl EventPayload {
    pub fn kind(&self) -> &'static str {
        match self {
            EventPayload::Spawn { .. } => "spawn",
            EventPayload::Grasp { .. } => "grasp",
            EventPayload::Release { .. } => "release",
            EventPayload::Score { .. } => "score",
            EventPayload::Miss { .. } => "miss",
            EventPayload::TissueContact { .. } => "tissue_contact",
            EventPayload::SessionEnd { .. } => "session_end",
        }
    }
}

/// One timestamped telemetry record (timestamp is session time in seconds)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryEvent {
    pub timestamp: f32,
    #[serde(flatten)]
    pub payload: EventPayload,
}

impl TelemetryEvent {
    #[inline]
    pub fn kind(&self) -> &'static str {
        self.payload.kind()
    }
}

/// Ordered, append-only event ledger for one session
#[derive(Debug, Clone)]
pub struct TelemetryRecorder {
    drill_id: String,
    started_at: chrono::DateTime<chrono::Utc>,
    events: Vec<TelemetryEvent>,
}

impl TelemetryRecorder {
    pub fn new(drill_id: impl Into<String>) -> Self {
        Self {
            drill_id: drill_id.into(),
            started_at: chrono::Utc::now(),
            events: Vec::new(),
        }
    }

    pub fn record(&mut self, timestamp: f32, payload: EventPayload) {
        self.events.push(TelemetryEvent { timestamp, payload });
    }

    pub fn started_at(&self) -> chrono::DateTime<chrono::Utc> {
        self.started_at
    }

    pub fn events(&self) -> &[TelemetryEvent] {
        &self.events
    }

    /// Hand the ledger to `sink`, consuming the recorder
    pub fn flush<S: TelemetrySink + ?Sized>(self, sink: &mut S) -> Result<String, TelemetryError> {
        let batch = TelemetryBatch {
            drill_id: &self.drill_id,
            started_at: self.started_at,
            events: &self.events,
        };
        sink.persist(&batch)
    }
}

/// A finished session's events, as seen by a sink
#[derive(Debug, Clone, Copy)]
pub struct TelemetryBatch<'a> {
    pub drill_id: &'a str,
    pub started_at: chrono::DateTime<chrono::Utc>,
    pub events: &'a [TelemetryEvent],
}

/// Error type for telemetry persistence
#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serde error: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Storage port for finished sessions. Returns an opaque locator (e.g. a path).
pub trait TelemetrySink {
    fn persist(&mut self, batch: &TelemetryBatch<'_>) -> Result<String, TelemetryError>;
}

impl<S: TelemetrySink + ?Sized> TelemetrySink for Box<S> {
    fn persist(&mut self, batch: &TelemetryBatch<'_>) -> Result<String, TelemetryError> {
        (**self).persist(batch)
    }
}
