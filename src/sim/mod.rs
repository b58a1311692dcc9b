//! Deterministic drill simulation
//!
//! All gameplay logic lives here. This module must stay pure:
//! - Caller-supplied timestep only
//! - Stable iteration order (definition order, then spawn order)
//! - No rendering, input device or file system dependencies

pub mod contact;
pub mod feeder;
pub mod geometry;
pub mod scoring;
pub mod snapshot;
pub mod state;
pub mod telemetry;
pub mod tick;

pub use contact::{ContactSource, ContactTracker};
pub use feeder::BeadFeeder;
pub use geometry::{Aabb, within_radius};
pub use scoring::{Grade, ScoreBreakdown};
pub use snapshot::DrillSnapshot;
pub use state::{
    Aperture, ApertureMotion, Bead, BeadId, BeadState, Instrument, InstrumentId, TissueZone,
};
pub use telemetry::{
    EventPayload, TelemetryBatch, TelemetryError, TelemetryEvent, TelemetryRecorder, TelemetrySink,
};
pub use tick::{Drill, DrillPhase, InstrumentInput, Session, SessionResult, TickInput, TickStatus};
