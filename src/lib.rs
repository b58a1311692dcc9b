//! LapDrop - a timed two-instrument bead drop drill
//!
//! Core modules:
//! - `sim`: Deterministic drill simulation (entities, feeder, scoring, orchestration)
//! - `definition`: Drill definition files and validation
//! - `tuning`: Data-driven physics and scoring balance
//! - `persistence`: Telemetry sinks (NDJSON files, in-memory)
//! - `autopilot`: Seeded scripted input for headless runs

pub mod autopilot;
pub mod definition;
pub mod persistence;
pub mod sim;
pub mod tuning;

pub use definition::{DefinitionError, DrillDefinition};
pub use tuning::{Tuning, TuningError};

use glam::Vec2;

/// Simulation constants
pub mod consts {
    /// Fixed simulation timestep (60 Hz)
    pub const SIM_DT: f32 = 1.0 / 60.0;

    /// Workspace (circular port view) radius
    pub const WORKSPACE_RADIUS: f32 = 260.0;
    /// Beads may overshoot the workspace by this much before they count as lost
    pub const LOSS_MARGIN: f32 = 80.0;

    /// Instrument tip speed (units/s)
    pub const INSTRUMENT_SPEED: f32 = 260.0;
    /// Maximum tip-to-bead distance for a grasp (inclusive)
    pub const BEAD_GRASP_DISTANCE: f32 = 24.0;

    /// Downward acceleration applied to free beads (units/s²)
    pub const GRAVITY: f32 = 540.0;
    pub const BEAD_RADIUS: f32 = 8.0;

    /// Efficiency bonus weight applied at finalize
    pub const ECONOMY_WEIGHT: f32 = 250.0;
    /// Instrument travel budget per target drop
    pub const ECONOMY_BASELINE_PER_DROP: f32 = 120.0;

    /// Base award for every scored drop
    pub const DROP_SCORE: f32 = 100.0;

    /// Red flash after a tissue contact (seconds, rendering hint)
    pub const TISSUE_ALERT_DURATION: f32 = 0.3;

    /// Number of hand-controlled instruments
    pub const INSTRUMENT_COUNT: usize = 2;
}

/// Convert polar (r, theta) to cartesian (x, y)
#[inline]
pub fn polar_to_cartesian(r: f32, theta: f32) -> Vec2 {
    Vec2::new(r * theta.cos(), r * theta.sin())
}

/// Pull a point back onto the circle of radius `r` if it lies outside
#[inline]
pub fn clamp_to_radius(pos: Vec2, r: f32) -> Vec2 {
    if pos.length() > r {
        pos.normalize_or_zero() * r
    } else {
        pos
    }
}
