//! Data-driven physics and scoring balance
//!
//! Defaults come from `consts`; a JSON file may override any subset.

use std::path::Path;

use glam::Vec2;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::consts::*;

/// Error type for loading tuning overrides
#[derive(Debug, Error)]
pub enum TuningError {
    #[error("failed to read tuning file: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid tuning file: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid tuning value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: &'static str },
}

/// Simulation balance shared by every drill
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Tuning {
    pub workspace_radius: f32,
    /// Overshoot allowed past the workspace before a bead is lost
    pub loss_margin: f32,
    pub instrument_speed: f32,
    pub grasp_distance: f32,
    pub gravity: f32,
    pub bead_radius: f32,
    /// Where the feeder drops new beads
    pub spawn_point: Vec2,
    pub economy_weight: f32,
    pub economy_baseline_per_drop: f32,
    pub tissue_alert_duration: f32,
}

impl Default for Tuning {
    fn default() -> Self {
        Self {
            workspace_radius: WORKSPACE_RADIUS,
            loss_margin: LOSS_MARGIN,
            instrument_speed: INSTRUMENT_SPEED,
            grasp_distance: BEAD_GRASP_DISTANCE,
            gravity: GRAVITY,
            bead_radius: BEAD_RADIUS,
            spawn_point: Vec2::new(0.0, -WORKSPACE_RADIUS + 30.0),
            economy_weight: ECONOMY_WEIGHT,
            economy_baseline_per_drop: ECONOMY_BASELINE_PER_DROP,
            tissue_alert_duration: TISSUE_ALERT_DURATION,
        }
    }
}

impl Tuning {
    pub fn from_json_str(text: &str) -> Result<Self, TuningError> {
        let tuning: Self = serde_json::from_str(text)?;
        tuning.validate()?;
        Ok(tuning)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, TuningError> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&text)
    }

    /// Every value must be finite; distances, rates and weights non-negative
    pub fn validate(&self) -> Result<(), TuningError> {
        let non_negative = [
            ("loss_margin", self.loss_margin),
            ("instrument_speed", self.instrument_speed),
            ("grasp_distance", self.grasp_distance),
            ("gravity", self.gravity),
            ("economy_weight", self.economy_weight),
            ("tissue_alert_duration", self.tissue_alert_duration),
        ];
        for (field, value) in non_negative {
            check(field, value.is_finite() && value >= 0.0, "must be a finite, non-negative number")?;
        }

        let positive = [
            ("workspace_radius", self.workspace_radius),
            ("bead_radius", self.bead_radius),
            ("economy_baseline_per_drop", self.economy_baseline_per_drop),
        ];
        for (field, value) in positive {
            check(field, value.is_finite() && value > 0.0, "must be a finite, positive number")?;
        }

        check("spawn_point", self.spawn_point.is_finite(), "must be finite")?;
        check(
            "spawn_point",
            self.spawn_point.length() <= self.workspace_radius,
            "must lie inside the workspace",
        )
    }

    /// Distance from the workspace center past which a free bead is lost
    #[inline]
    pub fn loss_radius(&self) -> f32 {
        self.workspace_radius + self.loss_margin
    }

    /// Travel budget for the economy bonus
    #[inline]
    pub fn economy_target_distance(&self, target_drops: u32) -> f32 {
        target_drops as f32 * self.economy_baseline_per_drop
    }
}

fn check(field: &'static str, ok: bool, reason: &'static str) -> Result<(), TuningError> {
    if ok {
        Ok(())
    } else {
        Err(TuningError::InvalidValue { field, reason })
    }
}
