//! Drill definitions
//!
//! A drill is described by a JSON document. Parsing goes through raw serde
//! structs first; `DrillDefinition` is only produced after validation, so a
//! session can always be built from one without further checks.

use std::collections::HashMap;
use std::path::Path;

use glam::Vec2;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::sim::state::{Aperture, ApertureMotion, TissueZone};

/// Penalty applied when a bead leaves the workspace
pub const DEFAULT_MISSED_DROP_PENALTY: f32 = 8.0;
/// Penalty applied on each tissue contact
pub const DEFAULT_TISSUE_CONTACT_PENALTY: f32 = 5.0;
/// Bonus added to every scored drop
pub const DEFAULT_PERFECT_DROP_BONUS: f32 = 15.0;
/// Bonus multiplier for moving apertures
pub const DEFAULT_MOVING_TARGET_MULTIPLIER: f32 = 1.0;

/// Error type for loading and validating drill definitions
#[derive(Debug, Error)]
pub enum DefinitionError {
    #[error("failed to read drill definition: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid drill definition: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unsupported tissue shape '{shape}' for zone '{zone}' (only rectangle)")]
    UnsupportedShape { zone: String, shape: String },
    #[error("unsupported motion type '{kind}' for aperture '{aperture}'")]
    UnsupportedMotion { aperture: String, kind: String },
    #[error("aperture '{aperture}' is missing required key '{key}'")]
    MissingKey { aperture: String, key: &'static str },
    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: &'static str },
}

/// Spawn interval at the start and end of the drill (seconds)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpawnInterval {
    pub start: f32,
    pub end: f32,
}

/// Validated aperture description
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApertureSpec {
    pub id: String,
    pub radius: f32,
    /// Resting position (orbit apertures start at their orbit center)
    pub position: Vec2,
    pub motion: ApertureMotion,
}

impl ApertureSpec {
    pub fn build(&self) -> Aperture {
        Aperture::new(self.id.clone(), self.position, self.radius, self.motion)
    }
}

/// Validated tissue zone description
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TissueZoneSpec {
    pub id: String,
    pub center: Vec2,
    /// Full width/height
    pub size: Vec2,
    pub penalty: f32,
}

impl TissueZoneSpec {
    pub fn build(&self) -> TissueZone {
        TissueZone::new(self.id.clone(), self.center, self.size, self.penalty)
    }
}

/// A validated drill
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DrillDefinition {
    pub id: String,
    pub name: String,
    pub duration_seconds: f32,
    pub target_drops: u32,
    pub spawn_interval: SpawnInterval,
    pub apertures: Vec<ApertureSpec>,
    pub tissue_zones: Vec<TissueZoneSpec>,
    pub penalties: HashMap<String, f32>,
    pub bonuses: HashMap<String, f32>,
}

impl DrillDefinition {
    /// Load and validate a drill file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, DefinitionError> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&text)
    }

    /// Parse and validate a drill from JSON text
    pub fn from_json_str(text: &str) -> Result<Self, DefinitionError> {
        let raw: RawDrill = serde_json::from_str(text)?;
        raw.validate()
    }

    pub fn missed_drop_penalty(&self) -> f32 {
        self.penalties
            .get("missed_drop")
            .copied()
            .unwrap_or(DEFAULT_MISSED_DROP_PENALTY)
    }

    pub fn tissue_contact_penalty(&self) -> f32 {
        self.penalties
            .get("tissue_contact")
            .copied()
            .unwrap_or(DEFAULT_TISSUE_CONTACT_PENALTY)
    }

    pub fn perfect_drop_bonus(&self) -> f32 {
        self.bonuses
            .get("perfect_drop")
            .copied()
            .unwrap_or(DEFAULT_PERFECT_DROP_BONUS)
    }

    pub fn moving_target_multiplier(&self) -> f32 {
        self.bonuses
            .get("moving_target_multiplier")
            .copied()
            .unwrap_or(DEFAULT_MOVING_TARGET_MULTIPLIER)
    }
}

// === Raw file format ===

#[derive(Debug, Deserialize)]
struct RawDrill {
    id: String,
    name: String,
    duration_seconds: f32,
    target_drops: u32,
    spawn_interval: SpawnInterval,
    #[serde(default)]
    apertures: Vec<RawAperture>,
    #[serde(default)]
    tissue_zones: Vec<RawTissueZone>,
    #[serde(default)]
    penalties: HashMap<String, f32>,
    #[serde(default)]
    bonuses: HashMap<String, f32>,
}

#[derive(Debug, Deserialize)]
struct RawAperture {
    id: String,
    radius: f32,
    #[serde(default = "default_motion_type", rename = "type")]
    kind: String,
    position: Option<Vec2>,
    center: Option<Vec2>,
    path_radius: Option<f32>,
    angular_speed: Option<f32>,
    #[serde(default)]
    phase: f32,
}

#[derive(Debug, Deserialize)]
struct RawTissueZone {
    id: String,
    #[serde(default = "default_shape")]
    shape: String,
    center: Vec2,
    size: Vec2,
    penalty: f32,
}

fn default_motion_type() -> String {
    "static".to_string()
}

fn default_shape() -> String {
    "rectangle".to_string()
}

fn check(field: impl Into<String>, ok: bool, reason: &'static str) -> Result<(), DefinitionError> {
    if ok {
        Ok(())
    } else {
        Err(DefinitionError::InvalidValue {
            field: field.into(),
            reason,
        })
    }
}

fn finite(v: Vec2) -> bool {
    v.is_finite()
}

impl RawDrill {
    fn validate(self) -> Result<DrillDefinition, DefinitionError> {
        check(
            "duration_seconds",
            self.duration_seconds.is_finite() && self.duration_seconds >= 0.0,
            "must be a non-negative number",
        )?;
        check(
            "spawn_interval",
            self.spawn_interval.start.is_finite()
                && self.spawn_interval.end.is_finite()
                && self.spawn_interval.start >= 0.0
                && self.spawn_interval.end >= 0.0,
            "start and end must be non-negative numbers",
        )?;

        let apertures = self
            .apertures
            .into_iter()
            .map(RawAperture::validate)
            .collect::<Result<Vec<_>, _>>()?;
        let tissue_zones = self
            .tissue_zones
            .into_iter()
            .map(RawTissueZone::validate)
            .collect::<Result<Vec<_>, _>>()?;

        for (key, value) in self.penalties.iter().chain(self.bonuses.iter()) {
            check(key.as_str(), value.is_finite(), "must be a finite number")?;
        }

        Ok(DrillDefinition {
            id: self.id,
            name: self.name,
            duration_seconds: self.duration_seconds,
            target_drops: self.target_drops,
            spawn_interval: self.spawn_interval,
            apertures,
            tissue_zones,
            penalties: self.penalties,
            bonuses: self.bonuses,
        })
    }
}

impl RawAperture {
    fn validate(self) -> Result<ApertureSpec, DefinitionError> {
        let field = |name: &str| format!("aperture '{}' {}", self.id, name);
        check(
            field("radius"),
            self.radius.is_finite() && self.radius > 0.0,
            "must be positive",
        )?;

        let missing = |key: &'static str| DefinitionError::MissingKey {
            aperture: self.id.clone(),
            key,
        };

        let (position, motion) = match self.kind.as_str() {
            "static" => {
                let position = self.position.ok_or_else(|| missing("position"))?;
                check(field("position"), finite(position), "must be finite")?;
                (position, ApertureMotion::Static)
            }
            "orbit" => {
                let center = self.center.ok_or_else(|| missing("center"))?;
                let path_radius = self.path_radius.ok_or_else(|| missing("path_radius"))?;
                let angular_speed = self.angular_speed.ok_or_else(|| missing("angular_speed"))?;
                check(field("center"), finite(center), "must be finite")?;
                check(
                    field("path_radius"),
                    path_radius.is_finite() && path_radius >= 0.0,
                    "must be a non-negative number",
                )?;
                check(field("angular_speed"), angular_speed.is_finite(), "must be finite")?;
                check(field("phase"), self.phase.is_finite(), "must be finite")?;
                (
                    center,
                    ApertureMotion::Orbit {
                        center,
                        path_radius,
                        angular_speed,
                        phase: self.phase,
                    },
                )
            }
            other => {
                return Err(DefinitionError::UnsupportedMotion {
                    aperture: self.id.clone(),
                    kind: other.to_string(),
                });
            }
        };

        Ok(ApertureSpec {
            id: self.id,
            radius: self.radius,
            position,
            motion,
        })
    }
}

impl RawTissueZone {
    fn validate(self) -> Result<TissueZoneSpec, DefinitionError> {
        if self.shape != "rectangle" {
            return Err(DefinitionError::UnsupportedShape {
                zone: self.id,
                shape: self.shape,
            });
        }
        check(
            format!("tissue zone '{}' center", self.id),
            finite(self.center),
            "must be finite",
        )?;
        check(
            format!("tissue zone '{}' size", self.id),
            finite(self.size) && self.size.x >= 0.0 && self.size.y >= 0.0,
            "must be non-negative",
        )?;
        check(
            format!("tissue zone '{}' penalty", self.id),
            self.penalty.is_finite(),
            "must be finite",
        )?;

        Ok(TissueZoneSpec {
            id: self.id,
            center: self.center,
            size: self.size,
            penalty: self.penalty,
        })
    }
}
