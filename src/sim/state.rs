//! Drill entities and their per-tick behaviour
//!
//! Instruments, beads, apertures and tissue zones. The orchestrator in
//! `tick` owns every collection; entities only refer to each other through
//! `BeadId` / `InstrumentId` handles.

use glam::Vec2;
use serde::{Deserialize, Serialize};

use super::geometry::{Aabb, within_radius};
use crate::consts::*;
use crate::{clamp_to_radius, polar_to_cartesian};

/// Stable per-session bead handle (never reused within a session)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BeadId(pub u32);

/// Index of an instrument in the session's instrument list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InstrumentId(pub usize);

/// Bead lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BeadState {
    /// Just created, not yet stepped
    Spawned,
    /// Free fall under gravity
    Falling,
    /// Held by an instrument; position tracks the tip
    Grasped,
    /// Released this tick; becomes `Falling` on the next physics step
    Dropped,
    /// Landed in an aperture (terminal)
    Scored,
    /// Left the workspace (terminal)
    Lost,
}

impl BeadState {
    /// Beads an instrument may pick up or an aperture may capture
    #[inline]
    pub fn is_free(self) -> bool {
        matches!(self, BeadState::Spawned | BeadState::Falling)
    }

    #[inline]
    pub fn is_terminal(self) -> bool {
        matches!(self, BeadState::Scored | BeadState::Lost)
    }

    /// Whether `self -> next` is an edge of the bead lifecycle graph
    pub fn can_transition_to(self, next: BeadState) -> bool {
        use BeadState::*;
        match (self, next) {
            (a, b) if a == b => !a.is_terminal(),
            (Spawned, Falling | Grasped | Scored | Lost) => true,
            (Falling, Grasped | Scored | Lost) => true,
            (Grasped, Dropped) => true,
            (Dropped, Falling | Scored | Lost) => true,
            _ => false,
        }
    }
}

/// A bead entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bead {
    pub id: BeadId,
    pub pos: Vec2,
    pub vel: Vec2,
    pub radius: f32,
    pub state: BeadState,
    /// Back-reference to the grasping instrument (position sync only)
    pub holder: Option<InstrumentId>,
}

impl Bead {
    pub fn new(id: BeadId, pos: Vec2, radius: f32) -> Self {
        Self {
            id,
            pos,
            vel: Vec2::ZERO,
            radius,
            state: BeadState::Spawned,
            holder: None,
        }
    }

    /// Advance one physics step.
    ///
    /// `holder_tip` is the tip of the grasping instrument, if any. Free beads
    /// fall and are marked `Lost` once they are further than `loss_radius`
    /// from the workspace center.
    pub fn update(&mut self, dt: f32, gravity: f32, loss_radius: f32, holder_tip: Option<Vec2>) {
        match self.state {
            BeadState::Grasped => {
                if let Some(tip) = holder_tip {
                    self.pos = tip;
                }
                self.vel = Vec2::ZERO;
            }
            BeadState::Spawned | BeadState::Falling | BeadState::Dropped => {
                self.state = BeadState::Falling;
                self.vel.y += gravity * dt;
                self.pos += self.vel * dt;
                if self.pos.length() > loss_radius {
                    self.state = BeadState::Lost;
                }
            }
            BeadState::Scored | BeadState::Lost => {}
        }
    }
}

/// A hand-controlled instrument pivoting around the port
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Instrument {
    pub name: String,
    pub tip: Vec2,
    /// Display colour (0xRRGGBB)
    pub color: u32,
    /// Pushing the handle right moves the tip left
    pub fulcrum_inverted: bool,
    /// Bead currently held (exclusive)
    pub grasped: Option<BeadId>,
    /// Cumulative tip travel
    pub path_length: f32,
}

impl Instrument {
    pub fn new(name: impl Into<String>, tip: Vec2, color: u32, fulcrum_inverted: bool) -> Self {
        Self {
            name: name.into(),
            tip,
            color,
            fulcrum_inverted,
            grasped: None,
            path_length: 0.0,
        }
    }

    /// The default left/right rig
    pub fn default_pair() -> [Instrument; INSTRUMENT_COUNT] {
        [
            Instrument::new("Left", Vec2::new(-120.0, 80.0), 0xF4F7FF, true),
            Instrument::new("Right", Vec2::new(120.0, 80.0), 0xC8E7FF, true),
        ]
    }

    /// Move the tip by a directional intent and accumulate travelled distance
    pub fn update(&mut self, intent: Vec2, dt: f32, bounds_radius: f32, speed: f32) {
        let mut direction = intent;
        if self.fulcrum_inverted {
            direction.x = -direction.x;
        }

        let previous = self.tip;
        let direction = direction.normalize_or_zero();
        self.tip = clamp_to_radius(self.tip + direction * speed * dt, bounds_radius);
        self.path_length += (self.tip - previous).length();
    }
}

/// How an aperture moves
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ApertureMotion {
    Static,
    /// Circular path around `center`
    Orbit {
        center: Vec2,
        path_radius: f32,
        /// Radians per second
        angular_speed: f32,
        phase: f32,
    },
}

/// A scoring target
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Aperture {
    pub id: String,
    pub center: Vec2,
    pub radius: f32,
    pub motion: ApertureMotion,
    /// Accumulated orbit angle (excluding phase)
    angle: f32,
}

impl Aperture {
    /// Create an aperture; orbiting apertures are placed on their path immediately
    pub fn new(id: impl Into<String>, center: Vec2, radius: f32, motion: ApertureMotion) -> Self {
        let mut aperture = Self {
            id: id.into(),
            center,
            radius,
            motion,
            angle: 0.0,
        };
        aperture.update(0.0);
        aperture
    }

    #[inline]
    pub fn is_moving(&self) -> bool {
        !matches!(self.motion, ApertureMotion::Static)
    }

    pub fn update(&mut self, dt: f32) {
        if let ApertureMotion::Orbit {
            center,
            path_radius,
            angular_speed,
            phase,
        } = self.motion
        {
            self.angle += angular_speed * dt;
            self.center = center + polar_to_cartesian(path_radius, self.angle + phase);
        }
    }

    #[inline]
    pub fn contains(&self, point: Vec2) -> bool {
        within_radius(point, self.center, self.radius)
    }
}

/// A rectangular forbidden region
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TissueZone {
    pub id: String,
    pub bounds: Aabb,
    /// Per-zone penalty from the definition (the drill-wide penalty is what gets applied)
    pub penalty: f32,
}

impl TissueZone {
    pub fn new(id: impl Into<String>, center: Vec2, size: Vec2, penalty: f32) -> Self {
        Self {
            id: id.into(),
            bounds: Aabb::from_size(center, size),
            penalty,
        }
    }

    #[inline]
    pub fn contains(&self, point: Vec2) -> bool {
        self.bounds.contains(point)
    }
}
