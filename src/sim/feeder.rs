//! Bead feeder
//!
//! Spawns beads on an interval that tightens linearly over the drill.

use glam::Vec2;
use serde::{Deserialize, Serialize};

use super::state::{Bead, BeadId};

/// Spawn timer with an interpolated interval
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BeadFeeder {
    pub interval_start: f32,
    pub interval_end: f32,
    /// Drill length the interpolation runs over
    pub duration: f32,
    pub elapsed: f32,
    pub time_since_spawn: f32,
}

impl BeadFeeder {
    pub fn new(interval_start: f32, interval_end: f32, duration: f32) -> Self {
        Self {
            interval_start,
            interval_end,
            duration,
            elapsed: 0.0,
            time_since_spawn: 0.0,
        }
    }

    pub fn update(&mut self, dt: f32) {
        self.elapsed += dt;
        self.time_since_spawn += dt;
    }

    /// Fraction of the drill elapsed, clamped to [0, 1] (0 for non-positive durations)
    pub fn progress(&self) -> f32 {
        if self.duration <= 0.0 {
            return 0.0;
        }
        (self.elapsed / self.duration).clamp(0.0, 1.0)
    }

    pub fn current_interval(&self) -> f32 {
        self.interval_start + (self.interval_end - self.interval_start) * self.progress()
    }

    pub fn should_spawn(&self) -> bool {
        self.time_since_spawn >= self.current_interval()
    }

    /// Reset the spawn timer and hand out a fresh bead at rest
    pub fn spawn(&mut self, id: BeadId, pos: Vec2, radius: f32) -> Bead {
        self.time_since_spawn = 0.0;
        Bead::new(id, pos, radius)
    }
}
