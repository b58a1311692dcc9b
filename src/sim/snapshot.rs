//! Read-only view of the drill for renderers
//!
//! Nothing in the simulation reads these back.

use glam::Vec2;
use serde::{Deserialize, Serialize};

use super::scoring::ScoreBreakdown;
use super::state::{BeadId, BeadState};
use super::telemetry::TelemetrySink;
use super::tick::{Drill, DrillPhase, Session, SessionResult};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstrumentView {
    pub name: String,
    pub tip: Vec2,
    pub color: u32,
    pub holding: Option<BeadId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BeadView {
    pub id: BeadId,
    pub pos: Vec2,
    pub radius: f32,
    pub state: BeadState,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApertureView {
    pub id: String,
    pub center: Vec2,
    pub radius: f32,
    pub moving: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TissueZoneView {
    pub id: String,
    pub center: Vec2,
    /// Full width/height
    pub size: Vec2,
}

/// Everything needed to draw one frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DrillSnapshot {
    pub phase: DrillPhase,
    pub drill_name: String,
    pub workspace_radius: f32,
    pub elapsed: f32,
    pub time_remaining: f32,
    pub target_drops: u32,
    pub score: ScoreBreakdown,
    /// Tissue contact flash, 0..=tissue_alert_duration
    pub alert_timer: f32,
    pub instruments: Vec<InstrumentView>,
    pub beads: Vec<BeadView>,
    pub apertures: Vec<ApertureView>,
    pub tissue_zones: Vec<TissueZoneView>,
    pub result: Option<SessionResult>,
}

impl Session {
    fn fill_snapshot(&self, snapshot: &mut DrillSnapshot) {
        snapshot.elapsed = self.elapsed;
        snapshot.time_remaining = (self.definition().duration_seconds - self.elapsed).max(0.0);
        snapshot.score = self.score.clone();
        snapshot.alert_timer = self.alert_timer;
        snapshot.instruments = self
            .instruments
            .iter()
            .map(|i| InstrumentView {
                name: i.name.clone(),
                tip: i.tip,
                color: i.color,
                holding: i.grasped,
            })
            .collect();
        snapshot.beads = self
            .beads
            .iter()
            .map(|b| BeadView {
                id: b.id,
                pos: b.pos,
                radius: b.radius,
                state: b.state,
            })
            .collect();
        snapshot.apertures = self
            .apertures
            .iter()
            .map(|a| ApertureView {
                id: a.id.clone(),
                center: a.center,
                radius: a.radius,
                moving: a.is_moving(),
            })
            .collect();
        snapshot.tissue_zones = self
            .tissue_zones
            .iter()
            .map(|z| TissueZoneView {
                id: z.id.clone(),
                center: z.bounds.center,
                size: z.bounds.size(),
            })
            .collect();
    }
}

impl<S: TelemetrySink> Drill<S> {
    pub fn snapshot(&self) -> DrillSnapshot {
        let definition = self.definition();
        let mut snapshot = DrillSnapshot {
            phase: self.phase(),
            drill_name: definition.name.clone(),
            workspace_radius: self.tuning().workspace_radius,
            elapsed: 0.0,
            time_remaining: definition.duration_seconds,
            target_drops: definition.target_drops,
            score: ScoreBreakdown::default(),
            alert_timer: 0.0,
            instruments: Vec::new(),
            beads: Vec::new(),
            apertures: Vec::new(),
            tissue_zones: Vec::new(),
            result: self.result().cloned(),
        };
        if let Some(session) = self.session() {
            session.fill_snapshot(&mut snapshot);
        }
        snapshot
    }
}
