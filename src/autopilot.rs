//! Scripted input for headless runs and demos
//!
//! Each instrument chases the nearest free bead, grasps it and carries it to
//! the nearest aperture. A seeded RNG adds a little hand tremor so runs with
//! different seeds differ while staying reproducible.

use glam::Vec2;
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;

use crate::consts::INSTRUMENT_COUNT;
use crate::sim::{BeadState, Instrument, InstrumentInput, Session, TickInput};

/// Max tremor angle applied to the steering direction (radians)
const TREMOR: f32 = 0.35;
/// Close enough to the target to stop steering
const ARRIVE_DISTANCE: f32 = 3.0;

#[derive(Debug, Clone)]
pub struct Autopilot {
    rng: Pcg32,
}

impl Autopilot {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: Pcg32::seed_from_u64(seed),
        }
    }

    /// Produce this tick's input for a running session
    pub fn input(&mut self, session: &Session) -> TickInput {
        let mut input = TickInput::default();
        for index in 0..INSTRUMENT_COUNT {
            input.instruments[index] = self.steer(session, &session.instruments[index]);
        }
        input
    }

    fn steer(&mut self, session: &Session, instrument: &Instrument) -> InstrumentInput {
        let tip = instrument.tip;

        let (target, toggle_grasp) = if instrument.grasped.is_some() {
            let Some(aperture) = session.apertures.iter().min_by(|a, b| {
                a.center
                    .distance(tip)
                    .total_cmp(&b.center.distance(tip))
            }) else {
                return InstrumentInput::default();
            };
            // Let go once the bead would land inside the aperture
            let release = tip.distance(aperture.center) < aperture.radius * 0.5;
            (aperture.center, release)
        } else {
            let Some(bead) = session
                .beads
                .iter()
                .filter(|b| b.state == BeadState::Falling)
                .min_by(|a, b| a.pos.distance(tip).total_cmp(&b.pos.distance(tip)))
            else {
                return InstrumentInput::default();
            };
            let reach = bead.pos.distance(tip) <= session.tuning().grasp_distance;
            // Lead the bead slightly along its fall
            (bead.pos + bead.vel * 0.1, reach)
        };

        InstrumentInput {
            direction: self.handle_direction(instrument, target - tip),
            toggle_grasp,
        }
    }

    /// Convert a desired tip motion into a handle push, with tremor
    fn handle_direction(&mut self, instrument: &Instrument, delta: Vec2) -> Vec2 {
        if delta.length() < ARRIVE_DISTANCE {
            return Vec2::ZERO;
        }
        let wobble = self.rng.random_range(-TREMOR..=TREMOR);
        let mut direction = Vec2::from_angle(wobble).rotate(delta.normalize_or_zero());
        if instrument.fulcrum_inverted {
            direction.x = -direction.x;
        }
        direction
    }
}
