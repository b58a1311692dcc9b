//! Score, streak and grade bookkeeping

use serde::{Deserialize, Serialize};

use crate::consts::DROP_SCORE;

/// Letter grade, best first
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Grade {
    S,
    A,
    B,
    C,
    D,
}

impl Grade {
    /// Minimum score per grade, evaluated high to low
    pub const THRESHOLDS: [(f32, Grade); 4] =
        [(900.0, Grade::S), (750.0, Grade::A), (600.0, Grade::B), (450.0, Grade::C)];

    pub fn for_score(score: f32) -> Self {
        Self::THRESHOLDS
            .iter()
            .find(|(threshold, _)| score >= *threshold)
            .map(|&(_, grade)| grade)
            .unwrap_or(Grade::D)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Grade::S => "S",
            Grade::A => "A",
            Grade::B => "B",
            Grade::C => "C",
            Grade::D => "D",
        }
    }
}

impl std::fmt::Display for Grade {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Cumulative session score
///
/// `score` is not clamped and may go negative.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub drops: u32,
    pub misses: u32,
    pub tissue_contacts: u32,
    pub streak: u32,
    pub best_streak: u32,
    pub perfect_drops: u32,
    pub score: f32,
    /// Total instrument travel, refreshed every tick
    pub economy_distance: f32,
}

impl ScoreBreakdown {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_drop(&mut self, perfect_bonus: f32) {
        self.drops += 1;
        self.streak += 1;
        self.best_streak = self.best_streak.max(self.streak);
        self.score += DROP_SCORE + perfect_bonus;
        if perfect_bonus > 0.0 {
            self.perfect_drops += 1;
        }
    }

    pub fn register_miss(&mut self, penalty: f32) {
        self.misses += 1;
        self.streak = 0;
        self.score -= penalty;
    }

    pub fn register_tissue_contact(&mut self, penalty: f32) {
        self.tissue_contacts += 1;
        self.streak = 0;
        self.score -= penalty;
    }

    /// Apply the movement-economy bonus.
    ///
    /// Not idempotent: every call adds the bonus again. The session calls this
    /// exactly once, when it is consumed into a result.
    pub fn finalize(&mut self, economy_weight: f32, target_distance: f32) {
        if target_distance <= 0.0 {
            return;
        }
        let efficiency = (1.0 - self.economy_distance / target_distance).max(0.0);
        self.score += efficiency * economy_weight;
    }

    pub fn grade(&self) -> Grade {
        Grade::for_score(self.score)
    }
}
