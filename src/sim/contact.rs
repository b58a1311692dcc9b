//! Edge-triggered tissue contact tracking
//!
//! One "touching" flag per (zone, source) pair. A contact only counts on the
//! rising edge; the flag clears on exit so re-entry counts again.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use super::state::{BeadId, InstrumentId};

/// Something that can touch tissue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ContactSource {
    Instrument(InstrumentId),
    Bead(BeadId),
}

/// Set of (zone index, source) pairs currently in contact
#[derive(Debug, Clone, Default)]
pub struct ContactTracker {
    touching: HashSet<(usize, ContactSource)>,
}

impl ContactTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record this tick's containment; returns true only on a rising edge
    pub fn update(&mut self, zone: usize, source: ContactSource, touching: bool) -> bool {
        if touching {
            self.touching.insert((zone, source))
        } else {
            self.touching.remove(&(zone, source));
            false
        }
    }

    pub fn is_touching(&self, zone: usize, source: ContactSource) -> bool {
        self.touching.contains(&(zone, source))
    }

    /// Drop every flag held for `source` (bead left the active set)
    pub fn forget(&mut self, source: ContactSource) {
        self.touching.retain(|(_, s)| *s != source);
    }

    pub fn len(&self) -> usize {
        self.touching.len()
    }

    pub fn is_empty(&self) -> bool {
        self.touching.is_empty()
    }
}
