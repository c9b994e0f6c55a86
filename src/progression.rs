//! Persistent distance rank
//!
//! Rank N+1 is reached by running more than `(N + 1) * RANK_DISTANCE` in a
//! single run. Saving is the host's job; this only tracks the number.

use serde::{Deserialize, Serialize};

use crate::consts::RANK_DISTANCE;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Progression {
    pub rank: u32,
}

impl Progression {
    pub fn new(rank: u32) -> Self {
        Self { rank }
    }

    /// Distance that unlocks the next rank
    pub fn next_target(&self) -> f32 {
        (self.rank + 1) as f32 * RANK_DISTANCE
    }

    /// Advance at most one rank for the distance run so far
    ///
    /// Returns the new rank when it changed.
    pub fn check(&mut self, total_distance: f32) -> Option<u32> {
        if total_distance > self.next_target() {
            self.rank += 1;
            log::info!("Reached rank {}", self.rank);
            Some(self.rank)
        } else {
            None
        }
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }

    pub fn from_json(json: &str) -> Option<Self> {
        serde_json::from_str(json).ok()
    }
}
