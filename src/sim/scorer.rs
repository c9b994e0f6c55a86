//! Segment scoring
//!
//! Turns what happened on a segment into a single feedback value for the
//! bandit. Two strategies exist; a session uses exactly one.

use serde::{Deserialize, Serialize};

use super::emotion::{Emotion, EmotionBuffer};
use crate::consts::STARTING_LIVES;
use crate::logistic;

/// Directional presses per segment pair that scores best
const TARGET_KEY_PRESSES: u32 = 4;
/// Score lost per press away from the target
const KEY_PRESS_PENALTY: f32 = 0.25;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScoringStrategy {
    /// Facial valence and engagement
    Affect,
    /// Key activity, coin collection and survival
    Behavioral,
}

/// What the host reports about the player at a boundary
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SegmentReport {
    /// Coins the passed segment was furnished with
    pub coins_spawned: u32,
    /// Player's running coin total
    pub coins_total: u32,
    /// Player's current life count
    pub lives: u32,
}

/// Per-session scorer state
#[derive(Debug, Clone)]
pub struct SegmentScorer {
    strategy: ScoringStrategy,
    /// Presses during the previous segment and the current one
    key_presses: [u32; 2],
    tripped: bool,
    segment_start_coins: u32,
    previous_coin_ratio: f32,
    previous_lives: u32,
}

impl SegmentScorer {
    pub fn new(strategy: ScoringStrategy) -> Self {
        Self {
            strategy,
            key_presses: [0; 2],
            tripped: false,
            segment_start_coins: 0,
            previous_coin_ratio: 1.0,
            previous_lives: STARTING_LIVES,
        }
    }

    pub fn strategy(&self) -> ScoringStrategy {
        self.strategy
    }

    /// Reset the carried state for a new run
    pub fn begin_run(&mut self, coins_total: u32, lives: u32) {
        self.key_presses = [0; 2];
        self.tripped = false;
        self.segment_start_coins = coins_total;
        self.previous_coin_ratio = 1.0;
        self.previous_lives = lives;
    }

    pub fn record_key_press(&mut self) {
        self.key_presses[1] += 1;
    }

    /// Flag the current segment as having ended in a death
    pub fn mark_tripped(&mut self) {
        self.tripped = true;
    }

    pub fn previous_coin_ratio(&self) -> f32 {
        self.previous_coin_ratio
    }

    /// Score the segment just passed and roll per-segment counters over
    pub fn score_segment(&mut self, emotions: &mut EmotionBuffer, report: SegmentReport) -> f32 {
        let score = match self.strategy {
            ScoringStrategy::Affect => affect_score(emotions),
            ScoringStrategy::Behavioral => self.behavioral_score(report),
        };
        emotions.clear();
        self.segment_start_coins = report.coins_total;
        self.key_presses = [self.key_presses[1], 0];
        self.tripped = false;
        score
    }

    fn behavioral_score(&mut self, report: SegmentReport) -> f32 {
        let presses = self.key_presses[0] + self.key_presses[1];
        let key_score = if self.tripped {
            0.0
        } else {
            (1.0 - presses.abs_diff(TARGET_KEY_PRESSES) as f32 * KEY_PRESS_PENALTY).clamp(0.0, 1.0)
        };

        let coin_score = if report.coins_spawned == 0 {
            0.0
        } else {
            let collected = report.coins_total.saturating_sub(self.segment_start_coins);
            let ratio = collected as f32 / report.coins_spawned as f32;
            let smoothed = (ratio + self.previous_coin_ratio) / 2.0;
            self.previous_coin_ratio = ratio;
            smoothed
        };

        let survived_score = if report.lives < self.previous_lives { 0.0 } else { 1.0 };
        self.previous_lives = report.lives;

        let total = (key_score + coin_score + survived_score) / 3.0;
        log::debug!(
            "Behavioral score {total:.3} (keys {key_score:.2}, coins {coin_score:.2}, survived {survived_score})"
        );
        total
    }
}

/// Logistic of the rescaled valence + engagement means
pub fn affect_score(emotions: &EmotionBuffer) -> f32 {
    // Both channels map into [0, 100]; engagement's native floor is 0, so it centres at 50
    let valence = (emotions.mean(Emotion::Valence) + 100.0) / 2.0;
    let engagement = (emotions.mean(Emotion::Engagement) + 100.0) / 2.0;
    logistic((valence + engagement - 100.0) * 0.1)
}
