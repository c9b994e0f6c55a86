//! UCB1 segment selector
//!
//! Each transition `previous -> candidate` is an arm. `explore[p][c]` counts
//! how often that transition has been scored; `exploit[p][c]` is the running
//! mean of its scores. The next segment maximises
//!
//! ```text
//! exploit[p][c] + sqrt(2) * sqrt(ln(total_p) / (explore[p][c] + EPS))
//! ```
//!
//! with unvisited transitions always tried first.

use rand::Rng;
use rand_pcg::Pcg32;

use super::pool::VariantChooser;

/// Keeps the UCB terms finite when counts are zero
const EPS: f32 = f32::EPSILON;

/// Outcomes ignored at the start of each run
pub const WARMUP_SEGMENTS: u32 = 3;

/// Statistics behind one steady-phase choice
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Choice {
    pub previous: usize,
    /// Variant actually streamed in
    pub variant: usize,
    /// Variant the UCB rule picked (differs from `variant` when not adaptive)
    pub ucb_variant: usize,
    pub best_score: f32,
    pub exploit: f32,
    pub explore: f32,
    /// Picked because the transition had never been scored
    pub forced: bool,
}

#[derive(Debug, Clone)]
pub struct BanditSelector {
    variant_count: usize,
    explore: Vec<u32>,
    exploit: Vec<f32>,
    /// Segments spawned before the UCB rule takes over
    bootstrap_len: usize,
    adaptive: bool,
    spawned: usize,
    outcomes_seen: u32,
    choices: Vec<Choice>,
}

impl BanditSelector {
    pub fn new(variant_count: usize, bootstrap_len: usize, adaptive: bool) -> Self {
        Self {
            variant_count,
            explore: vec![0; variant_count * variant_count],
            exploit: vec![0.0; variant_count * variant_count],
            bootstrap_len,
            adaptive,
            spawned: 0,
            outcomes_seen: 0,
            choices: Vec::new(),
        }
    }

    pub fn variant_count(&self) -> usize {
        self.variant_count
    }

    pub fn is_adaptive(&self) -> bool {
        self.adaptive
    }

    /// Start a new run: bootstrap and warm-up begin again, tables are kept
    pub fn begin_run(&mut self) {
        self.spawned = 0;
        self.outcomes_seen = 0;
        self.choices.clear();
    }

    /// Wipe the learned tables
    pub fn reset_tables(&mut self) {
        self.explore.fill(0);
        self.exploit.fill(0.0);
    }

    #[inline]
    fn cell(&self, previous: usize, candidate: usize) -> usize {
        previous * self.variant_count + candidate
    }

    pub fn explore_count(&self, previous: usize, candidate: usize) -> u32 {
        self.explore[self.cell(previous, candidate)]
    }

    pub fn exploit_score(&self, previous: usize, candidate: usize) -> f32 {
        self.exploit[self.cell(previous, candidate)]
    }

    pub fn in_bootstrap(&self) -> bool {
        self.spawned < self.bootstrap_len
    }

    pub fn outcomes_seen(&self) -> u32 {
        self.outcomes_seen
    }

    /// Drain the statistics of choices made since the last call
    pub fn take_choices(&mut self) -> Vec<Choice> {
        std::mem::take(&mut self.choices)
    }

    /// Pick the variant to spawn after `previous`
    pub fn choose(&mut self, previous: Option<usize>, rng: &mut Pcg32) -> usize {
        let n = self.variant_count;
        let bootstrap = self.in_bootstrap();
        self.spawned += 1;

        let previous = match previous {
            Some(p) if !bootstrap && p < n => p,
            _ => return rng.random_range(0..n),
        };

        let choice = self.ucb_choice(previous, rng);
        let variant = if self.adaptive {
            choice.ucb_variant
        } else {
            rng.random_range(0..n)
        };
        self.choices.push(Choice { variant, ..choice });
        variant
    }

    fn ucb_choice(&self, previous: usize, rng: &mut Pcg32) -> Choice {
        let total: u32 = (0..self.variant_count)
            .map(|c| self.explore_count(previous, c))
            .sum();
        // ln(0) would make the exploration term NaN
        let log_total = (total as f32 + EPS).ln().max(0.0);

        let mut best_score = f32::NEG_INFINITY;
        let mut best: Vec<usize> = Vec::new();
        let mut unvisited: Vec<usize> = Vec::new();

        for candidate in 0..self.variant_count {
            let count = self.explore_count(previous, candidate);
            let score = self.exploit_score(previous, candidate)
                + std::f32::consts::SQRT_2 * (log_total / (count as f32 + EPS)).sqrt();

            if count == 0 {
                unvisited.push(candidate);
            }
            if score > best_score {
                best_score = score;
                best.clear();
                best.push(candidate);
            } else if score == best_score {
                best.push(candidate);
            }
        }

        let forced = !unvisited.is_empty();
        let pool = if forced { &unvisited } else { &best };
        let ucb_variant = pool[rng.random_range(0..pool.len())];
        let count = self.explore_count(previous, ucb_variant);

        Choice {
            previous,
            variant: ucb_variant,
            ucb_variant,
            best_score,
            exploit: self.exploit_score(previous, ucb_variant),
            explore: (log_total / (count as f32 + EPS)).sqrt(),
            forced,
        }
    }

    /// Fold a segment score into the transition `previous -> chosen`
    ///
    /// Returns false when the outcome was ignored (warm-up or no predecessor).
    pub fn record_outcome(&mut self, previous: Option<usize>, chosen: usize, score: f32) -> bool {
        self.outcomes_seen += 1;
        if self.outcomes_seen <= WARMUP_SEGMENTS {
            return false;
        }
        let Some(previous) = previous else {
            return false;
        };
        if previous >= self.variant_count || chosen >= self.variant_count {
            log::warn!("Outcome for unknown transition {previous} -> {chosen}");
            return false;
        }

        let cell = self.cell(previous, chosen);
        let count = self.explore[cell];
        self.exploit[cell] = if count == 0 {
            score
        } else {
            (self.exploit[cell] * count as f32 + score) / (count + 1) as f32
        };
        self.explore[cell] += 1;
        true
    }
}

impl VariantChooser for BanditSelector {
    fn choose_next(&mut self, previous: Option<usize>, variant_count: usize, rng: &mut Pcg32) -> usize {
        debug_assert_eq!(variant_count, self.variant_count);
        self.choose(previous, rng)
    }
}
