//! Run state and the track that owns every simulation component
//!
//! `Track` is the run control surface the host's state machine talks to:
//! begin/end a run, start/stop movement, read score and speed. `tick`
//! (in `tick.rs`) advances it.

use std::collections::VecDeque;

use glam::Vec3;
use rand::SeedableRng;
use rand_pcg::Pcg32;

use super::backdrop::Backdrop;
use super::bandit::BanditSelector;
use super::emotion::{CHANNEL_COUNT, EmotionBuffer};
use super::pool::SegmentPool;
use super::scorer::{ScoringStrategy, SegmentScorer};
use super::segment::ActiveSegment;
use crate::Pose;
use crate::consts::*;
use crate::error::Result;
use crate::progression::Progression;
use crate::settings::{GameType, RunSettings};
use crate::telemetry::SessionLog;
use crate::theme::ThemeData;

/// Current phase of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    /// No run in progress
    Idle,
    /// Run begun, start countdown ticking
    Countdown,
    /// Countdown over; movement controlled by start/stop
    Running,
}

/// Something the host may want to react to
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TrackEvent {
    /// Start countdown finished and the player is moving
    CountdownFinished,
    /// A rerun's countdown finished; the character should be briefly invincible
    RerunShield,
    SegmentPassed {
        variant: usize,
        score: f32,
        /// Whether the score reached the bandit tables
        recorded: bool,
        segments_passed: u32,
    },
    /// World shifted back toward the origin by `offset`
    Recentered { offset: Vec3 },
    RankUp { rank: u32 },
}

/// Scalar state of the current run
#[derive(Debug, Clone, PartialEq)]
pub struct RunState {
    pub phase: RunPhase,
    pub moving: bool,
    pub rerun: bool,
    pub speed: f32,
    pub total_distance: f32,
    pub zone_distance: f32,
    pub zone: usize,
    pub score: u64,
    /// Fractional score not yet credited
    pub score_accum: f32,
    pub multiplier: u32,
    /// Seconds of countdown left (-1 when not counting)
    pub time_to_start: f32,
}

impl RunState {
    pub fn new(min_speed: f32) -> Self {
        Self {
            phase: RunPhase::Idle,
            moving: false,
            rerun: false,
            speed: min_speed,
            total_distance: 0.0,
            zone_distance: 0.0,
            zone: 0,
            score: 0,
            score_accum: 0.0,
            multiplier: 1,
            time_to_start: -1.0,
        }
    }

    /// Credit travelled distance; score moves in whole units times the multiplier
    pub fn travel(&mut self, distance: f32) {
        self.score_accum += distance;
        self.zone_distance += distance;
        self.total_distance += distance;

        let whole = self.score_accum.floor();
        if whole >= 1.0 {
            self.score += whole as u64 * self.multiplier as u64;
            self.score_accum -= whole;
        }
    }

    /// Position of the current speed in [min, max] as 0..1
    pub fn speed_ratio(&self, min_speed: f32, max_speed: f32) -> f32 {
        let range = max_speed - min_speed;
        if range <= 0.0 {
            return 1.0;
        }
        (self.speed - min_speed) / range
    }

    /// Ease toward max speed, never past it
    pub fn accelerate(&mut self, dt: f32, max_speed: f32) {
        if self.speed < max_speed {
            self.speed = (self.speed + ACCELERATION * dt).min(max_speed);
        } else {
            self.speed = max_speed;
        }
    }
}

/// Rewrites the multiplier each tick
pub type MultiplierModifier = Box<dyn Fn(u32) -> u32>;

/// Handle for removing a registered modifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ModifierId(u32);

/// What the host last told us about the character
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct HostSnapshot {
    pub coins_total: u32,
    pub lives: u32,
}

impl Default for HostSnapshot {
    fn default() -> Self {
        Self {
            coins_total: 0,
            lives: STARTING_LIVES,
        }
    }
}

/// Score and emotion means of the last segment passed
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct SegmentOutcome {
    pub score: f32,
    pub emotion_means: [f32; CHANNEL_COUNT],
}

/// The whole track simulation for one session
pub struct Track {
    pub(crate) settings: RunSettings,
    pub(crate) theme: Option<ThemeData>,
    pub(crate) run: RunState,
    pub(crate) pool: SegmentPool,
    pub(crate) bandit: Option<BanditSelector>,
    pub(crate) scorer: SegmentScorer,
    pub(crate) emotions: EmotionBuffer,
    pub(crate) backdrop: Backdrop,
    pub(crate) progression: Progression,
    pub(crate) log: SessionLog,
    pub(crate) rng: Pcg32,
    pub(crate) seed: u64,
    pub(crate) player: Pose,
    pub(crate) host: HostSnapshot,
    pub(crate) last_outcome: Option<SegmentOutcome>,
    pub(crate) time_since_powerup: f32,
    pub(crate) current_game: u32,
    pub(crate) events: Vec<TrackEvent>,
    modifiers: Vec<(ModifierId, MultiplierModifier)>,
    next_modifier: u32,
}

impl std::fmt::Debug for Track {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Track")
            .field("run", &self.run)
            .field("seed", &self.seed)
            .field("segments", &self.pool.active().len())
            .field("modifiers", &self.modifiers.len())
            .finish_non_exhaustive()
    }
}

impl Track {
    /// Create a track with file logs per `settings.log_dir`
    pub fn new(settings: RunSettings) -> Self {
        let log = SessionLog::from_settings(&settings);
        Self::with_log(settings, log)
    }

    pub fn with_log(settings: RunSettings, log: SessionLog) -> Self {
        let strategy = match settings.game_type {
            GameType::Affective => ScoringStrategy::Affect,
            GameType::Control | GameType::Behavioral => ScoringStrategy::Behavioral,
        };
        let seed = settings.track_seed.unwrap_or(0);
        Self {
            run: RunState::new(settings.min_speed),
            pool: SegmentPool::new(settings.desired_segment_count),
            bandit: None,
            scorer: SegmentScorer::new(strategy),
            emotions: EmotionBuffer::new(),
            backdrop: Backdrop::new(),
            progression: Progression::default(),
            log,
            rng: Pcg32::seed_from_u64(seed),
            seed,
            player: Pose::IDENTITY,
            host: HostSnapshot::default(),
            last_outcome: None,
            time_since_powerup: 0.0,
            current_game: 0,
            events: Vec::new(),
            modifiers: Vec::new(),
            next_modifier: 0,
            theme: None,
            settings,
        }
    }

    pub fn with_progression(mut self, progression: Progression) -> Self {
        self.progression = progression;
        self
    }

    /// Install the theme; segments start spawning on the next tick
    ///
    /// The bandit tables are kept when the current zone's variant count is
    /// unchanged, so learning survives reloading the same theme.
    pub fn set_theme(&mut self, theme: ThemeData) -> Result<()> {
        theme.validate()?;
        let variants = theme.zone(self.run.zone)?.len();
        let keep = self
            .bandit
            .as_ref()
            .is_some_and(|b| b.variant_count() == variants);
        if !keep {
            self.bandit = Some(BanditSelector::new(
                variants,
                self.settings.desired_segment_count,
                self.settings.game_type.is_adaptive(),
            ));
        }
        log::info!("Theme '{}' installed ({} variants in zone {})", theme.name, variants, self.run.zone);
        self.theme = Some(theme);
        Ok(())
    }

    /// Start a run; a rerun continues the track where the player died
    pub fn begin(&mut self, is_rerun: bool) {
        self.current_game += 1;
        self.log.write_headers();
        self.run.rerun = is_rerun;

        if is_rerun {
            self.pool.reset_run_counters();
        } else {
            self.seed = self.settings.track_seed.unwrap_or_else(rand::random);
            self.rng = Pcg32::seed_from_u64(self.seed);

            self.run = RunState::new(self.settings.min_speed);
            self.pool
                .reset(STARTING_SEGMENT_DISTANCE, self.settings.starting_safe_segments);
            self.backdrop.clear();
            self.player = Pose::IDENTITY;
            self.host = HostSnapshot::default();
            self.time_since_powerup = 0.0;
        }

        if let Some(bandit) = self.bandit.as_mut() {
            bandit.begin_run();
        }
        self.scorer.begin_run(self.host.coins_total, self.host.lives);
        self.emotions.clear();
        self.last_outcome = None;

        self.run.phase = RunPhase::Countdown;
        self.run.moving = false;
        self.run.time_to_start = COUNTDOWN_TO_START_LENGTH;
        log::info!(
            "Run {} begun (seed {}, rerun {}, {})",
            self.current_game,
            self.seed,
            is_rerun,
            self.settings.game_type.as_str()
        );
    }

    /// Tear the run down
    pub fn end(&mut self) {
        self.pool.clear();
        self.backdrop.clear();
        self.run.moving = false;
        self.run.phase = RunPhase::Idle;
        self.run.time_to_start = -1.0;
        log::info!(
            "Run {} ended: score {}, distance {:.1}",
            self.current_game,
            self.run.score,
            self.run.total_distance
        );
    }

    /// Start moving; a restart drops speed back to the minimum
    pub fn start_move(&mut self, is_restart: bool) {
        self.run.moving = true;
        self.run.phase = RunPhase::Running;
        self.run.time_to_start = -1.0;
        if is_restart {
            self.run.speed = self.settings.min_speed;
        }
    }

    pub fn stop_move(&mut self) {
        self.run.moving = false;
    }

    /// Register a modifier; modifiers apply in registration order
    pub fn add_multiplier_modifier(&mut self, modifier: impl Fn(u32) -> u32 + 'static) -> ModifierId {
        let id = ModifierId(self.next_modifier);
        self.next_modifier += 1;
        self.modifiers.push((id, Box::new(modifier)));
        id
    }

    pub fn remove_multiplier_modifier(&mut self, id: ModifierId) -> bool {
        let before = self.modifiers.len();
        self.modifiers.retain(|(m, _)| *m != id);
        self.modifiers.len() != before
    }

    /// `1 + floor(ratio * step)`, folded through the modifiers
    pub(crate) fn compute_multiplier(&self) -> u32 {
        let ratio = self
            .run
            .speed_ratio(self.settings.min_speed, self.settings.max_speed);
        let base = 1 + (ratio * self.settings.speed_step as f32).floor().max(0.0) as u32;
        self.modifiers.iter().fold(base, |m, (_, modify)| modify(m))
    }

    /// Drain events raised since the last call
    pub fn take_events(&mut self) -> Vec<TrackEvent> {
        std::mem::take(&mut self.events)
    }

    // === Read-only accessors ===

    pub fn score(&self) -> u64 {
        self.run.score
    }

    pub fn multiplier(&self) -> u32 {
        self.run.multiplier
    }

    pub fn world_distance(&self) -> f32 {
        self.run.total_distance
    }

    pub fn zone_distance(&self) -> f32 {
        self.run.zone_distance
    }

    pub fn speed(&self) -> f32 {
        self.run.speed
    }

    pub fn speed_ratio(&self) -> f32 {
        self.run
            .speed_ratio(self.settings.min_speed, self.settings.max_speed)
    }

    pub fn segments(&self) -> &VecDeque<ActiveSegment> {
        self.pool.active()
    }

    pub fn passed_segments(&self) -> &[ActiveSegment] {
        self.pool.passed()
    }

    pub fn current_segment(&self) -> Option<&ActiveSegment> {
        self.pool.head()
    }

    pub fn current_theme(&self) -> Option<&ThemeData> {
        self.theme.as_ref()
    }

    pub fn is_moving(&self) -> bool {
        self.run.moving
    }

    pub fn is_rerun(&self) -> bool {
        self.run.rerun
    }

    pub fn phase(&self) -> RunPhase {
        self.run.phase
    }

    /// Seconds until the run starts, -1 once started
    pub fn time_to_start(&self) -> f32 {
        self.run.time_to_start
    }

    pub fn rank(&self) -> u32 {
        self.progression.rank
    }

    pub fn progression(&self) -> &Progression {
        &self.progression
    }

    pub fn player_pose(&self) -> Pose {
        self.player
    }

    pub fn segments_passed(&self) -> u32 {
        self.pool.segments_passed()
    }

    pub fn bandit(&self) -> Option<&BanditSelector> {
        self.bandit.as_ref()
    }

    pub fn backdrop(&self) -> &Backdrop {
        &self.backdrop
    }

    pub fn settings(&self) -> &RunSettings {
        &self.settings
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn run_state(&self) -> &RunState {
        &self.run
    }
}
