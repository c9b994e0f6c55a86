//! Deterministic track simulation
//!
//! All track logic lives here. Given the same settings, theme, seed and
//! per-tick input, a run replays exactly:
//! - Fixed timestep only
//! - Seeded RNG only
//! - Stable iteration order (segments in spawn order)
//! - No rendering, audio or platform dependencies

pub mod backdrop;
pub mod bandit;
pub mod emotion;
pub mod pool;
pub mod scorer;
pub mod segment;
pub mod state;
pub mod tick;

pub use backdrop::{Backdrop, Cloud};
pub use bandit::{BanditSelector, Choice};
pub use emotion::{CHANNEL_COUNT, Emotion, EmotionBuffer, EmotionSample};
pub use pool::{BoundaryCrossing, SegmentPool, VariantChooser};
pub use scorer::{ScoringStrategy, SegmentReport, SegmentScorer, affect_score};
pub use segment::{
    ActiveSegment, CollectibleKind, CollectiblePlacement, Furnisher, ObstacleKind,
    ObstaclePlacement, path_pose,
};
pub use state::{ModifierId, MultiplierModifier, RunPhase, RunState, Track, TrackEvent};
pub use tick::{TickInput, tick};
