//! Affect Runner - endless-runner track core with adaptive segment selection
//!
//! Core modules:
//! - `sim`: Deterministic simulation (segment pool, bandit, scoring, world advance)
//! - `theme`: Zone and segment-variant configuration
//! - `settings`: Per-session tunables
//! - `progression`: Persistent distance rank
//! - `telemetry`: CSV session logs

pub mod error;
pub mod progression;
pub mod settings;
pub mod sim;
pub mod telemetry;
pub mod theme;

pub use error::TrackError;
pub use progression::Progression;
pub use settings::{GameType, RunSettings};
pub use theme::ThemeData;

use glam::{Quat, Vec3};

/// Track configuration constants
pub mod consts {
    /// Fixed simulation timestep (60 Hz)
    pub const SIM_DT: f32 = 1.0 / 60.0;
    /// Maximum substeps per frame to prevent spiral of death
    pub const MAX_SUBSTEPS: u32 = 8;

    /// Squared distance from origin that triggers a world recentre
    pub const FLOATING_ORIGIN_THRESHOLD: f32 = 10_000.0;

    /// Start countdown (seconds of countdown at 1x)
    pub const COUNTDOWN_TO_START_LENGTH: f32 = 5.0;
    /// Countdown runs this much faster than real time
    pub const COUNTDOWN_SPEED: f32 = 1.5;

    /// Distance into the first segment when a run starts
    pub const STARTING_SEGMENT_DISTANCE: f32 = 2.0;
    pub const STARTING_SAFE_SEGMENTS: u32 = 2;
    pub const STARTING_LIVES: u32 = 3;
    pub const DESIRED_SEGMENT_COUNT: usize = 10;

    /// Passed segments are dropped once this far behind the player
    pub const SEGMENT_REMOVAL_DISTANCE: f32 = -30.0;
    /// Clouds are dropped once this far behind the player
    pub const CLOUD_REMOVAL_DISTANCE: f32 = -50.0;

    /// Speed gain per second
    pub const ACCELERATION: f32 = 0.2;

    /// Spacing between coin slots along a segment
    pub const COIN_INCREMENT: f32 = 1.5;

    /// Distance needed per rank: rank N+1 needs N+1 times this
    pub const RANK_DISTANCE: f32 = 300.0;
}

/// World pose along the track
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pose {
    pub position: Vec3,
    pub rotation: Quat,
}

impl Pose {
    pub const IDENTITY: Pose = Pose {
        position: Vec3::ZERO,
        rotation: Quat::IDENTITY,
    };

    pub fn new(position: Vec3, rotation: Quat) -> Self {
        Self { position, rotation }
    }

    /// Unit vector the pose is facing
    #[inline]
    pub fn forward(&self) -> Vec3 {
        self.rotation * Vec3::Z
    }

    /// Unit vector to the pose's right
    #[inline]
    pub fn right(&self) -> Vec3 {
        self.rotation * Vec3::X
    }

    /// Compose a local pose onto this one
    #[inline]
    pub fn transform(&self, local: Pose) -> Pose {
        Pose {
            position: self.position + self.rotation * local.position,
            rotation: (self.rotation * local.rotation).normalize(),
        }
    }
}

impl Default for Pose {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// Logistic squash into (0, 1)
#[inline]
pub fn logistic(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}
