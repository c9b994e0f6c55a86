//! Theme and zone configuration
//!
//! A theme is external asset data: an ordered list of zones, each holding the
//! segment variants the track can be built from. Variant indices are stable
//! for the lifetime of a session because the bandit tables are keyed by them.

use std::path::Path;

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::error::{Result, TrackError};

/// Number of lanes on every segment
pub const LANE_COUNT: usize = 3;

/// A reusable track-segment template
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentVariant {
    pub name: String,
    /// Path length in world units
    pub length: f32,
    /// Total yaw change over the segment (radians, 0 = straight, positive = right)
    #[serde(default)]
    pub turn: f32,
    /// Obstacle template index per lane (left, middle, right)
    #[serde(default)]
    pub obstacle_slots: Vec<Option<usize>>,
    #[serde(default)]
    pub low_barrier: bool,
    #[serde(default)]
    pub high_barrier: bool,
    /// Lane the coin line runs along (0 = left, 1 = middle, 2 = right)
    #[serde(default = "default_coin_lane")]
    pub coin_lane: u8,
}

fn default_coin_lane() -> u8 {
    1
}

impl SegmentVariant {
    pub fn straight(name: &str, length: f32) -> Self {
        Self {
            name: name.to_string(),
            length,
            turn: 0.0,
            obstacle_slots: vec![None; LANE_COUNT],
            low_barrier: false,
            high_barrier: false,
            coin_lane: 1,
        }
    }

    pub fn validate(&self) -> Result<()> {
        let invalid = |reason: &str| TrackError::InvalidVariant {
            name: self.name.clone(),
            reason: reason.to_string(),
        };
        if !(self.length > 0.0) || !self.length.is_finite() {
            return Err(invalid("length must be positive"));
        }
        if !self.turn.is_finite() {
            return Err(invalid("turn must be finite"));
        }
        if self.obstacle_slots.len() > LANE_COUNT {
            return Err(invalid("more obstacle slots than lanes"));
        }
        if self.coin_lane as usize >= LANE_COUNT {
            return Err(invalid("coin lane out of range"));
        }
        Ok(())
    }
}

/// An ordered set of variants the track streams from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Zone {
    pub name: String,
    pub variants: Vec<SegmentVariant>,
}

impl Zone {
    pub fn len(&self) -> usize {
        self.variants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variants.is_empty()
    }
}

/// Background decoration parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CloudSettings {
    /// Number of clouds kept alive
    pub count: usize,
    /// Base offset of each cloud; z is the spacing between consecutive clouds
    pub minimum_distance: Vec3,
    /// Random spread around the base offset per axis
    pub spread: Vec3,
}

impl Default for CloudSettings {
    fn default() -> Self {
        Self {
            count: 10,
            minimum_distance: Vec3::new(-20.0, 25.0, 15.0),
            spread: Vec3::new(10.0, 5.0, 5.0),
        }
    }
}

/// A pickup the furnisher may place instead of a coin
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Consumable {
    pub name: String,
    /// False while the pickup is on cooldown or otherwise unavailable
    #[serde(default = "default_true")]
    pub can_be_spawned: bool,
}

fn default_true() -> bool {
    true
}

/// A complete theme: zones, decoration and pickups
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThemeData {
    pub name: String,
    pub zones: Vec<Zone>,
    #[serde(default)]
    pub clouds: Option<CloudSettings>,
    #[serde(default)]
    pub consumables: Vec<Consumable>,
}

impl ThemeData {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let theme: Self = serde_json::from_str(json)?;
        theme.validate()?;
        Ok(theme)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path.as_ref())?;
        let theme = Self::from_json_str(&json)?;
        log::info!(
            "Loaded theme '{}' ({} zones) from {}",
            theme.name,
            theme.zones.len(),
            path.as_ref().display()
        );
        Ok(theme)
    }

    pub fn validate(&self) -> Result<()> {
        if self.zones.is_empty() {
            return Err(TrackError::NoZones(self.name.clone()));
        }
        for zone in &self.zones {
            if zone.is_empty() {
                return Err(TrackError::EmptyZone(zone.name.clone()));
            }
            for variant in &zone.variants {
                variant.validate()?;
            }
        }
        Ok(())
    }

    pub fn zone(&self, index: usize) -> Result<&Zone> {
        self.zones.get(index).ok_or(TrackError::ZoneOutOfRange {
            index,
            count: self.zones.len(),
        })
    }

    /// Built-in theme used by the headless driver and tests
    pub fn demo() -> Self {
        let mut barrier = SegmentVariant::straight("barrier", 20.0);
        barrier.low_barrier = true;
        barrier.coin_lane = 0;

        let mut slalom = SegmentVariant::straight("slalom", 24.0);
        slalom.obstacle_slots = vec![Some(0), None, Some(1)];

        let mut bend_left = SegmentVariant::straight("bend-left", 30.0);
        bend_left.turn = -std::f32::consts::FRAC_PI_4;
        bend_left.coin_lane = 2;

        let mut bend_right = SegmentVariant::straight("bend-right", 30.0);
        bend_right.turn = std::f32::consts::FRAC_PI_4;
        bend_right.high_barrier = true;

        Self {
            name: "Day".to_string(),
            zones: vec![Zone {
                name: "Street".to_string(),
                variants: vec![
                    SegmentVariant::straight("straight", 20.0),
                    barrier,
                    slalom,
                    bend_left,
                    bend_right,
                ],
            }],
            clouds: Some(CloudSettings::default()),
            consumables: vec![
                Consumable {
                    name: "magnet".to_string(),
                    can_be_spawned: true,
                },
                Consumable {
                    name: "score-multiplier".to_string(),
                    can_be_spawned: true,
                },
            ],
        }
    }
}
