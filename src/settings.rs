//! Run settings
//!
//! Loaded once per session from a JSON file, falling back to defaults.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::consts::*;
use crate::error::{Result, TrackError};

/// Session flavour: which scorer drives the bandit, and whether it drives at all
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum GameType {
    /// Random segment order; statistics are still gathered and logged
    Control,
    /// Adaptive, scored from facial affect (valence/engagement)
    #[default]
    Affective,
    /// Adaptive, scored from play behaviour (keys, coins, survival)
    Behavioral,
}

impl GameType {
    pub fn as_str(&self) -> &'static str {
        match self {
            GameType::Control => "Control",
            GameType::Affective => "Affective",
            GameType::Behavioral => "Behavioral",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "control" | "random" | "0" => Some(GameType::Control),
            "affective" | "affect" | "1" => Some(GameType::Affective),
            "behavioral" | "behaviour" | "behavior" | "2" => Some(GameType::Behavioral),
            _ => None,
        }
    }

    /// Numeric code used in log file names
    pub fn code(&self) -> u8 {
        match self {
            GameType::Control => 0,
            GameType::Affective => 1,
            GameType::Behavioral => 2,
        }
    }

    /// Whether the bandit's choice drives segment selection
    pub fn is_adaptive(&self) -> bool {
        *self != GameType::Control
    }
}

/// Tunables for a run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunSettings {
    // === Movement ===
    pub min_speed: f32,
    pub max_speed: f32,
    /// Number of multiplier steps between min and max speed
    pub speed_step: u32,
    /// Lateral distance between lanes
    pub lane_offset: f32,

    // === Track ===
    /// Active segment window size
    pub desired_segment_count: usize,
    /// Segments at run start that never receive obstacles
    pub starting_safe_segments: u32,
    /// Fixed seed for reproducible tracks (None = fresh seed each run)
    pub track_seed: Option<u64>,

    // === Backdrop ===
    pub parallax_ratio: f32,

    // === Session ===
    pub player_id: u32,
    pub game_type: GameType,
    /// Directory for CSV session logs (None = logging disabled)
    pub log_dir: Option<String>,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            min_speed: 10.0,
            max_speed: 18.0,
            speed_step: 8,
            lane_offset: 1.0,

            desired_segment_count: DESIRED_SEGMENT_COUNT,
            starting_safe_segments: STARTING_SAFE_SEGMENTS,
            track_seed: None,

            parallax_ratio: 0.5,

            player_id: 999,
            game_type: GameType::Affective,
            log_dir: None,
        }
    }
}

impl RunSettings {
    /// Parse settings from JSON; missing fields take their defaults
    pub fn from_json_str(json: &str) -> Result<Self> {
        let settings: Self = serde_json::from_str(json)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Load settings from a JSON file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path.as_ref())?;
        let settings = Self::from_json_str(&json)?;
        log::info!("Loaded settings from {}", path.as_ref().display());
        Ok(settings)
    }

    /// Load settings, or use defaults if the file is missing or malformed
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        match Self::load(path) {
            Ok(settings) => settings,
            Err(e) => {
                log::info!("Using default settings ({e})");
                Self::default()
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.desired_segment_count == 0 {
            return Err(TrackError::InvalidSettings(
                "desired_segment_count must be at least 1".into(),
            ));
        }
        if !(self.min_speed >= 0.0 && self.max_speed >= self.min_speed) {
            return Err(TrackError::InvalidSettings(format!(
                "speed range {}..{} is not ordered",
                self.min_speed, self.max_speed
            )));
        }
        Ok(())
    }

    /// Base names of the two CSV streams: (all ticks, per-segment summary)
    pub fn log_file_names(&self) -> (String, String) {
        let code = self.game_type.code();
        (
            format!("{}_{}_all.csv", self.player_id, code),
            format!("{}_{}_summary.csv", self.player_id, code),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_uses_defaults() {
        let settings = RunSettings::from_json_str(r#"{ "max_speed": 25.0, "game_type": "Behavioral" }"#)
            .unwrap();
        assert_eq!(settings.max_speed, 25.0);
        assert_eq!(settings.min_speed, 10.0);
        assert_eq!(settings.game_type, GameType::Behavioral);
        assert_eq!(settings.desired_segment_count, DESIRED_SEGMENT_COUNT);
    }

    #[test]
    fn test_rejects_bad_speed_range() {
        let err = RunSettings::from_json_str(r#"{ "min_speed": 20.0, "max_speed": 10.0 }"#);
        assert!(matches!(err, Err(TrackError::InvalidSettings(_))));
    }

    #[test]
    fn test_game_type_codes() {
        assert!(!GameType::Control.is_adaptive());
        assert!(GameType::Behavioral.is_adaptive());
        assert_eq!(GameType::from_str("1"), Some(GameType::Affective));
        assert_eq!(GameType::from_str("nope"), None);

        let settings = RunSettings {
            player_id: 12,
            game_type: GameType::Control,
            ..Default::default()
        };
        let (all, summary) = settings.log_file_names();
        assert_eq!(all, "12_0_all.csv");
        assert_eq!(summary, "12_0_summary.csv");
    }

    #[test]
    fn test_missing_file_falls_back() {
        let settings = RunSettings::load_or_default("/definitely/not/here.json");
        assert_eq!(settings.player_id, 999);
    }
}
