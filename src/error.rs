//! Error types for configuration loading and validation
//!
//! The simulation itself never fails: missing data delays work and log
//! failures are swallowed. Only loading themes and settings can error.

use thiserror::Error;

/// Errors raised while loading or validating track configuration
#[derive(Error, Debug)]
pub enum TrackError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("theme '{0}' has no zones")]
    NoZones(String),

    #[error("zone '{0}' has no segment variants")]
    EmptyZone(String),

    #[error("zone index {index} out of range ({count} zones)")]
    ZoneOutOfRange { index: usize, count: usize },

    #[error("invalid segment variant '{name}': {reason}")]
    InvalidVariant { name: String, reason: String },

    #[error("invalid settings: {0}")]
    InvalidSettings(String),
}

pub type Result<T> = std::result::Result<T, TrackError>;
