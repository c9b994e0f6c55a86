//! Parallax backdrop
//!
//! Clouds drift along with the player at a fraction of its motion, so they
//! appear far away. They are topped up ahead and dropped once behind.

use glam::Vec3;
use rand::Rng;
use rand_pcg::Pcg32;
use serde::{Deserialize, Serialize};

use crate::consts::CLOUD_REMOVAL_DISTANCE;
use crate::theme::CloudSettings;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Cloud {
    pub position: Vec3,
    pub scale: f32,
    /// Rotation about the up axis (radians)
    pub yaw: f32,
}

#[derive(Debug, Clone, Default)]
pub struct Backdrop {
    clouds: Vec<Cloud>,
}

impl Backdrop {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clouds(&self) -> &[Cloud] {
        &self.clouds
    }

    pub fn clear(&mut self) {
        self.clouds.clear();
    }

    /// Spawn clouds until `settings.count` exist; each new one goes past the last
    pub fn top_up(&mut self, settings: &CloudSettings, rng: &mut Pcg32) {
        while self.clouds.len() < settings.count {
            let last_z = self
                .clouds
                .last()
                .map_or(0.0, |c| c.position.z + settings.minimum_distance.z);
            let mut jitter = || rng.random::<f32>() - 0.5;

            let position = Vec3::new(
                settings.minimum_distance.x + jitter() * settings.spread.x,
                settings.minimum_distance.y + jitter() * settings.spread.y,
                last_z + jitter() * settings.spread.z,
            );
            let scale = 1.0 + jitter() * 0.5;
            let yaw = (jitter() + 0.5) * std::f32::consts::TAU;

            self.clouds.push(Cloud { position, scale, yaw });
        }
    }

    /// Shift every cloud by the same offset
    pub fn translate(&mut self, offset: Vec3) {
        for cloud in &mut self.clouds {
            cloud.position += offset;
        }
    }

    /// Drop clouds too far behind the player along z; returns how many
    pub fn cull(&mut self, player: Vec3) -> usize {
        let before = self.clouds.len();
        self.clouds
            .retain(|c| c.position.z - player.z >= CLOUD_REMOVAL_DISTANCE);
        before - self.clouds.len()
    }
}
