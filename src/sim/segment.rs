//! Active track segments and their furnishing
//!
//! A segment's centreline is either straight or a circular arc in the XZ
//! plane. Its local frame starts at the origin facing +Z; the world pose of
//! the segment places that frame in the world.

use glam::{Quat, Vec3};
use rand::Rng;
use rand_pcg::Pcg32;
use serde::{Deserialize, Serialize};

use crate::Pose;
use crate::consts::COIN_INCREMENT;
use crate::theme::{Consumable, SegmentVariant};

/// Below this absolute turn a segment is treated as straight
const STRAIGHT_EPSILON: f32 = 1e-5;

/// Local pose at arc length `s` along a path of `length` turning by `turn`
pub fn path_pose(length: f32, turn: f32, s: f32) -> Pose {
    if turn.abs() < STRAIGHT_EPSILON {
        return Pose::new(Vec3::new(0.0, 0.0, s), Quat::IDENTITY);
    }
    // Signed radius; negative turns curve left
    let radius = length / turn;
    let yaw = s / radius;
    Pose::new(
        Vec3::new(radius * (1.0 - yaw.cos()), 0.0, radius * yaw.sin()),
        Quat::from_rotation_y(yaw),
    )
}

/// Obstacle template kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ObstacleKind {
    /// Full-width barrier the player slides under
    LowBarrier,
    /// Full-width barrier the player jumps over
    HighBarrier,
    /// Lane obstacle by template index
    Slot(usize),
}

/// An obstacle placed on a segment
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ObstaclePlacement {
    pub kind: ObstacleKind,
    /// Lane offset from the centre lane (-1, 0, 1); None for full-width
    pub lane: Option<i32>,
    pub position: Vec3,
    pub rotation: Quat,
}

/// Collectible kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CollectibleKind {
    Coin,
    /// Consumable by index into the theme's list
    Powerup(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CollectiblePlacement {
    pub kind: CollectibleKind,
    pub position: Vec3,
    pub rotation: Quat,
}

/// An instantiated occurrence of a segment variant
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActiveSegment {
    pub id: u32,
    /// Index of the template in the current zone
    pub variant: usize,
    pub position: Vec3,
    pub rotation: Quat,
    /// Path length in world units
    pub length: f32,
    /// Yaw change over the path
    pub turn: f32,
    pub obstacles: Vec<ObstaclePlacement>,
    pub collectibles: Vec<CollectiblePlacement>,
    /// Coins spawned on this segment (the scorer's denominator)
    pub coins_spawned: u32,
}

impl ActiveSegment {
    /// Instantiate a variant so its entry lines up with `entry`
    pub fn new(id: u32, variant_index: usize, variant: &SegmentVariant, entry: Pose) -> Self {
        // Entry of the local path is the local origin, so the segment origin
        // lands exactly on the previous exit.
        let local_entry = path_pose(variant.length, variant.turn, 0.0);
        let position = entry.position - entry.rotation * local_entry.position;
        Self {
            id,
            variant: variant_index,
            position,
            rotation: entry.rotation,
            length: variant.length,
            turn: variant.turn,
            obstacles: Vec::new(),
            collectibles: Vec::new(),
            coins_spawned: 0,
        }
    }

    #[inline]
    pub fn pose(&self) -> Pose {
        Pose::new(self.position, self.rotation)
    }

    /// World pose at `distance` world units into the segment
    pub fn point_at_world_unit(&self, distance: f32) -> Pose {
        self.pose()
            .transform(path_pose(self.length, self.turn, distance))
    }

    /// World pose at normalized position `t` in [0, 1]
    pub fn point_at(&self, t: f32) -> Pose {
        self.point_at_world_unit(t * self.length)
    }

    /// Pose where the next segment attaches
    pub fn exit_pose(&self) -> Pose {
        self.point_at(1.0)
    }

    /// Shift the segment and everything on it
    pub fn translate(&mut self, offset: Vec3) {
        self.position += offset;
        for obstacle in &mut self.obstacles {
            obstacle.position += offset;
        }
        for collectible in &mut self.collectibles {
            collectible.position += offset;
        }
    }
}

/// Places obstacles and collectibles on freshly spawned segments
#[derive(Debug)]
pub struct Furnisher<'a> {
    pub lane_offset: f32,
    pub consumables: &'a [Consumable],
    /// Seconds since a powerup was last placed; the longer, the likelier the next
    pub time_since_powerup: &'a mut f32,
}

impl Furnisher<'_> {
    /// Add obstacles, then the coin line (with occasional powerups)
    pub fn furnish(&mut self, segment: &mut ActiveSegment, variant: &SegmentVariant, rng: &mut Pcg32) {
        let mid = segment.point_at(0.5);

        if variant.low_barrier {
            segment.obstacles.push(ObstaclePlacement {
                kind: ObstacleKind::LowBarrier,
                lane: None,
                position: mid.position,
                rotation: mid.rotation,
            });
        }
        if variant.high_barrier {
            segment.obstacles.push(ObstaclePlacement {
                kind: ObstacleKind::HighBarrier,
                lane: None,
                position: mid.position,
                rotation: mid.rotation,
            });
        }
        for (slot, template) in variant.obstacle_slots.iter().enumerate() {
            let Some(template) = *template else { continue };
            let lane = slot as i32 - 1;
            segment.obstacles.push(ObstaclePlacement {
                kind: ObstacleKind::Slot(template),
                lane: Some(lane),
                position: mid.position + mid.right() * lane as f32 * self.lane_offset,
                rotation: mid.rotation,
            });
        }

        self.place_collectibles(segment, variant, rng);
    }

    fn place_collectibles(&mut self, segment: &mut ActiveSegment, variant: &SegmentVariant, rng: &mut Pcg32) {
        let lane = variant.coin_lane as f32 - 1.0;
        let mut powerup_chance = (self.time_since_powerup.floor() * 0.5 * 0.001).clamp(0.0, 1.0);
        let mut coins = 0;
        let mut distance = 0.0;

        while distance < segment.length {
            let pose = segment.point_at_world_unit(distance);
            let position = pose.position + pose.right() * lane * self.lane_offset;

            if rng.random::<f32>() < powerup_chance {
                if !self.consumables.is_empty() {
                    let picked = rng.random_range(0..self.consumables.len());
                    // An unavailable pickup leaves the slot empty and keeps the odds high
                    if self.consumables[picked].can_be_spawned {
                        *self.time_since_powerup = 0.0;
                        powerup_chance = 0.0;
                        segment.collectibles.push(CollectiblePlacement {
                            kind: CollectibleKind::Powerup(picked),
                            position,
                            rotation: pose.rotation,
                        });
                    }
                }
            } else {
                segment.collectibles.push(CollectiblePlacement {
                    kind: CollectibleKind::Coin,
                    position,
                    rotation: pose.rotation,
                });
                coins += 1;
            }
            distance += COIN_INCREMENT;
        }

        segment.coins_spawned = coins;
    }
}
