//! Segment pool: the window of active segments ahead of the player
//!
//! Segments are spawned at the tail, each attached to the previous exit pose.
//! The head is the segment the player is on; once the player's distance into
//! it exceeds its length it moves to the pending list, where it lingers until
//! far enough behind the player to drop. The window may run empty mid-step;
//! the next spawn still attaches to the last exit.

use std::collections::VecDeque;

use glam::Vec3;
use rand_pcg::Pcg32;

use super::segment::{ActiveSegment, Furnisher};
use crate::Pose;
use crate::consts::SEGMENT_REMOVAL_DISTANCE;
use crate::theme::Zone;

/// Picks which variant to stream in next
pub trait VariantChooser {
    /// `previous` is the variant of the segment at the tail of the window
    fn choose_next(&mut self, previous: Option<usize>, variant_count: usize, rng: &mut Pcg32) -> usize;
}

/// Emitted when the player leaves the head segment
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundaryCrossing {
    /// Variant of the segment passed before this one (None on the first crossing)
    pub previous_variant: Option<usize>,
    /// Variant of the segment just left
    pub passed_variant: usize,
    /// Coins the passed segment was furnished with
    pub coins_spawned: u32,
    /// Crossings so far this run, including this one
    pub segments_passed: u32,
}

#[derive(Debug, Clone)]
pub struct SegmentPool {
    window_size: usize,
    active: VecDeque<ActiveSegment>,
    passed: Vec<ActiveSegment>,
    crossings: VecDeque<BoundaryCrossing>,
    /// Where the next spawned segment attaches
    next_entry: Pose,
    /// Variant of the most recently spawned segment
    last_spawned: Option<usize>,
    /// Distance into the head segment
    head_distance: f32,
    /// Variant of the most recently passed segment
    previous_variant: Option<usize>,
    segments_passed: u32,
    safe_segments_left: u32,
    next_id: u32,
}

impl SegmentPool {
    pub fn new(window_size: usize) -> Self {
        Self {
            window_size,
            active: VecDeque::with_capacity(window_size),
            passed: Vec::new(),
            crossings: VecDeque::new(),
            next_entry: Pose::IDENTITY,
            last_spawned: None,
            head_distance: 0.0,
            previous_variant: None,
            segments_passed: 0,
            safe_segments_left: 0,
            next_id: 1,
        }
    }

    /// Reset for a fresh run: no segments, player `start_distance` into the first
    pub fn reset(&mut self, start_distance: f32, safe_segments: u32) {
        self.clear();
        self.next_entry = Pose::IDENTITY;
        self.last_spawned = None;
        self.head_distance = start_distance;
        self.safe_segments_left = safe_segments;
        self.reset_run_counters();
    }

    /// Forget crossing history but keep the track as laid out (reruns)
    pub fn reset_run_counters(&mut self) {
        self.previous_variant = None;
        self.segments_passed = 0;
        self.crossings.clear();
    }

    /// Drop every active and pending segment
    pub fn clear(&mut self) {
        self.active.clear();
        self.passed.clear();
        self.crossings.clear();
    }

    pub fn window_size(&self) -> usize {
        self.window_size
    }

    pub fn active(&self) -> &VecDeque<ActiveSegment> {
        &self.active
    }

    pub fn passed(&self) -> &[ActiveSegment] {
        &self.passed
    }

    pub fn head(&self) -> Option<&ActiveSegment> {
        self.active.front()
    }

    /// Variant of the most recently spawned segment
    pub fn tail_variant(&self) -> Option<usize> {
        self.last_spawned
    }

    pub fn head_distance(&self) -> f32 {
        self.head_distance
    }

    pub fn segments_passed(&self) -> u32 {
        self.segments_passed
    }

    pub fn safe_segments_left(&self) -> u32 {
        self.safe_segments_left
    }

    /// Spawn segments until the window is full; returns how many were spawned
    pub fn ensure_window<C: VariantChooser>(
        &mut self,
        zone: &Zone,
        chooser: &mut C,
        furnisher: &mut Furnisher<'_>,
        rng: &mut Pcg32,
    ) -> usize {
        let mut spawned = 0;
        while self.active.len() < self.window_size {
            let variant_index = chooser.choose_next(self.tail_variant(), zone.len(), rng);
            let variant = &zone.variants[variant_index];

            let mut segment = ActiveSegment::new(self.next_id, variant_index, variant, self.next_entry);
            self.next_id += 1;
            self.next_entry = segment.exit_pose();
            self.last_spawned = Some(variant_index);

            if self.safe_segments_left == 0 {
                furnisher.furnish(&mut segment, variant, rng);
            } else {
                self.safe_segments_left -= 1;
            }

            log::debug!("Spawned segment {} ({})", segment.id, variant.name);
            self.active.push_back(segment);
            spawned += 1;
        }
        spawned
    }

    /// Move the player forward, retiring every head segment it runs off
    ///
    /// A long step can empty the window. Refill, then call again with zero
    /// distance to retire whatever the leftover covers.
    pub fn advance(&mut self, distance: f32) {
        self.head_distance += distance;
        while let Some(head_length) = self.active.front().map(|s| s.length) {
            if self.head_distance <= head_length {
                break;
            }
            self.head_distance -= head_length;
            self.retire_head();
        }
    }

    fn retire_head(&mut self) {
        let Some(head) = self.active.pop_front() else {
            return;
        };
        self.segments_passed += 1;
        self.crossings.push_back(BoundaryCrossing {
            previous_variant: self.previous_variant,
            passed_variant: head.variant,
            coins_spawned: head.coins_spawned,
            segments_passed: self.segments_passed,
        });
        self.previous_variant = Some(head.variant);
        self.passed.push(head);
    }

    /// Pop the oldest unhandled boundary crossing
    pub fn next_crossing(&mut self) -> Option<BoundaryCrossing> {
        self.crossings.pop_front()
    }

    /// World pose `distance` units into the head segment
    pub fn point_at(&self, distance: f32) -> Option<Pose> {
        self.head().map(|head| head.point_at_world_unit(distance))
    }

    /// World pose of the player
    pub fn current_pose(&self) -> Option<Pose> {
        self.point_at(self.head_distance)
    }

    /// Shift every active and pending segment by the same offset
    pub fn translate(&mut self, offset: Vec3) {
        self.next_entry.position += offset;
        for segment in self.active.iter_mut().chain(self.passed.iter_mut()) {
            segment.translate(offset);
        }
    }

    /// Drop pending segments far enough behind the player; returns how many
    pub fn cull_passed(&mut self, player: Pose) -> usize {
        let forward = player.forward();
        let before = self.passed.len();
        self.passed
            .retain(|s| (s.position - player.position).dot(forward) >= SEGMENT_REMOVAL_DISTANCE);
        before - self.passed.len()
    }
}
