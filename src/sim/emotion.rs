//! Per-segment emotion sample buffer
//!
//! The sensing collaborator reports nine affect channels once per tick.
//! Samples accumulate per channel until the segment is scored.

use serde::{Deserialize, Serialize};

/// Number of affect channels
pub const CHANNEL_COUNT: usize = 9;

/// Affect channel identifiers, in wire order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Emotion {
    Joy,
    Fear,
    Disgust,
    Sadness,
    Anger,
    Surprise,
    Contempt,
    /// Signed pleasantness, [-100, 100]
    Valence,
    /// Expressiveness, [0, 100]
    Engagement,
}

impl Emotion {
    pub const ALL: [Emotion; CHANNEL_COUNT] = [
        Emotion::Joy,
        Emotion::Fear,
        Emotion::Disgust,
        Emotion::Sadness,
        Emotion::Anger,
        Emotion::Surprise,
        Emotion::Contempt,
        Emotion::Valence,
        Emotion::Engagement,
    ];

    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Emotion::Joy => "Joy",
            Emotion::Fear => "Fear",
            Emotion::Disgust => "Disgust",
            Emotion::Sadness => "Sadness",
            Emotion::Anger => "Anger",
            Emotion::Surprise => "Surprise",
            Emotion::Contempt => "Contempt",
            Emotion::Valence => "Valence",
            Emotion::Engagement => "Engagement",
        }
    }
}

/// One tick's reading across all channels
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct EmotionSample {
    pub values: [f32; CHANNEL_COUNT],
}

impl EmotionSample {
    pub fn new(values: [f32; CHANNEL_COUNT]) -> Self {
        Self { values }
    }

    /// Build a sample from (channel, value) pairs; unspecified channels read 0
    pub fn from_pairs(pairs: impl IntoIterator<Item = (Emotion, f32)>) -> Self {
        let mut sample = Self::default();
        for (emotion, value) in pairs {
            sample.values[emotion.index()] = value;
        }
        sample
    }

    #[inline]
    pub fn get(&self, emotion: Emotion) -> f32 {
        self.values[emotion.index()]
    }
}

/// Samples collected since the last segment boundary
#[derive(Debug, Clone, Default)]
pub struct EmotionBuffer {
    channels: [Vec<f32>; CHANNEL_COUNT],
}

impl EmotionBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, sample: &EmotionSample) {
        for (channel, value) in self.channels.iter_mut().zip(sample.values) {
            channel.push(value);
        }
    }

    /// Number of samples recorded for a channel
    pub fn len(&self, emotion: Emotion) -> usize {
        self.channels[emotion.index()].len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.iter().all(Vec::is_empty)
    }

    /// Mean of one channel (0 when empty)
    pub fn mean(&self, emotion: Emotion) -> f32 {
        let channel = &self.channels[emotion.index()];
        if channel.is_empty() {
            0.0
        } else {
            channel.iter().sum::<f32>() / channel.len() as f32
        }
    }

    /// Per-channel means, in channel order
    pub fn means(&self) -> [f32; CHANNEL_COUNT] {
        Emotion::ALL.map(|e| self.mean(e))
    }

    pub fn clear(&mut self) {
        for channel in &mut self.channels {
            channel.clear();
        }
    }
}
