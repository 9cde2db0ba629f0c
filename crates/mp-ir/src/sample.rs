//! Sample data types.

use alloc::sync::Arc;
use core::ops::Range;

use crate::song::Name;

/// A decoded sample.
///
/// PCM is mono, normalized to [-1, 1], and shared so voices can reference it
/// without copying.
#[derive(Clone, Debug)]
pub struct Sample {
    /// 1-based sample id in file order
    pub id: u16,
    /// Sample name
    pub name: Name,
    /// Normalized PCM frames
    pub data: Arc<[f32]>,
    /// Loop start (in frames)
    pub loop_start: u32,
    /// Loop length (in frames, 0 = no loop)
    pub loop_length: u32,
    /// Loop type
    pub loop_type: LoopType,
    /// Default volume (0-64)
    pub volume: u8,
    /// Default panning (0-255)
    pub panning: u8,
    /// Pitch offset in 1/128 semitones
    pub finetune: i32,
    /// Stored bit depth (8 or 16)
    pub bits: u8,
}

impl Default for Sample {
    fn default() -> Self {
        Self {
            id: 0,
            name: Name::new(),
            data: Arc::from(&[] as &[f32]),
            loop_start: 0,
            loop_length: 0,
            loop_type: LoopType::None,
            volume: 64,
            panning: 128,
            finetune: 0,
            bits: 8,
        }
    }
}

impl Sample {
    /// Create a new empty sample.
    pub fn new(id: u16, name: &str) -> Self {
        Self {
            id,
            name: crate::song::truncated_name(name),
            ..Self::default()
        }
    }

    /// Get the length of the sample in frames.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns true if the sample has no data.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Set the loop region, treating lengths of 2 frames or less as no loop.
    pub fn set_loop(&mut self, start: u32, length: u32, loop_type: LoopType) {
        if length <= 2 || loop_type == LoopType::None {
            self.loop_start = start;
            self.loop_length = 0;
            self.loop_type = LoopType::None;
        } else {
            self.loop_start = start;
            self.loop_length = length;
            self.loop_type = loop_type;
        }
    }

    /// Returns true if the sample has a loop.
    pub fn has_loop(&self) -> bool {
        self.loop_length > 0
    }

    /// Loop region in frames, clamped to the decoded data.
    ///
    /// Returns `None` when there is no loop or the clamped region is empty.
    pub fn loop_range(&self) -> Option<Range<usize>> {
        if !self.has_loop() {
            return None;
        }
        let len = self.len();
        let start = (self.loop_start as usize).min(len);
        let end = (self.loop_start as usize + self.loop_length as usize).min(len);
        (start < end).then_some(start..end)
    }
}

/// Sample loop type.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LoopType {
    /// No loop
    #[default]
    None,
    /// Forward loop
    Forward,
    /// Ping-pong (bidirectional) loop; decoded but played as forward
    PingPong,
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;

    fn sample_with_frames(frames: usize) -> Sample {
        let mut sample = Sample::new(1, "test");
        sample.data = Arc::from(vec![0.0f32; frames]);
        sample
    }

    #[test]
    fn short_loops_are_normalized_away() {
        let mut sample = sample_with_frames(100);
        sample.set_loop(10, 2, LoopType::Forward);
        assert!(!sample.has_loop());
        assert_eq!(sample.loop_type, LoopType::None);

        sample.set_loop(10, 3, LoopType::Forward);
        assert!(sample.has_loop());
        assert_eq!(sample.loop_length, 3);
    }

    #[test]
    fn loop_type_none_disables_loop() {
        let mut sample = sample_with_frames(100);
        sample.set_loop(0, 50, LoopType::None);
        assert_eq!(sample.loop_length, 0);
    }

    #[test]
    fn loop_range_clamps_to_data() {
        let mut sample = sample_with_frames(100);
        sample.set_loop(80, 40, LoopType::Forward);
        assert_eq!(sample.loop_range(), Some(80..100));

        sample.set_loop(120, 40, LoopType::Forward);
        assert_eq!(sample.loop_range(), None);
    }

    #[test]
    fn default_sample_is_empty() {
        let sample = Sample::new(3, "kick");
        assert!(sample.is_empty());
        assert_eq!(sample.name.as_str(), "kick");
        assert_eq!(sample.id, 3);
    }
}
