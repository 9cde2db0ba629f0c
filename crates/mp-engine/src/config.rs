//! Playback tuning knobs.

/// Scheduler configuration.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct PlaybackConfig {
    /// Seconds of audio kept scheduled ahead of the device clock
    pub lookahead: f64,
    /// Seconds between lookahead refills
    pub refill_interval: f64,
    /// Voice gain at full volume (gain = volume / 64 * gain_scale)
    pub gain_scale: f32,
    /// Use the PAL Amiga clock instead of NTSC for pitch conversion
    pub pal: bool,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            lookahead: 10.0,
            refill_interval: 5.0,
            gain_scale: 0.5,
            pal: false,
        }
    }
}

impl PlaybackConfig {
    /// Device gain for a channel volume in 0..=64.
    pub fn gain(&self, volume: f64) -> f32 {
        (volume.clamp(0.0, 64.0) / 64.0) as f32 * self.gain_scale
    }
}
