//! Audio device interface.
//!
//! The engine never touches PCM after decode. It hands sample buffers to a
//! device as voices and drives them with time-stamped start/stop and
//! step automation of gain and pitch. Times are seconds on the device's
//! own monotonic clock.

use std::fmt::Debug;
use std::hash::Hash;
use std::ops::Range;
use std::sync::Arc;

use crate::voice_end::VoiceEndSender;

/// Everything a device needs to create a voice.
#[derive(Clone, Debug)]
pub struct VoiceSpec {
    /// Mono PCM in [-1, 1]
    pub pcm: Arc<[f32]>,
    /// Rate the buffer is declared at; pitch is a multiplier on top of this
    pub sample_rate: u32,
    /// Loop region in frames, if the voice loops
    pub loop_range: Option<Range<usize>>,
}

/// A monotonic time source in seconds.
pub trait Clock: Send + Sync {
    fn now(&self) -> f64;
}

/// An output device that plays voices on its own clock.
pub trait AudioDevice: Send {
    /// Handle to a created voice.
    type Voice: Copy + Eq + Hash + Debug + Send + 'static;

    /// Cloneable handle to the device clock, readable from any thread.
    type Clock: Clock + Clone + 'static;

    /// Output sample rate in Hz.
    fn sample_rate(&self) -> u32;

    /// Current device time in seconds.
    fn now(&self) -> f64;

    /// Handle to the clock behind [`AudioDevice::now`].
    fn clock(&self) -> Self::Clock;

    /// Create a voice for a sample buffer. The voice is silent until started.
    fn create_voice(&mut self, spec: VoiceSpec) -> Self::Voice;

    /// Start the voice at `at`.
    fn start(&mut self, voice: Self::Voice, at: f64);

    /// Stop the voice at `at`. Stopping an already finished voice is a no-op.
    fn stop(&mut self, voice: Self::Voice, at: f64);

    /// Step the voice gain (0..=1) at `at`.
    fn schedule_gain(&mut self, voice: Self::Voice, gain: f32, at: f64);

    /// Step the voice playback-rate multiplier at `at`.
    fn schedule_pitch(&mut self, voice: Self::Voice, rate: f64, at: f64);

    /// Register where finished voices are reported.
    fn on_voice_ended(&mut self, sender: VoiceEndSender<Self::Voice>);
}
