//! Per-channel voice state.
//!
//! Each method turns one effect into step automation on the channel's
//! active voice, spread over the ticks of the row being rendered.

use std::f64::consts::TAU;

use mp_ir::Song;

use crate::config::PlaybackConfig;
use crate::device::{AudioDevice, VoiceSpec};
use crate::frequency::{note_to_period, note_to_playback_rate, period_to_note};

/// Timing of the row being rendered.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RowTiming {
    /// Device time the row starts at
    pub start: f64,
    /// Row length in seconds
    pub duration: f64,
    /// Ticks in the row (the current speed)
    pub ticks: u16,
}

impl RowTiming {
    pub fn ticks(&self) -> u16 {
        self.ticks.max(1)
    }

    /// Device time of a tick boundary; tick 0 is the row start.
    pub fn tick_time(&self, tick: u16) -> f64 {
        self.start + self.duration / self.ticks() as f64 * tick as f64
    }
}

/// Playback state for one tracker channel.
#[derive(Clone, Debug)]
pub struct ChannelState<V> {
    /// Last instrument played (1-based id)
    pub instrument: u8,
    /// Current note (0 = none)
    pub note: i32,
    /// Remembered tone portamento target (0 = none)
    pub target_note: i32,
    /// Finetune of the playing sample, in semitones
    pub finetune: f64,
    /// Voice volume (0-64)
    pub voice_volume: f64,
    /// Currently playing voice
    pub voice: Option<V>,
}

impl<V> Default for ChannelState<V> {
    fn default() -> Self {
        Self {
            instrument: 0,
            note: 0,
            target_note: 0,
            finetune: 0.0,
            voice_volume: 0.0,
            voice: None,
        }
    }
}

impl<V: Copy + PartialEq> ChannelState<V> {
    pub fn new() -> Self {
        Self::default()
    }

    fn playback_rate<D: AudioDevice<Voice = V>>(
        &self,
        device: &D,
        config: &PlaybackConfig,
        note: f64,
    ) -> f64 {
        note_to_playback_rate(note + self.finetune, config.pal, device.sample_rate() as f64)
    }

    /// Start a new voice.
    ///
    /// `instrument` and `note` fall back to the ones remembered by the
    /// channel. Any voice already playing is stopped at `at`. Returns the
    /// new voice, or `None` when there is nothing playable.
    pub fn play_instrument<D: AudioDevice<Voice = V>>(
        &mut self,
        device: &mut D,
        song: &Song,
        config: &PlaybackConfig,
        instrument: Option<u8>,
        note: Option<i32>,
        at: f64,
    ) -> Option<V> {
        if let Some(id) = instrument.filter(|&id| id != 0) {
            self.instrument = id;
        }
        if let Some(n) = note.filter(|&n| n != 0) {
            self.note = n;
        }
        if self.instrument == 0 || self.note == 0 {
            return None;
        }

        let inst = song.instrument(self.instrument)?;
        let sample_index = u8::try_from(self.note)
            .ok()
            .and_then(|n| inst.sample_for_note(n))
            .or(inst.default_sample)?;
        let sample = song.samples.get(sample_index)?;

        if let Some(previous) = self.voice.take() {
            device.stop(previous, at);
        }
        if sample.is_empty() {
            return None;
        }

        self.voice_volume = sample.volume.min(64) as f64;
        self.finetune = sample.finetune as f64 / 128.0;

        let voice = device.create_voice(VoiceSpec {
            pcm: sample.data.clone(),
            sample_rate: device.sample_rate(),
            loop_range: sample.loop_range(),
        });
        let rate = self.playback_rate(device, config, self.note as f64);
        device.schedule_pitch(voice, rate, at);
        device.schedule_gain(voice, config.gain(self.voice_volume), at);
        device.start(voice, at);

        self.voice = Some(voice);
        Some(voice)
    }

    /// Slide the period by `delta` on every tick of the row.
    pub fn portamento<D: AudioDevice<Voice = V>>(
        &mut self,
        device: &mut D,
        config: &PlaybackConfig,
        delta: f64,
        timing: RowTiming,
    ) {
        let Some(voice) = self.voice else { return };
        let mut period = note_to_period(self.note as f64);

        for tick in 1..=timing.ticks() {
            period += delta;
            if let Some(note) = period_to_note(period) {
                self.note = note;
            }
            let rate = self.playback_rate(device, config, self.note as f64);
            device.schedule_pitch(voice, rate, timing.tick_time(tick));
        }
    }

    /// Slide toward `target`, moving `speed` period units over the row.
    ///
    /// The direction follows the target; the slide snaps to the target
    /// and stops as soon as it would overshoot.
    pub fn tone_portamento<D: AudioDevice<Voice = V>>(
        &mut self,
        device: &mut D,
        config: &PlaybackConfig,
        speed: f64,
        target: i32,
        timing: RowTiming,
    ) {
        let Some(voice) = self.voice else { return };
        if self.note == target {
            return;
        }

        let mut delta = speed;
        if (target > self.note && delta > 0.0) || (target < self.note && delta < 0.0) {
            delta = -delta;
        }
        delta /= timing.ticks() as f64;

        let mut period = note_to_period(self.note as f64);
        for tick in 1..=timing.ticks() {
            period += delta;
            let overshoot = match period_to_note(period) {
                Some(note) => {
                    self.note = note;
                    (delta > 0.0 && note < target) || (delta < 0.0 && note > target)
                }
                None => true,
            };
            if overshoot {
                self.note = target;
            }

            let rate = self.playback_rate(device, config, self.note as f64);
            device.schedule_pitch(voice, rate, timing.tick_time(tick));
            if overshoot {
                break;
            }
        }
    }

    /// Sinusoidal pitch wobble around the current note.
    ///
    /// Only the speed shapes the curve; the swing is one semitone.
    pub fn vibrato<D: AudioDevice<Voice = V>>(
        &mut self,
        device: &mut D,
        config: &PlaybackConfig,
        speed: u8,
        timing: RowTiming,
    ) {
        let Some(voice) = self.voice else { return };
        let ticks = timing.ticks() as f64;
        let mul = (speed as f64 * ticks) / 64.0 / 16.0;

        for tick in 1..=timing.ticks() {
            let note = self.note as f64 + (tick as f64 / ticks * TAU * mul).sin();
            let rate = self.playback_rate(device, config, note);
            device.schedule_pitch(voice, rate, timing.tick_time(tick));
        }
    }

    /// Change the voice volume by `delta` on every tick, clamped to 0..=64.
    pub fn slide_volume<D: AudioDevice<Voice = V>>(
        &mut self,
        device: &mut D,
        config: &PlaybackConfig,
        delta: f64,
        timing: RowTiming,
    ) {
        let Some(voice) = self.voice else { return };

        for tick in 1..=timing.ticks() {
            self.voice_volume = (self.voice_volume + delta).clamp(0.0, 64.0);
            device.schedule_gain(voice, config.gain(self.voice_volume), timing.tick_time(tick));
        }
        self.voice_volume = self.voice_volume.round();
    }

    /// Set the voice volume at `at`.
    pub fn set_volume<D: AudioDevice<Voice = V>>(
        &mut self,
        device: &mut D,
        config: &PlaybackConfig,
        volume: u8,
        at: f64,
    ) {
        let Some(voice) = self.voice else { return };
        self.voice_volume = volume.min(64) as f64;
        device.schedule_gain(voice, config.gain(self.voice_volume), at);
    }

    /// Silence the voice at `at` without releasing it.
    pub fn cut<D: AudioDevice<Voice = V>>(&mut self, device: &mut D, at: f64) {
        if let Some(voice) = self.voice {
            device.schedule_gain(voice, 0.0, at);
        }
    }

    /// Forget the voice if the device reports it finished.
    pub fn voice_ended(&mut self, voice: V) {
        if self.voice == Some(voice) {
            self.voice = None;
        }
    }

    /// Drop the voice handle; the caller is responsible for stopping it.
    pub fn release_voice(&mut self) -> Option<V> {
        self.voice.take()
    }
}
