//! Headless device that records every command it receives.
//!
//! Used by tests, benchmarks and the headless controller. The clock is
//! either driven by hand or follows wall time.

use std::ops::Range;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;
use slotmap::{new_key_type, SlotMap};

use crate::device::{AudioDevice, Clock, VoiceSpec};
use crate::voice_end::VoiceEndSender;

new_key_type! {
    /// Voice handle issued by [`RecordingDevice`].
    pub struct VoiceKey;
}

/// A command as the device received it.
#[derive(Clone, Debug, PartialEq)]
pub enum DeviceCommand {
    Create {
        voice: VoiceKey,
        frames: usize,
        loop_range: Option<Range<usize>>,
    },
    Start { voice: VoiceKey, at: f64 },
    Stop { voice: VoiceKey, at: f64 },
    Gain { voice: VoiceKey, gain: f32, at: f64 },
    Pitch { voice: VoiceKey, rate: f64, at: f64 },
}

impl DeviceCommand {
    pub fn voice(&self) -> VoiceKey {
        match self {
            DeviceCommand::Create { voice, .. }
            | DeviceCommand::Start { voice, .. }
            | DeviceCommand::Stop { voice, .. }
            | DeviceCommand::Gain { voice, .. }
            | DeviceCommand::Pitch { voice, .. } => *voice,
        }
    }
}

/// Hand-driven clock, shareable across threads.
#[derive(Clone, Debug, Default)]
pub struct ManualClock {
    bits: Arc<AtomicU64>,
}

impl ManualClock {
    pub fn new(start: f64) -> Self {
        Self {
            bits: Arc::new(AtomicU64::new(start.to_bits())),
        }
    }

    pub fn now(&self) -> f64 {
        f64::from_bits(self.bits.load(Ordering::Acquire))
    }

    pub fn set(&self, seconds: f64) {
        self.bits.store(seconds.to_bits(), Ordering::Release);
    }

    pub fn advance(&self, seconds: f64) {
        self.set(self.now() + seconds);
    }
}

/// Where a [`RecordingDevice`] takes its time from.
#[derive(Clone, Debug)]
pub enum DeviceClock {
    Manual(ManualClock),
    Realtime(Instant),
}

impl Clock for ManualClock {
    fn now(&self) -> f64 {
        ManualClock::now(self)
    }
}

impl Clock for DeviceClock {
    fn now(&self) -> f64 {
        match self {
            DeviceClock::Manual(clock) => clock.now(),
            DeviceClock::Realtime(epoch) => epoch.elapsed().as_secs_f64(),
        }
    }
}

/// Shared view of the commands a device has received.
#[derive(Clone, Debug, Default)]
pub struct CommandLog {
    commands: Arc<Mutex<Vec<DeviceCommand>>>,
}

impl CommandLog {
    fn push(&self, command: DeviceCommand) {
        self.commands.lock().push(command);
    }

    /// Copy of everything recorded so far.
    pub fn snapshot(&self) -> Vec<DeviceCommand> {
        self.commands.lock().clone()
    }

    pub fn clear(&self) {
        self.commands.lock().clear();
    }

    /// Remove and return everything recorded so far.
    pub fn take(&self) -> Vec<DeviceCommand> {
        std::mem::take(&mut *self.commands.lock())
    }

    pub fn len(&self) -> usize {
        self.commands.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.lock().is_empty()
    }

    /// `(voice, time)` of every start command, in arrival order.
    pub fn starts(&self) -> Vec<(VoiceKey, f64)> {
        self.commands
            .lock()
            .iter()
            .filter_map(|c| match c {
                DeviceCommand::Start { voice, at } => Some((*voice, *at)),
                _ => None,
            })
            .collect()
    }

    /// `(gain, time)` of every gain step sent to `voice`.
    pub fn gains(&self, voice: VoiceKey) -> Vec<(f32, f64)> {
        self.commands
            .lock()
            .iter()
            .filter_map(|c| match c {
                DeviceCommand::Gain { voice: v, gain, at } if *v == voice => Some((*gain, *at)),
                _ => None,
            })
            .collect()
    }

    /// `(rate, time)` of every pitch step sent to `voice`.
    pub fn pitches(&self, voice: VoiceKey) -> Vec<(f64, f64)> {
        self.commands
            .lock()
            .iter()
            .filter_map(|c| match c {
                DeviceCommand::Pitch { voice: v, rate, at } if *v == voice => Some((*rate, *at)),
                _ => None,
            })
            .collect()
    }
}

#[derive(Clone, Debug)]
struct VoiceRecord {
    frames: usize,
    looping: bool,
    /// Pitch in force when the voice starts
    rate: f64,
    started: Option<f64>,
    stopped: Option<f64>,
}

impl VoiceRecord {
    /// Device time the voice falls silent, if it ever does.
    fn end_time(&self, sample_rate: u32) -> Option<f64> {
        let start = self.started?;
        let run_out = if self.looping || !self.rate.is_finite() || self.rate <= 0.0 {
            None
        } else {
            Some(start + self.frames as f64 / (self.rate * sample_rate as f64))
        };
        match (self.stopped, run_out) {
            (Some(stop), Some(end)) => Some(stop.min(end)),
            (stop, end) => stop.or(end),
        }
    }
}

/// Device that plays nothing and remembers everything.
pub struct RecordingDevice {
    sample_rate: u32,
    clock: DeviceClock,
    voices: SlotMap<VoiceKey, VoiceRecord>,
    log: CommandLog,
    ended: Option<VoiceEndSender<VoiceKey>>,
}

impl RecordingDevice {
    /// Device with a manual clock starting at zero.
    pub fn new(sample_rate: u32) -> Self {
        Self::with_clock(sample_rate, DeviceClock::Manual(ManualClock::new(0.0)))
    }

    /// Device whose clock follows wall time from now on.
    pub fn realtime(sample_rate: u32) -> Self {
        Self::with_clock(sample_rate, DeviceClock::Realtime(Instant::now()))
    }

    pub fn with_clock(sample_rate: u32, clock: DeviceClock) -> Self {
        Self {
            sample_rate,
            clock,
            voices: SlotMap::with_key(),
            log: CommandLog::default(),
            ended: None,
        }
    }

    pub fn log(&self) -> CommandLog {
        self.log.clone()
    }

    /// Voices created and not yet finished.
    pub fn live_voices(&self) -> usize {
        self.voices.len()
    }

    /// Frame count of a live voice's buffer.
    pub fn voice_frames(&self, voice: VoiceKey) -> Option<usize> {
        self.voices.get(voice).map(|v| v.frames)
    }

    /// Report every voice whose end time has passed on the device clock.
    ///
    /// A voice ends at its stop time, or once its frames have played at
    /// the pitch it started with. Looping voices only end when stopped.
    /// Returns the number of voices reported.
    pub fn reap_finished(&mut self) -> usize {
        let now = self.clock.now();
        let sample_rate = self.sample_rate;
        let due: Vec<VoiceKey> = self
            .voices
            .iter()
            .filter(|(_, v)| v.end_time(sample_rate).is_some_and(|end| end <= now))
            .map(|(key, _)| key)
            .collect();

        let mut reaped = 0;
        for voice in due {
            if let Some(sender) = self.ended.as_mut() {
                if !sender.notify(voice) {
                    break;
                }
            }
            self.voices.remove(voice);
            reaped += 1;
        }
        reaped
    }

    /// Simulate the device reaching the end of a voice.
    pub fn finish_voice(&mut self, voice: VoiceKey) -> bool {
        if self.voices.remove(voice).is_none() {
            return false;
        }
        if let Some(sender) = self.ended.as_mut() {
            sender.notify(voice);
        }
        true
    }
}

impl AudioDevice for RecordingDevice {
    type Voice = VoiceKey;
    type Clock = DeviceClock;

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn now(&self) -> f64 {
        self.clock.now()
    }

    fn clock(&self) -> DeviceClock {
        self.clock.clone()
    }

    fn create_voice(&mut self, spec: VoiceSpec) -> VoiceKey {
        let frames = spec.pcm.len();
        let voice = self.voices.insert(VoiceRecord {
            frames,
            looping: spec.loop_range.is_some(),
            rate: 1.0,
            started: None,
            stopped: None,
        });
        self.log.push(DeviceCommand::Create {
            voice,
            frames,
            loop_range: spec.loop_range,
        });
        voice
    }

    fn start(&mut self, voice: VoiceKey, at: f64) {
        if let Some(record) = self.voices.get_mut(voice) {
            record.started.get_or_insert(at);
        }
        self.log.push(DeviceCommand::Start { voice, at });
    }

    fn stop(&mut self, voice: VoiceKey, at: f64) {
        if let Some(record) = self.voices.get_mut(voice) {
            let stop = record.stopped.map_or(at, |s| s.min(at));
            record.stopped = Some(stop);
        }
        self.log.push(DeviceCommand::Stop { voice, at });
    }

    fn schedule_gain(&mut self, voice: VoiceKey, gain: f32, at: f64) {
        self.log.push(DeviceCommand::Gain { voice, gain, at });
    }

    fn schedule_pitch(&mut self, voice: VoiceKey, rate: f64, at: f64) {
        if let Some(record) = self.voices.get_mut(voice) {
            if record.started.is_none() {
                record.rate = rate;
            }
        }
        self.log.push(DeviceCommand::Pitch { voice, rate, at });
    }

    fn on_voice_ended(&mut self, sender: VoiceEndSender<VoiceKey>) {
        self.ended = Some(sender);
    }
}
