//! Lookahead playback scheduler.
//!
//! Walks the song row by row ahead of the device clock, running the
//! effect interpreter for each row and timestamping every voice command.
//! `start` renders the first lookahead window; after that the owner calls
//! [`Scheduler::poll`] regularly to deliver due notifications and refill
//! the window once per refill interval.

use std::sync::Arc;

use mp_ir::Song;
use tracing::{debug, trace, warn};

use crate::channel::ChannelState;
use crate::config::PlaybackConfig;
use crate::device::AudioDevice;
use crate::events::{EventKind, ListenerFn, ListenerId, Listeners, PlaybackEvent, TimedEvents};
use crate::interpreter::{process_row, Jump, RowContext, Transport};
use crate::row_log::{PositionTracker, ScheduledRowRecord, SharedTracker};
use crate::voice_end::{voice_end_channel, VoiceEndReceiver};

/// Default capacity of the voice-ended queue.
pub const DEFAULT_VOICE_END_CAPACITY: usize = 256;

/// Scheduler run state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PlaybackState {
    Stopped,
    Playing,
}

/// Drives one song against one device.
pub struct Scheduler<D: AudioDevice> {
    song: Arc<Song>,
    device: D,
    config: PlaybackConfig,
    state: PlaybackState,
    channels: Vec<ChannelState<D::Voice>>,
    /// Next row to render
    transport: Transport,
    /// Device time up to which rows have been scheduled
    processed_time: f64,
    next_refill: f64,
    /// The next rendered row enters a position, so it announces one
    new_pass: bool,
    active: Vec<D::Voice>,
    tracker: SharedTracker,
    listeners: Listeners,
    pending: TimedEvents,
    voice_ended: VoiceEndReceiver<D::Voice>,
}

impl<D: AudioDevice> Scheduler<D> {
    pub fn new(song: Arc<Song>, device: D, config: PlaybackConfig) -> Self {
        Self::with_voice_end_capacity(song, device, config, DEFAULT_VOICE_END_CAPACITY)
    }

    pub fn with_voice_end_capacity(
        song: Arc<Song>,
        mut device: D,
        config: PlaybackConfig,
        capacity: usize,
    ) -> Self {
        let (sender, voice_ended) = voice_end_channel(capacity);
        device.on_voice_ended(sender);

        let transport = Transport {
            position: 0,
            row: 0,
            speed: song.initial_speed.max(1),
            tempo: song.initial_tempo.max(1),
        };
        let mut scheduler = Self {
            channels: (0..song.channel_count).map(|_| ChannelState::new()).collect(),
            song,
            device,
            config,
            state: PlaybackState::Stopped,
            transport,
            processed_time: 0.0,
            next_refill: 0.0,
            new_pass: true,
            active: Vec::new(),
            tracker: SharedTracker::default(),
            listeners: Listeners::new(),
            pending: TimedEvents::new(),
            voice_ended,
        };
        scheduler.publish_idle();
        scheduler
    }

    pub fn song(&self) -> &Arc<Song> {
        &self.song
    }

    pub fn config(&self) -> &PlaybackConfig {
        &self.config
    }

    pub fn device(&self) -> &D {
        &self.device
    }

    pub fn device_mut(&mut self) -> &mut D {
        &mut self.device
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn is_playing(&self) -> bool {
        self.state == PlaybackState::Playing
    }

    /// Voices started and not yet reported finished or stopped.
    pub fn active_voices(&self) -> usize {
        self.active.len()
    }

    /// Device time up to which rows are scheduled.
    pub fn processed_time(&self) -> f64 {
        self.processed_time
    }

    /// Thread-safe handle answering "what is playing now".
    pub fn tracker(&self) -> PositionTracker<D::Clock> {
        PositionTracker::new(self.tracker.clone(), self.device.clock())
    }

    /// `(position, row)` audible now.
    pub fn current_position(&self) -> (u16, u16) {
        self.tracker().position()
    }

    pub fn current_speed(&self) -> u16 {
        self.tracker().speed()
    }

    pub fn current_tempo(&self) -> u16 {
        self.tracker().tempo()
    }

    pub fn add_listener(&mut self, kind: EventKind, callback: ListenerFn) -> ListenerId {
        self.listeners.add(kind, callback)
    }

    pub fn remove_listener(&mut self, id: ListenerId) -> bool {
        self.listeners.remove(id)
    }

    /// Start playback from the cursor. No-op while playing.
    pub fn start(&mut self) {
        if self.is_playing() {
            return;
        }
        let now = self.device.now();
        debug!(
            position = self.transport.position,
            row = self.transport.row,
            "starting playback"
        );
        self.state = PlaybackState::Playing;
        self.processed_time = now;
        self.next_refill = now + self.config.refill_interval;
        self.new_pass = true;
        self.render();
    }

    /// Stop playback, silencing every voice. No-op while stopped.
    ///
    /// The cursor rewinds to the row audible at the time of the call, so a
    /// later `start` resumes from there.
    pub fn stop(&mut self) {
        if !self.is_playing() {
            return;
        }
        let now = self.device.now();
        self.drain_voice_ended();
        self.pending.clear();

        debug!(voices = self.active.len(), "stopping playback");
        for voice in self.active.drain(..) {
            self.device.stop(voice, now);
        }
        for channel in &mut self.channels {
            channel.release_voice();
        }

        let audible = self.tracker.read().log.at(now).copied();
        if let Some(record) = audible {
            self.transport = Transport {
                position: record.position,
                row: record.row,
                speed: record.speed,
                tempo: record.tempo,
            };
        }
        self.tracker.write().log.clear();
        self.state = PlaybackState::Stopped;
        self.publish_idle();
    }

    /// Stop and swap in another song, rewinding to its first position.
    ///
    /// Listeners stay registered.
    pub fn replace_song(&mut self, song: Arc<Song>) {
        self.stop();
        self.channels = (0..song.channel_count).map(|_| ChannelState::new()).collect();
        self.transport = Transport {
            position: 0,
            row: 0,
            speed: song.initial_speed.max(1),
            tempo: song.initial_tempo.max(1),
        };
        self.song = song;
        self.new_pass = true;
        self.publish_idle();
    }

    /// Move the cursor to the start of `position`.
    ///
    /// Playback restarts at the new position only if it was playing.
    pub fn seek(&mut self, position: u16) {
        let was_playing = self.is_playing();
        self.stop();

        self.transport.position = if position < self.song.position_count {
            position
        } else {
            warn!(position, "seek past the last position, rewinding to 0");
            0
        };
        self.transport.row = 0;
        self.new_pass = true;
        self.publish_idle();

        if was_playing {
            self.start();
        }
    }

    /// Deliver due notifications and refill the lookahead when the refill
    /// interval has elapsed. Call regularly while playing.
    pub fn poll(&mut self) {
        self.drain_voice_ended();
        if !self.is_playing() {
            return;
        }

        let now = self.device.now();
        for event in self.pending.pop_until(now) {
            self.listeners.dispatch(&event);
        }

        if now >= self.next_refill {
            self.render();
            while self.next_refill <= now {
                self.next_refill += self.config.refill_interval.max(f64::EPSILON);
            }
        }
    }

    /// Schedule rows until the lookahead window past the device clock is full.
    pub fn render(&mut self) {
        let now = self.device.now();
        self.tracker.write().log.trim(now);

        let horizon = now + self.config.lookahead;
        while self.processed_time < horizon {
            if !self.render_row(now) {
                break;
            }
        }
    }

    fn render_row(&mut self, now: f64) -> bool {
        let song = self.song.clone();
        let Transport { position, row, .. } = self.transport;
        let Some(pattern) = song.pattern_at(position) else {
            warn!(position, "no pattern at position, nothing to schedule");
            return false;
        };
        let Some(cells) = pattern.row(row) else {
            warn!(position, row, "row past the end of its pattern");
            self.transport.row = 0;
            return pattern.rows > 0;
        };

        let start = self.processed_time;
        self.listeners.dispatch(&PlaybackEvent {
            kind: EventKind::RowRender,
            position,
            row,
            time: start,
        });

        self.tracker.write().log.push(ScheduledRowRecord {
            time: start,
            position,
            row,
            speed: self.transport.speed,
            tempo: self.transport.tempo,
        });

        let mut ctx = RowContext {
            song: &song,
            device: &mut self.device,
            config: &self.config,
            start,
        };
        let outcome = process_row(&mut ctx, cells, &mut self.channels, &mut self.transport);
        self.active.extend(outcome.started);

        let advance = self.transport.row_duration() * (1.0 + outcome.delay as f64);
        if !(advance.is_finite() && advance > 0.0) {
            warn!(advance, "row has no duration, halting render");
            return false;
        }
        self.processed_time += advance;
        trace!(position, row, start, "row scheduled");

        let entered = std::mem::replace(&mut self.new_pass, false);
        self.advance_cursor(outcome.jump);

        if entered {
            self.emit_timed(EventKind::PositionPlay, position, row, start, now);
        }
        self.emit_timed(EventKind::RowPlay, position, row, start, now);
        true
    }

    fn advance_cursor(&mut self, jump: Option<Jump>) {
        let song = &self.song;
        match jump {
            Some(Jump { position, row }) => {
                let position = if position < song.position_count {
                    position
                } else {
                    song.restart
                };
                let row = if row < song.rows_at(position) { row } else { 0 };
                self.transport.position = position;
                self.transport.row = row;
                self.new_pass = true;
            }
            None => {
                let next = self.transport.row + 1;
                if next >= song.rows_at(self.transport.position) {
                    self.transport.row = 0;
                    self.transport.position = song.next_position(self.transport.position);
                    self.new_pass = true;
                } else {
                    self.transport.row = next;
                }
            }
        }
    }

    fn emit_timed(&mut self, kind: EventKind, position: u16, row: u16, time: f64, now: f64) {
        let event = PlaybackEvent { kind, position, row, time };
        if time <= now {
            self.listeners.dispatch(&event);
        } else {
            self.pending.push(event);
        }
    }

    fn drain_voice_ended(&mut self) {
        let active = &mut self.active;
        let channels = &mut self.channels;
        self.voice_ended.drain(|voice| {
            active.retain(|v| *v != voice);
            for channel in channels.iter_mut() {
                channel.voice_ended(voice);
            }
        });
    }

    fn publish_idle(&mut self) {
        self.tracker.write().idle = ScheduledRowRecord {
            time: self.device.now(),
            position: self.transport.position,
            row: self.transport.row,
            speed: self.transport.speed,
            tempo: self.transport.tempo,
        };
    }
}

impl<D: AudioDevice> Drop for Scheduler<D> {
    fn drop(&mut self) {
        self.stop();
    }
}
