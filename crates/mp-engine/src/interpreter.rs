//! Row effect interpreter.
//!
//! Runs every cell of one row against its channel, triggering voices and
//! emitting effect automation. Global effects (jumps, pattern delay,
//! speed and tempo) are written back to the [`Transport`] or returned in a
//! [`RowOutcome`] for the scheduler to apply after the row.

use mp_ir::{Cell, Effect, Song};
use tracing::debug;

use crate::channel::{ChannelState, RowTiming};
use crate::config::PlaybackConfig;
use crate::device::AudioDevice;

/// Song cursor and timing state the interpreter may change.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Transport {
    /// Position of the row being processed
    pub position: u16,
    /// Row being processed
    pub row: u16,
    /// Ticks per row
    pub speed: u16,
    /// Tempo in BPM
    pub tempo: u16,
}

impl Transport {
    /// Row length in seconds at the current speed and tempo.
    pub fn row_duration(&self) -> f64 {
        row_duration(self.speed, self.tempo)
    }
}

/// Row length in seconds: `2.5 / tempo` per tick.
pub fn row_duration(speed: u16, tempo: u16) -> f64 {
    (2500.0 / tempo.max(1) as f64 * speed.max(1) as f64) / 1000.0
}

/// Where playback continues after a jump or break.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Jump {
    pub position: u16,
    pub row: u16,
}

/// Global effects collected from one row.
#[derive(Clone, Debug, PartialEq)]
pub struct RowOutcome<V> {
    /// Next row to play instead of the following one
    pub jump: Option<Jump>,
    /// Extra row lengths to wait before the next row
    pub delay: u8,
    /// Voices started while processing the row
    pub started: Vec<V>,
}

impl<V> Default for RowOutcome<V> {
    fn default() -> Self {
        Self {
            jump: None,
            delay: 0,
            started: Vec::new(),
        }
    }
}

/// Everything the interpreter reads while processing a row.
pub struct RowContext<'a, D: AudioDevice> {
    pub song: &'a Song,
    pub device: &'a mut D,
    pub config: &'a PlaybackConfig,
    /// Device time the row starts at
    pub start: f64,
}

/// Process every cell of a row.
///
/// The row duration is fixed when the row starts; a speed change earlier
/// in the row changes the tick count seen by later channels.
pub fn process_row<D: AudioDevice>(
    ctx: &mut RowContext<'_, D>,
    cells: &[Cell],
    channels: &mut [ChannelState<D::Voice>],
    transport: &mut Transport,
) -> RowOutcome<D::Voice> {
    let duration = transport.row_duration();
    let mut outcome = RowOutcome::default();

    for (cell, channel) in cells.iter().zip(channels.iter_mut()) {
        let timing = RowTiming {
            start: ctx.start,
            duration,
            ticks: transport.speed,
        };
        process_cell(ctx, cell, channel, transport, timing, &mut outcome);
    }

    outcome
}

fn process_cell<D: AudioDevice>(
    ctx: &mut RowContext<'_, D>,
    cell: &Cell,
    channel: &mut ChannelState<D::Voice>,
    transport: &mut Transport,
    timing: RowTiming,
    outcome: &mut RowOutcome<D::Voice>,
) {
    let note = cell.note.number().map(i32::from);

    if !cell.is_tone_portamento() && (cell.instrument != 0 || note.is_some()) {
        let instrument = (cell.instrument != 0).then_some(cell.instrument);
        if let Some(voice) =
            channel.play_instrument(ctx.device, ctx.song, ctx.config, instrument, note, ctx.start)
        {
            outcome.started.push(voice);
        }
    }

    let Some(effect) = cell.decoded_effect() else {
        return;
    };
    let config = ctx.config;
    let ticks = timing.ticks() as f64;

    match effect {
        Effect::PortaUp(v) => channel.portamento(ctx.device, config, -(v as f64), timing),
        Effect::PortaDown(v) => channel.portamento(ctx.device, config, v as f64, timing),
        Effect::TonePorta(v) => {
            let target = note
                .or_else(|| (channel.target_note != 0).then_some(channel.target_note))
                .or_else(|| (channel.note != 0).then_some(channel.note));
            if let Some(target) = target {
                channel.target_note = target;
                channel.tone_portamento(ctx.device, config, v as f64, target, timing);
            }
        }
        Effect::Vibrato { speed, .. } => channel.vibrato(ctx.device, config, speed, timing),
        Effect::VolumeSlide { up, down } => {
            if (up != 0) == (down != 0) {
                return;
            }
            let delta = if down != 0 { -(down as f64) } else { up as f64 };
            channel.slide_volume(ctx.device, config, delta, timing);
        }
        Effect::PositionJump(position) => {
            outcome.jump = Some(Jump {
                position: position as u16,
                row: 0,
            });
        }
        Effect::SetVolume(volume) => channel.set_volume(ctx.device, config, volume, ctx.start),
        Effect::PatternBreak(row) => {
            let from = outcome.jump.map_or(transport.position, |j| j.position);
            outcome.jump = Some(Jump {
                position: ctx.song.next_position(from),
                row: row.saturating_sub(1) as u16,
            });
        }
        Effect::FineVolumeSlideDown(y) => {
            channel.slide_volume(ctx.device, config, -(y as f64) / ticks, timing);
        }
        Effect::NoteCut(y) => {
            let at = ctx.start + 2.5 / transport.tempo.max(1) as f64 * y as f64;
            channel.cut(ctx.device, at);
        }
        Effect::PatternDelay(y) => outcome.delay = y,
        Effect::SetSpeed(0) => debug!("ignoring speed 0"),
        Effect::SetSpeed(speed) => transport.speed = speed as u16,
        Effect::SetTempo(tempo) => transport.tempo = tempo as u16,
        Effect::UnknownExtended(x) => debug!("unknown extended effect E{:X}", x),
        Effect::Unknown(tag) => debug!("unknown effect {}", tag),
    }
}
