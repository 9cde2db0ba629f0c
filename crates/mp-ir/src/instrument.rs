//! Instrument and envelope types.

use alloc::vec::Vec;
use bitflags::bitflags;

use crate::song::Name;

/// Number of notes an XM keymap covers.
pub const KEYMAP_SIZE: usize = 96;

/// An instrument definition.
///
/// MOD instruments are synthesized one per sample and only carry a default
/// sample. XM instruments carry a keymap and the full header; the envelope,
/// vibrato and policy fields are decoded but not consumed by playback.
#[derive(Clone, Debug, Default)]
pub struct Instrument {
    /// 1-based instrument id
    pub id: u16,
    /// Instrument name
    pub name: Name,
    /// Sample used for notes the keymap does not cover (index into `Song::samples`)
    pub default_sample: Option<usize>,
    /// Note (1-based) -> sample index; empty when the instrument has no keymap
    pub keymap: Vec<usize>,
    /// Volume envelope
    pub volume_envelope: Envelope,
    /// Panning envelope
    pub panning_envelope: Envelope,
    /// Auto-vibrato settings
    pub vibrato: AutoVibrato,
    /// Volume fadeout speed (0 = no fade)
    pub fadeout: u16,
    /// What happens when a new note is played on a channel already playing this instrument
    pub new_note_action: NewNoteAction,
    /// Duplicate note checking mode
    pub duplicate_check: DuplicateCheck,
    /// What a duplicate check does to the older voice
    pub duplicate_check_action: DuplicateCheckAction,
}

impl Instrument {
    /// Create a new instrument with default settings.
    pub fn new(id: u16, name: &str) -> Self {
        Self {
            id,
            name: crate::song::truncated_name(name),
            ..Self::default()
        }
    }

    /// Create an instrument that plays a single sample for every note.
    pub fn with_default_sample(id: u16, name: &str, sample_index: usize) -> Self {
        let mut inst = Self::new(id, name);
        inst.default_sample = Some(sample_index);
        inst
    }

    /// Sample index for a note (1-based), falling back to the default sample.
    pub fn sample_for_note(&self, note: u8) -> Option<usize> {
        (note as usize)
            .checked_sub(1)
            .and_then(|idx| self.keymap.get(idx))
            .copied()
            .or(self.default_sample)
    }
}

/// Action when a new note triggers on a channel already playing.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum NewNoteAction {
    /// Cut the previous note immediately
    #[default]
    Cut,
    /// Continue the previous note (background)
    Continue,
    /// Send note-off to previous note
    Off,
    /// Fade out the previous note
    Fade,
}

/// Duplicate note checking mode.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DuplicateCheck {
    #[default]
    Off,
    Note,
    Sample,
    Instrument,
}

/// What happens to a voice caught by the duplicate check.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DuplicateCheckAction {
    #[default]
    Cut,
    Off,
    Fade,
}

bitflags! {
    /// XM envelope type bits.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct EnvelopeFlags: u8 {
        const ON = 0x01;
        const SUSTAIN = 0x02;
        const LOOP = 0x04;
    }
}

/// A volume or panning envelope as stored in an XM instrument header.
///
/// `values` holds the raw 16-bit entries of the point table, truncated to
/// the declared point count.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Envelope {
    pub values: Vec<u16>,
    pub sustain_point: u8,
    pub loop_start: u8,
    pub loop_end: u8,
    pub flags: EnvelopeFlags,
}

impl Envelope {
    /// Create a new empty envelope.
    pub fn new() -> Self {
        Self::default()
    }

    /// Is the envelope enabled?
    pub fn enabled(&self) -> bool {
        self.flags.contains(EnvelopeFlags::ON)
    }
}

/// Auto-vibrato settings for an instrument.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AutoVibrato {
    /// Waveform type (0=sine, 1=square, 2=ramp down, 3=ramp up)
    pub waveform: u8,
    /// Vibrato sweep (ramp-up time)
    pub sweep: u8,
    /// Vibrato depth
    pub depth: u8,
    /// Vibrato rate
    pub rate: u8,
}
