//! Pattern and cell types for tracker sequences.

use alloc::vec::Vec;

use crate::effects::{Effect, EffectTag};

/// XM note value meaning "key off".
pub const NOTE_OFF: u8 = 97;

/// A note value in a pattern cell, in the canonical note-number space.
///
/// Note 1 is C-1 and note 96 is B-8. MOD periods and XM note values are
/// both normalized into this space at decode time.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Note {
    /// No note
    #[default]
    None,
    /// Note on with canonical note number
    On(u8),
    /// Key off (XM note 97). Decoded but not acted upon during playback.
    Off,
}

impl Note {
    /// Get the note number if this is a note on.
    pub const fn number(self) -> Option<u8> {
        match self {
            Note::On(n) => Some(n),
            _ => None,
        }
    }
}

/// One channel's event in one row.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Cell {
    /// Instrument number (0 = none, 1-255 = instrument index + 1)
    pub instrument: u8,
    /// Legacy Amiga period as stored (MOD) or derived from the note (XM); 0 = none
    pub period: u16,
    /// Canonical note
    pub note: Note,
    /// Effect column command, tagged with the format it came from
    pub effect: Option<EffectTag>,
    /// Effect parameter XY
    pub effect_value: u8,
    /// XM volume column (raw)
    pub volume: u8,
}

impl Cell {
    /// Create an empty cell.
    pub const fn empty() -> Self {
        Self {
            instrument: 0,
            period: 0,
            note: Note::None,
            effect: None,
            effect_value: 0,
            volume: 0,
        }
    }

    /// Returns true if the cell is completely empty.
    pub fn is_empty(&self) -> bool {
        *self == Self::empty()
    }

    /// High nibble of the effect value.
    pub const fn effect_x(&self) -> u8 {
        self.effect_value >> 4
    }

    /// Low nibble of the effect value.
    pub const fn effect_y(&self) -> u8 {
        self.effect_value & 0x0F
    }

    /// Decode the effect column into a typed effect.
    pub fn decoded_effect(&self) -> Option<Effect> {
        self.effect.map(|tag| Effect::decode(tag, self.effect_value))
    }

    /// Tone portamento cells slide toward their note instead of triggering it.
    pub fn is_tone_portamento(&self) -> bool {
        self.effect.is_some_and(|tag| tag.code == '3')
    }
}

/// A pattern containing rows of cells across channels.
#[derive(Clone, Debug)]
pub struct Pattern {
    /// Number of rows (64 for MOD, 1-256 for XM)
    pub rows: u16,
    /// Number of channels
    pub channels: u8,
    /// Pattern data, stored row-major: data[row * channels + channel]
    pub data: Vec<Cell>,
}

impl Pattern {
    /// Create a new pattern with empty cells.
    pub fn new(rows: u16, channels: u8) -> Self {
        Self {
            rows,
            channels,
            data: alloc::vec![Cell::empty(); rows as usize * channels as usize],
        }
    }

    /// Get a reference to a cell.
    pub fn cell(&self, row: u16, channel: u8) -> &Cell {
        debug_assert!(row < self.rows);
        debug_assert!(channel < self.channels);
        &self.data[row as usize * self.channels as usize + channel as usize]
    }

    /// Get a mutable reference to a cell.
    pub fn cell_mut(&mut self, row: u16, channel: u8) -> &mut Cell {
        debug_assert!(row < self.rows);
        debug_assert!(channel < self.channels);
        &mut self.data[row as usize * self.channels as usize + channel as usize]
    }

    /// All cells in a row, or `None` past the last row.
    pub fn row(&self, row: u16) -> Option<&[Cell]> {
        if row >= self.rows {
            return None;
        }
        let start = row as usize * self.channels as usize;
        self.data.get(start..start + self.channels as usize)
    }
}
