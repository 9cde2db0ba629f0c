//! Song structure and sequencing types.

use alloc::string::String;
use alloc::vec::Vec;
use arrayvec::ArrayString;

use crate::instrument::Instrument;
use crate::pattern::Pattern;
use crate::sample::Sample;

/// Fixed-capacity name used for songs, samples and instruments.
pub type Name = ArrayString<48>;

/// Build a [`Name`], dropping characters that do not fit.
pub fn truncated_name(s: &str) -> Name {
    let mut name = Name::new();
    for c in s.chars() {
        if name.try_push(c).is_err() {
            break;
        }
    }
    name
}

/// The file format a song was decoded from.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ModuleFormat {
    #[default]
    Mod,
    Xm,
    S3m,
    It,
}

impl ModuleFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            ModuleFormat::Mod => "MOD",
            ModuleFormat::Xm => "XM",
            ModuleFormat::S3m => "S3M",
            ModuleFormat::It => "IT",
        }
    }
}

impl core::fmt::Display for ModuleFormat {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A complete decoded song.
///
/// Immutable once a decoder hands it out; playback shares it read-only.
#[derive(Clone, Debug)]
pub struct Song {
    /// Song title
    pub title: Name,
    /// Source format
    pub format: ModuleFormat,
    /// Format sub-tag, e.g. the MOD signature `M.K.` (empty when untagged)
    pub sub_format: String,
    /// Tracker that wrote the file (XM)
    pub tracker_name: Name,
    /// Format version (XM)
    pub version: u16,
    /// XM stripped-file marker was 0x00
    pub stripped: bool,
    /// Linear frequency table selected (XM flags bit 0)
    pub linear_frequencies: bool,
    /// Number of channels
    pub channel_count: u8,
    /// Number of playable positions in the pattern table
    pub position_count: u16,
    /// Position to wrap to at song end
    pub restart: u16,
    /// Position -> pattern index
    pub pattern_table: Vec<u8>,
    /// Patterns
    pub patterns: Vec<Pattern>,
    /// Instruments (instrument id `n` lives at index `n - 1`)
    pub instruments: Vec<Instrument>,
    /// Samples
    pub samples: Vec<Sample>,
    /// Initial tempo in BPM
    pub initial_tempo: u16,
    /// Initial speed (ticks per row)
    pub initial_speed: u16,
}

impl Default for Song {
    fn default() -> Self {
        Self {
            title: Name::new(),
            format: ModuleFormat::Mod,
            sub_format: String::new(),
            tracker_name: Name::new(),
            version: 0,
            stripped: false,
            linear_frequencies: false,
            channel_count: 4,
            position_count: 0,
            restart: 0,
            pattern_table: Vec::new(),
            patterns: Vec::new(),
            instruments: Vec::new(),
            samples: Vec::new(),
            initial_tempo: 125,
            initial_speed: 6,
        }
    }
}

impl Song {
    /// Create a new empty song.
    pub fn new(title: &str, format: ModuleFormat) -> Self {
        Self {
            title: truncated_name(title),
            format,
            ..Self::default()
        }
    }

    /// Force `restart < position_count`, falling back to position 0.
    pub fn normalize_restart(&mut self) {
        if self.restart >= self.position_count {
            self.restart = 0;
        }
    }

    /// Pattern played at a song position.
    pub fn pattern_at(&self, position: u16) -> Option<&Pattern> {
        if position >= self.position_count {
            return None;
        }
        let index = *self.pattern_table.get(position as usize)?;
        self.patterns.get(index as usize)
    }

    /// Look up an instrument by its 1-based id.
    pub fn instrument(&self, id: u8) -> Option<&Instrument> {
        (id as usize)
            .checked_sub(1)
            .and_then(|idx| self.instruments.get(idx))
    }

    /// Position following `position`, wrapping to the restart position.
    pub fn next_position(&self, position: u16) -> u16 {
        let next = position.saturating_add(1);
        if next >= self.position_count {
            self.restart
        } else {
            next
        }
    }

    /// Row count of the pattern at a position (0 when the position is invalid).
    pub fn rows_at(&self, position: u16) -> u16 {
        self.pattern_at(position).map_or(0, |p| p.rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::string::ToString;
    use alloc::vec;

    fn two_position_song() -> Song {
        let mut song = Song::new("test", ModuleFormat::Mod);
        song.patterns = vec![Pattern::new(64, 4), Pattern::new(32, 4)];
        song.pattern_table = vec![1, 0];
        song.position_count = 2;
        song
    }

    #[test]
    fn restart_is_clamped() {
        let mut song = two_position_song();
        song.restart = 2;
        song.normalize_restart();
        assert_eq!(song.restart, 0);

        song.restart = 1;
        song.normalize_restart();
        assert_eq!(song.restart, 1);
    }

    #[test]
    fn pattern_at_follows_table() {
        let song = two_position_song();
        assert_eq!(song.pattern_at(0).map(|p| p.rows), Some(32));
        assert_eq!(song.pattern_at(1).map(|p| p.rows), Some(64));
        assert!(song.pattern_at(2).is_none());
        assert_eq!(song.rows_at(5), 0);
    }

    #[test]
    fn next_position_wraps_to_restart() {
        let mut song = two_position_song();
        song.restart = 1;
        assert_eq!(song.next_position(0), 1);
        assert_eq!(song.next_position(1), 1);
        song.restart = 0;
        assert_eq!(song.next_position(1), 0);
    }

    #[test]
    fn instrument_ids_are_one_based() {
        let mut song = Song::default();
        song.instruments.push(Instrument::new(1, "first"));
        assert_eq!(song.instrument(1).map(|i| i.id), Some(1));
        assert!(song.instrument(0).is_none());
        assert!(song.instrument(2).is_none());
    }

    #[test]
    fn long_names_are_truncated() {
        let long = "x".repeat(100);
        assert_eq!(truncated_name(&long).len(), 48);
        assert_eq!(truncated_name("drums").as_str(), "drums");
    }

    #[test]
    fn default_song_uses_tracker_defaults() {
        let song = Song::default();
        assert_eq!(song.initial_tempo, 125);
        assert_eq!(song.initial_speed, 6);
        assert_eq!(song.format.to_string(), "MOD");
    }
}
