//! Human-readable row rendering for diagnostics.

use alloc::format;
use alloc::string::String;
use alloc::vec::Vec;

use crate::pattern::Cell;
use crate::song::Song;

const NOTE_NAMES: [&str; 12] = [
    "C-", "C#", "D-", "D#", "E-", "F-", "F#", "G-", "G#", "A-", "A#", "B-",
];

/// Amiga periods for octaves 3 to 7.
const PERIOD_TABLE: [u16; 60] = [
    1712, 1616, 1525, 1440, 1357, 1281, 1209, 1141, 1077, 1017, 961, 907, // octave 3
    856, 808, 762, 720, 678, 640, 604, 570, 538, 508, 480, 453, // octave 4
    428, 404, 381, 360, 339, 320, 302, 285, 269, 254, 240, 226, // octave 5
    214, 202, 190, 180, 170, 160, 151, 143, 135, 127, 120, 113, // octave 6
    107, 101, 95, 90, 85, 80, 76, 71, 67, 64, 60, 57, // octave 7
];

/// Note name for an Amiga period: `---` when absent, `???` when not in the table.
pub fn period_name(period: u16) -> String {
    if period == 0 {
        return String::from("---");
    }
    match PERIOD_TABLE.iter().position(|&p| p == period) {
        Some(index) => format!("{}{}", NOTE_NAMES[index % 12], index / 12 + 3),
        None => String::from("???"),
    }
}

pub fn format_instrument(instrument: u8) -> String {
    if instrument > 0 {
        format!("{:02}", instrument % 100)
    } else {
        String::from("--")
    }
}

/// Effect letter followed by the two-digit hex value; `---` if either is missing.
pub fn format_effect(cell: &Cell) -> String {
    match cell.effect {
        Some(tag) if cell.effect_value != 0 => format!("{}{:02X}", tag.code, cell.effect_value),
        _ => String::from("---"),
    }
}

pub fn format_cell(cell: &Cell) -> String {
    format!(
        "{} {} {}",
        period_name(cell.period),
        format_instrument(cell.instrument),
        format_effect(cell),
    )
}

/// Render one row of the song, channels separated by ` | `.
///
/// Returns `None` when the position or row does not exist.
pub fn row_to_string(song: &Song, position: u16, row: u16) -> Option<String> {
    let cells = song.pattern_at(position)?.row(row)?;
    let rendered: Vec<String> = cells.iter().map(format_cell).collect();
    Some(rendered.join(" | "))
}
