//! Effect command types for tracker patterns.
//!
//! Cells store the effect as decoded from the file: a format-qualified tag
//! plus the raw XY parameter byte. [`Effect::decode`] maps that pair onto
//! the canonical, format-agnostic command set the scheduler understands.

use core::fmt;

/// Which format's effect numbering a tag belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EffectSpace {
    Mod,
    Xm,
}

impl EffectSpace {
    pub fn as_str(self) -> &'static str {
        match self {
            EffectSpace::Mod => "MOD",
            EffectSpace::Xm => "XM",
        }
    }
}

/// A format-qualified effect identifier, e.g. `MOD:C` or `XM:G`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct EffectTag {
    pub space: EffectSpace,
    /// Effect letter: `0`-`9`, `A`-`F`, and for XM the letters after `F`
    pub code: char,
}

impl EffectTag {
    pub const fn new(space: EffectSpace, code: char) -> Self {
        Self { space, code }
    }

    /// Tag a MOD effect command nibble. Command 0 carries no effect.
    pub fn from_mod_command(command: u8) -> Option<Self> {
        if command == 0 {
            return None;
        }
        hex_digit(command & 0x0F).map(|code| Self::new(EffectSpace::Mod, code))
    }

    /// Tag an XM effect type byte.
    ///
    /// Types up to 0xF use their hex digit; larger types continue the
    /// alphabet after `F` (0x10 = `G`, 0x11 = `H`, ...).
    pub fn from_xm_type(effect_type: u8) -> Self {
        let code = if effect_type <= 0xF {
            hex_digit(effect_type)
        } else {
            char::from_u32('F' as u32 + (effect_type as u32 - 0xF))
        };
        Self::new(EffectSpace::Xm, code.unwrap_or('?'))
    }
}

impl fmt::Display for EffectTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.space.as_str(), self.code)
    }
}

fn hex_digit(value: u8) -> Option<char> {
    char::from_digit(value as u32, 16).map(|c| c.to_ascii_uppercase())
}

/// Canonical effect command, decoded from a tag and its parameter.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Effect {
    /// Slide pitch up by amount (period units) per tick
    PortaUp(u8),
    /// Slide pitch down by amount (period units) per tick
    PortaDown(u8),
    /// Slide toward the remembered target note
    TonePorta(u8),
    /// Vibrato with speed and depth
    Vibrato { speed: u8, depth: u8 },
    /// Volume slide; exactly one nibble must be non-zero to have an effect
    VolumeSlide { up: u8, down: u8 },
    /// Jump to song position
    PositionJump(u8),
    /// Set voice volume (0-64)
    SetVolume(u8),
    /// Break to a row in the next position
    PatternBreak(u8),
    /// Fine volume slide down (spread over the row)
    FineVolumeSlideDown(u8),
    /// Cut the voice after n ticks
    NoteCut(u8),
    /// Repeat the row n extra times
    PatternDelay(u8),
    /// Set ticks per row
    SetSpeed(u8),
    /// Set BPM tempo
    SetTempo(u8),
    /// Extended (`E`) command with an unsupported sub-code
    UnknownExtended(u8),
    /// Any other tag
    Unknown(EffectTag),
}

impl Effect {
    /// Decode a tag and its XY parameter.
    pub fn decode(tag: EffectTag, value: u8) -> Self {
        let x = value >> 4;
        let y = value & 0x0F;
        match tag.code {
            '1' => Effect::PortaUp(value),
            '2' => Effect::PortaDown(value),
            '3' => Effect::TonePorta(value),
            '4' => Effect::Vibrato { speed: x, depth: y },
            'A' => Effect::VolumeSlide { up: x, down: y },
            'B' => Effect::PositionJump(value),
            'C' => Effect::SetVolume(value.min(64)),
            'D' => Effect::PatternBreak(value),
            'E' => match x {
                0xB => Effect::FineVolumeSlideDown(y),
                0xC => Effect::NoteCut(y),
                0xE => Effect::PatternDelay(y),
                other => Effect::UnknownExtended(other),
            },
            'F' => {
                if value <= 0x20 {
                    Effect::SetSpeed(value)
                } else {
                    Effect::SetTempo(value)
                }
            }
            _ => Effect::Unknown(tag),
        }
    }

    /// Returns the variant name as a static string (ignoring parameters).
    pub fn name(&self) -> &'static str {
        match self {
            Effect::PortaUp(_) => "PortaUp",
            Effect::PortaDown(_) => "PortaDown",
            Effect::TonePorta(_) => "TonePorta",
            Effect::Vibrato { .. } => "Vibrato",
            Effect::VolumeSlide { .. } => "VolumeSlide",
            Effect::PositionJump(_) => "PositionJump",
            Effect::SetVolume(_) => "SetVolume",
            Effect::PatternBreak(_) => "PatternBreak",
            Effect::FineVolumeSlideDown(_) => "FineVolumeSlideDown",
            Effect::NoteCut(_) => "NoteCut",
            Effect::PatternDelay(_) => "PatternDelay",
            Effect::SetSpeed(_) => "SetSpeed",
            Effect::SetTempo(_) => "SetTempo",
            Effect::UnknownExtended(_) => "UnknownExtended",
            Effect::Unknown(_) => "Unknown",
        }
    }
}
