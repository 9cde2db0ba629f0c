//! Impulse Tracker modules. Detected, not decoded.

use mp_ir::{ModuleFormat, Song};

use crate::FormatError;

pub fn load_it(_data: &[u8]) -> Result<Song, FormatError> {
    Err(FormatError::NotImplemented(ModuleFormat::It))
}
