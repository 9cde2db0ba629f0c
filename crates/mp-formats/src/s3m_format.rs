//! ScreamTracker 3 modules. Detected, not decoded.

use mp_ir::{ModuleFormat, Song};

use crate::FormatError;

pub fn load_s3m(_data: &[u8]) -> Result<Song, FormatError> {
    Err(FormatError::NotImplemented(ModuleFormat::S3m))
}
