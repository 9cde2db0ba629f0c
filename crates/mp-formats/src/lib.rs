//! Module decoders for modplay.
//!
//! Detects the container format of a byte buffer and decodes MOD and XM
//! files into the [`mp_ir::Song`] IR. S3M and IT files are recognized but
//! not decoded.

mod detect;
mod it_format;
mod mod_format;
mod reader;
mod s3m_format;
#[cfg(any(test, feature = "test-util"))]
pub mod testing;
mod xm_format;

use mp_ir::{ModuleFormat, Song};
use thiserror::Error;
use tracing::debug;

pub use detect::{detect_format, is_it, is_mod, is_s3m, is_xm};
pub use it_format::load_it;
pub use mod_format::load_mod;
pub use reader::{BinaryReader, Scalar};
pub use s3m_format::load_s3m;
pub use xm_format::load_xm;

/// Error type for module decoding.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormatError {
    /// No decoder accepts the data
    #[error("unrecognized module format")]
    UnrecognizedFormat,
    /// The format is detected but has no decoder
    #[error("{0} decoding is not implemented")]
    NotImplemented(ModuleFormat),
    /// Invalid header field
    #[error("malformed header: {0}")]
    MalformedHeader(String),
    /// Pattern row count outside 1..=256
    #[error("pattern has {0} rows, expected 1 to 256")]
    InvalidPatternRows(u16),
    /// Reference to a sample that does not exist
    #[error("invalid sample id {0}")]
    InvalidSampleId(usize),
    /// Reference to an instrument beyond the format limit
    #[error("invalid instrument id {0}")]
    InvalidInstrumentId(usize),
    /// Read past the end of the data
    #[error("buffer underrun: {wanted} bytes wanted at offset {offset} of {len}")]
    BufferUnderrun {
        offset: usize,
        wanted: usize,
        len: usize,
    },
}

/// Detect the format of `data` and decode it.
pub fn load_module(data: &[u8]) -> Result<Song, FormatError> {
    let format = detect_format(data)?;
    debug!(%format, bytes = data.len(), "loading module");
    match format {
        ModuleFormat::It => load_it(data),
        ModuleFormat::Xm => load_xm(data),
        ModuleFormat::S3m => load_s3m(data),
        ModuleFormat::Mod => load_mod(data),
    }
}
