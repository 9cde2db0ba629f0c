//! Format detection by magic bytes.
//!
//! Each detector peeks at a fixed offset and rewinds the reader. Detection
//! order is fixed: IT, XM, S3M, then MOD as the fallback.

use binrw::Endian;
use mp_ir::ModuleFormat;

use crate::reader::BinaryReader;
use crate::FormatError;

const IT_MAGIC: &[u8] = b"IMPM";
const XM_MAGIC: &[u8] = b"extended module: ";
const S3M_MAGIC: &[u8] = b"SCRM";
const S3M_MAGIC_OFFSET: usize = 0x2C;

fn magic_at(r: &mut BinaryReader, offset: usize, len: usize) -> Option<Vec<u8>> {
    r.seek(offset);
    let bytes = r.read_bytes(len).ok().map(<[u8]>::to_vec);
    r.rewind();
    bytes
}

/// "IMPM" at offset 0.
pub fn is_it(r: &mut BinaryReader) -> bool {
    magic_at(r, 0, IT_MAGIC.len()).is_some_and(|m| m == IT_MAGIC)
}

/// "extended module: " at offset 0, any case.
pub fn is_xm(r: &mut BinaryReader) -> bool {
    magic_at(r, 0, XM_MAGIC.len()).is_some_and(|m| m.eq_ignore_ascii_case(XM_MAGIC))
}

/// "SCRM" at offset 0x2C.
pub fn is_s3m(r: &mut BinaryReader) -> bool {
    magic_at(r, S3M_MAGIC_OFFSET, S3M_MAGIC.len()).is_some_and(|m| m == S3M_MAGIC)
}

/// MOD has no reliable magic, so anything is accepted.
pub fn is_mod(r: &mut BinaryReader) -> bool {
    r.rewind();
    true
}

/// Pick the decoder for `data`.
pub fn detect_format(data: &[u8]) -> Result<ModuleFormat, FormatError> {
    let mut r = BinaryReader::with_endian(data, Endian::Big);
    let detectors: [(fn(&mut BinaryReader) -> bool, ModuleFormat); 4] = [
        (is_it, ModuleFormat::It),
        (is_xm, ModuleFormat::Xm),
        (is_s3m, ModuleFormat::S3m),
        (is_mod, ModuleFormat::Mod),
    ];
    detectors
        .iter()
        .find(|(detect, _)| detect(&mut r))
        .map(|&(_, format)| format)
        .ok_or(FormatError::UnrecognizedFormat)
}
