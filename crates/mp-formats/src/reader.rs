//! Bounds-checked cursor over module bytes.

use std::io::Cursor;

use binrw::{BinReaderExt, BinResult, Endian};

use crate::FormatError;

/// Fixed-size integers the reader can decode.
pub trait Scalar: Sized {
    const SIZE: usize;

    fn read_from(cursor: &mut Cursor<&[u8]>, endian: Endian) -> BinResult<Self>;
}

macro_rules! impl_scalar {
    ($($t:ty),*) => {
        $(
            impl Scalar for $t {
                const SIZE: usize = std::mem::size_of::<$t>();

                fn read_from(cursor: &mut Cursor<&[u8]>, endian: Endian) -> BinResult<Self> {
                    cursor.read_type::<$t>(endian)
                }
            }
        )*
    };
}

impl_scalar!(u8, i8, u16, i16, u32, i32);

/// Cursor over a byte buffer with typed reads in a default byte order.
///
/// Every read either succeeds completely or leaves the cursor where it was
/// and reports [`FormatError::BufferUnderrun`].
#[derive(Clone, Debug)]
pub struct BinaryReader<'a> {
    cursor: Cursor<&'a [u8]>,
    endian: Endian,
}

impl<'a> BinaryReader<'a> {
    /// Big-endian reader positioned at offset 0.
    pub fn new(data: &'a [u8]) -> Self {
        Self::with_endian(data, Endian::Big)
    }

    pub fn with_endian(data: &'a [u8], endian: Endian) -> Self {
        Self {
            cursor: Cursor::new(data),
            endian,
        }
    }

    pub fn endian(&self) -> Endian {
        self.endian
    }

    pub fn set_endian(&mut self, endian: Endian) {
        self.endian = endian;
    }

    pub fn len(&self) -> usize {
        self.cursor.get_ref().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Current offset.
    pub fn tell(&self) -> usize {
        self.cursor.position() as usize
    }

    /// Bytes left after the cursor.
    pub fn remaining(&self) -> usize {
        self.len().saturating_sub(self.tell())
    }

    /// Move to an absolute offset. Seeking past the end is allowed; the
    /// next read fails.
    pub fn seek(&mut self, offset: usize) {
        self.cursor.set_position(offset as u64);
    }

    pub fn rewind(&mut self) {
        self.seek(0);
    }

    /// Advance by `n` bytes.
    pub fn skip(&mut self, n: usize) -> Result<(), FormatError> {
        self.ensure(n)?;
        self.seek(self.tell() + n);
        Ok(())
    }

    /// Read a scalar in the reader's byte order.
    pub fn read<T: Scalar>(&mut self) -> Result<T, FormatError> {
        self.read_with(self.endian)
    }

    /// Read a scalar in an explicit byte order.
    pub fn read_with<T: Scalar>(&mut self, endian: Endian) -> Result<T, FormatError> {
        let offset = self.tell();
        self.ensure(T::SIZE)?;
        match T::read_from(&mut self.cursor, endian) {
            Ok(value) => Ok(value),
            Err(_) => {
                self.seek(offset);
                Err(self.underrun(offset, T::SIZE))
            }
        }
    }

    /// Read a scalar without moving the cursor.
    pub fn peek<T: Scalar>(&mut self) -> Result<T, FormatError> {
        let offset = self.tell();
        let value = self.read::<T>();
        self.seek(offset);
        value
    }

    /// Borrow the next `n` bytes.
    pub fn read_bytes(&mut self, n: usize) -> Result<&'a [u8], FormatError> {
        self.ensure(n)?;
        let start = self.tell();
        let data: &'a [u8] = *self.cursor.get_ref();
        self.seek(start + n);
        Ok(&data[start..start + n])
    }

    /// Read an `n`-byte string.
    ///
    /// All `n` bytes are consumed. NUL bytes are dropped wherever they
    /// appear; other bytes map to Latin-1 characters.
    pub fn read_string(&mut self, n: usize) -> Result<String, FormatError> {
        let bytes = self.read_bytes(n)?;
        Ok(bytes
            .iter()
            .filter(|&&b| b != 0)
            .map(|&b| char::from(b))
            .collect())
    }

    fn ensure(&self, wanted: usize) -> Result<(), FormatError> {
        let offset = self.tell();
        if offset.checked_add(wanted).is_some_and(|end| end <= self.len()) {
            Ok(())
        } else {
            Err(self.underrun(offset, wanted))
        }
    }

    fn underrun(&self, offset: usize, wanted: usize) -> FormatError {
        FormatError::BufferUnderrun {
            offset,
            wanted,
            len: self.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_in_default_and_explicit_order() {
        let data = [0x12, 0x34, 0x56, 0x78];
        let mut r = BinaryReader::new(&data);
        assert_eq!(r.read::<u16>().unwrap(), 0x1234);
        assert_eq!(r.read_with::<u16>(Endian::Little).unwrap(), 0x7856);
        assert_eq!(r.tell(), 4);

        let mut r = BinaryReader::with_endian(&data, Endian::Little);
        assert_eq!(r.read::<u32>().unwrap(), 0x7856_3412);
    }

    #[test]
    fn signed_reads() {
        let data = [0xFF, 0x80, 0x00];
        let mut r = BinaryReader::new(&data);
        assert_eq!(r.read::<i8>().unwrap(), -1);
        assert_eq!(r.read::<i16>().unwrap(), -32768);
    }

    #[test]
    fn peek_does_not_advance() {
        let data = [1, 2, 3];
        let mut r = BinaryReader::new(&data);
        r.skip(1).unwrap();
        assert_eq!(r.peek::<u8>().unwrap(), 2);
        assert_eq!(r.tell(), 1);
    }

    #[test]
    fn underrun_leaves_cursor() {
        let data = [1, 2, 3];
        let mut r = BinaryReader::new(&data);
        r.skip(2).unwrap();
        assert_eq!(
            r.read::<u16>(),
            Err(FormatError::BufferUnderrun { offset: 2, wanted: 2, len: 3 })
        );
        assert_eq!(r.tell(), 2);
        assert!(r.skip(2).is_err());
        r.seek(10);
        assert!(r.read::<u8>().is_err());
    }

    #[test]
    fn strings_consume_all_bytes_and_drop_nul() {
        let data = b"AB\0C\0\0XY";
        let mut r = BinaryReader::new(data);
        assert_eq!(r.read_string(6).unwrap(), "ABC");
        assert_eq!(r.tell(), 6);
        assert_eq!(r.read_string(2).unwrap(), "XY");
    }

    #[test]
    fn latin1_bytes_map_to_chars() {
        let data = [0xE9, b'!'];
        let mut r = BinaryReader::new(&data);
        assert_eq!(r.read_string(2).unwrap(), "\u{e9}!");
    }
}
