//! Little-endian cursor over a byte buffer.

use crate::{Error, Result};

/// Sealed helper for types [`Reader::read_le`] can produce.
pub trait ReadLe: Sized + sealed::Sealed {
    /// Decodes `Self` from little-endian bytes at the front of `data`.
    fn from_le(data: &[u8]) -> Option<Self>;
    /// Encoded size in bytes.
    const SIZE: usize;
}

mod sealed {
    pub trait Sealed {}
}

macro_rules! impl_read_le {
    ($($ty:ty),*) => {
        $(
            impl sealed::Sealed for $ty {}
            impl ReadLe for $ty {
                fn from_le(data: &[u8]) -> Option<Self> {
                    let bytes = data.get(..std::mem::size_of::<$ty>())?;
                    Some(<$ty>::from_le_bytes(bytes.try_into().ok()?))
                }
                const SIZE: usize = std::mem::size_of::<$ty>();
            }
        )*
    };
}

impl_read_le!(u8, i8, u16, i16, u32, i32, u64, i64, f32, f64);

/// A bounds-checked little-endian reader over a borrowed byte slice.
///
/// Every read advances the cursor; short reads fail with
/// [`Error::Malformed`] instead of panicking.
pub struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    /// Creates a reader positioned at the start of `data`.
    #[must_use]
    pub fn new(data: &'a [u8]) -> Self {
        Reader { data, pos: 0 }
    }

    /// Current cursor position.
    #[must_use]
    pub fn pos(&self) -> usize {
        self.pos
    }

    /// Total buffer length.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the buffer is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Whether any bytes remain past the cursor.
    #[must_use]
    pub fn has_more(&self) -> bool {
        self.pos < self.data.len()
    }

    /// Moves the cursor to an absolute position.
    ///
    /// # Errors
    ///
    /// Fails when `pos` lies past the end of the buffer.
    pub fn seek(&mut self, pos: usize) -> Result<()> {
        if pos > self.data.len() {
            return Err(Error::Malformed(format!(
                "seek to {pos} beyond buffer of {} bytes",
                self.data.len()
            )));
        }
        self.pos = pos;
        Ok(())
    }

    /// The byte at the cursor, without advancing.
    #[must_use]
    pub fn peek_u8(&self) -> Option<u8> {
        self.data.get(self.pos).copied()
    }

    /// Reads one little-endian value and advances the cursor.
    ///
    /// # Errors
    ///
    /// Fails when fewer than `T::SIZE` bytes remain.
    pub fn read_le<T: ReadLe>(&mut self) -> Result<T> {
        let value = T::from_le(&self.data[self.pos.min(self.data.len())..]).ok_or_else(|| {
            Error::Malformed(format!(
                "unexpected end of data at offset {} (wanted {} bytes of {})",
                self.pos,
                T::SIZE,
                self.data.len()
            ))
        })?;
        self.pos += T::SIZE;
        Ok(value)
    }

    /// Borrows `count` bytes at the cursor and advances past them.
    ///
    /// # Errors
    ///
    /// Fails when fewer than `count` bytes remain.
    pub fn read_bytes(&mut self, count: usize) -> Result<&'a [u8]> {
        let end = self.pos.checked_add(count).filter(|&end| end <= self.data.len());
        match end {
            Some(end) => {
                let bytes = &self.data[self.pos..end];
                self.pos = end;
                Ok(bytes)
            }
            None => Err(Error::Malformed(format!(
                "unexpected end of data at offset {} (wanted {count} bytes)",
                self.pos
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_advance_the_cursor() {
        let data = [0x01, 0x02, 0x03, 0x04, 0x05];
        let mut reader = Reader::new(&data);
        assert_eq!(reader.read_le::<u8>().unwrap(), 0x01);
        assert_eq!(reader.read_le::<u16>().unwrap(), 0x0302);
        assert_eq!(reader.pos(), 3);
        assert!(reader.has_more());
    }

    #[test]
    fn short_reads_fail() {
        let data = [0x01];
        let mut reader = Reader::new(&data);
        assert!(reader.read_le::<u32>().is_err());
    }

    #[test]
    fn seek_is_bounds_checked() {
        let data = [0u8; 4];
        let mut reader = Reader::new(&data);
        assert!(reader.seek(4).is_ok());
        assert!(!reader.has_more());
        assert!(reader.seek(5).is_err());
    }
}
