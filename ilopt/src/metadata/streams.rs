//! Metadata root and stream access: `#~`, `#Strings`, `#Blob`.

use crate::reader::Reader;
use crate::{Error, Result};

/// Magic signature of the metadata root ("BSJB").
const METADATA_MAGIC: u32 = 0x424A_5342;

/// The metadata root with its streams located.
pub struct MetadataRoot<'d> {
    /// The `#~` (or uncompressed `#-`) tables stream.
    pub tables: &'d [u8],
    /// The `#Strings` heap.
    pub strings: StringsHeap<'d>,
    /// The `#Blob` heap.
    pub blobs: BlobHeap<'d>,
}

impl<'d> MetadataRoot<'d> {
    /// Parses the stream directory of a metadata root.
    ///
    /// # Errors
    ///
    /// Fails with [`Error::Malformed`] on a bad signature, a truncated
    /// directory, or a missing required stream.
    pub fn parse(data: &'d [u8]) -> Result<Self> {
        let mut reader = Reader::new(data);
        if reader.read_le::<u32>()? != METADATA_MAGIC {
            return Err(Error::Malformed("bad metadata signature".into()));
        }
        reader.seek(12)?;
        let version_length = reader.read_le::<u32>()? as usize;
        reader.seek(16 + version_length)?;
        let _flags = reader.read_le::<u16>()?;
        let stream_count = reader.read_le::<u16>()?;

        let mut tables = None;
        let mut strings = None;
        let mut blobs = None;
        for _ in 0..stream_count {
            let offset = reader.read_le::<u32>()? as usize;
            let size = reader.read_le::<u32>()? as usize;
            let name = read_stream_name(&mut reader)?;
            let bytes = data
                .get(offset..offset + size)
                .ok_or_else(|| Error::Malformed(format!("stream {name} extends past metadata")))?;
            match name.as_str() {
                "#~" | "#-" => tables = Some(bytes),
                "#Strings" => strings = Some(bytes),
                "#Blob" => blobs = Some(bytes),
                _ => {}
            }
        }

        Ok(MetadataRoot {
            tables: tables.ok_or_else(|| Error::Malformed("missing #~ stream".into()))?,
            strings: StringsHeap {
                data: strings.unwrap_or(&[]),
            },
            blobs: BlobHeap {
                data: blobs.unwrap_or(&[]),
            },
        })
    }
}

/// Stream names are null-terminated ASCII padded to a 4-byte boundary.
fn read_stream_name(reader: &mut Reader<'_>) -> Result<String> {
    let mut name = String::new();
    loop {
        let byte = reader.read_le::<u8>()?;
        if byte == 0 {
            break;
        }
        if name.len() >= 32 {
            return Err(Error::Malformed("unterminated stream name".into()));
        }
        name.push(byte as char);
    }
    // Skip padding up to the next 4-byte boundary.
    while reader.pos() % 4 != 0 {
        reader.read_le::<u8>()?;
    }
    Ok(name)
}

/// The `#Strings` heap: null-terminated UTF-8 at byte offsets.
pub struct StringsHeap<'d> {
    data: &'d [u8],
}

impl StringsHeap<'_> {
    /// The string at `index`.
    ///
    /// # Errors
    ///
    /// Fails with [`Error::Malformed`] on an out-of-range index, a missing
    /// terminator, or invalid UTF-8.
    pub fn get(&self, index: u32) -> Result<&str> {
        let start = index as usize;
        let tail = self
            .data
            .get(start..)
            .ok_or_else(|| Error::Malformed(format!("string index {index} out of range")))?;
        let end = tail
            .iter()
            .position(|&byte| byte == 0)
            .ok_or_else(|| Error::Malformed(format!("unterminated string at {index}")))?;
        std::str::from_utf8(&tail[..end])
            .map_err(|_| Error::Malformed(format!("invalid UTF-8 in string at {index}")))
    }
}

/// The `#Blob` heap: length-prefixed binary records at byte offsets.
pub struct BlobHeap<'d> {
    data: &'d [u8],
}

impl<'d> BlobHeap<'d> {
    /// The blob at `index`.
    ///
    /// # Errors
    ///
    /// Fails with [`Error::Malformed`] on an out-of-range index or a
    /// length prefix overrunning the heap.
    pub fn get(&self, index: u32) -> Result<&'d [u8]> {
        let start = index as usize;
        let mut reader = Reader::new(
            self.data
                .get(start..)
                .ok_or_else(|| Error::Malformed(format!("blob index {index} out of range")))?,
        );
        let length = read_compressed_u32(&mut reader)? as usize;
        reader.read_bytes(length)
    }
}

/// Reads an ECMA-335 compressed unsigned integer (II.23.2).
pub fn read_compressed_u32(reader: &mut Reader<'_>) -> Result<u32> {
    let first = reader.read_le::<u8>()?;
    if first & 0x80 == 0 {
        Ok(u32::from(first))
    } else if first & 0xC0 == 0x80 {
        let second = reader.read_le::<u8>()?;
        Ok((u32::from(first & 0x3F) << 8) | u32::from(second))
    } else if first & 0xE0 == 0xC0 {
        let second = reader.read_le::<u8>()?;
        let third = reader.read_le::<u8>()?;
        let fourth = reader.read_le::<u8>()?;
        Ok((u32::from(first & 0x1F) << 24)
            | (u32::from(second) << 16)
            | (u32::from(third) << 8)
            | u32::from(fourth))
    } else {
        Err(Error::Malformed(format!(
            "invalid compressed integer lead byte 0x{first:02X}"
        )))
    }
}
