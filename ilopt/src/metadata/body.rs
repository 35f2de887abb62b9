//! Method body header parsing (ECMA-335 II.25.4).
//!
//! Bodies come in two header forms: a single tiny byte for small,
//! local-free methods, and a 12-byte fat header carrying flags, the stack
//! bound, and the locals signature token. Only the fat form has the
//! `init locals` bit — tiny bodies have no locals to initialize.

use bitflags::bitflags;

use crate::{Error, Result};

bitflags! {
    /// Fat method body header flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct BodyFlags: u16 {
        /// Tiny header form discriminator.
        const TINY_FORMAT = 0x0002;
        /// Fat header form discriminator.
        const FAT_FORMAT = 0x0003;
        /// Extra data sections (exception tables) follow the code.
        const MORE_SECTS = 0x0008;
        /// The runtime zero-initializes the local variable area on entry.
        const INIT_LOCALS = 0x0010;
    }
}

/// A parsed method body header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BodyHeader {
    /// Whether the header uses the fat form.
    pub is_fat: bool,
    /// Header size in bytes (1 for tiny, a multiple of 4 for fat).
    pub header_size: usize,
    /// Size of the IL code in bytes.
    pub code_size: usize,
    /// Declared operand stack bound.
    pub max_stack: u16,
    /// Token of the StandAloneSig row describing the locals; 0 for none.
    pub local_var_sig_token: u32,
    /// The `init locals` flag. Always false for tiny headers.
    pub init_locals: bool,
}

impl BodyHeader {
    /// Parses the header at the start of `data`.
    ///
    /// # Errors
    ///
    /// Fails with [`Error::Malformed`] when `data` is empty, names neither
    /// header form, or declares code extending past the buffer.
    pub fn parse(data: &[u8]) -> Result<BodyHeader> {
        let first = *data
            .first()
            .ok_or_else(|| Error::Malformed("empty method body".into()))?;

        match BodyFlags::from_bits_truncate(u16::from(first & 0x03)) {
            BodyFlags::TINY_FORMAT => {
                let code_size = usize::from(first >> 2);
                if 1 + code_size > data.len() {
                    return Err(Error::Malformed(
                        "tiny method body extends past the image".into(),
                    ));
                }
                Ok(BodyHeader {
                    is_fat: false,
                    header_size: 1,
                    code_size,
                    max_stack: 8,
                    local_var_sig_token: 0,
                    init_locals: false,
                })
            }
            BodyFlags::FAT_FORMAT => {
                if data.len() < 12 {
                    return Err(Error::Malformed("truncated fat method header".into()));
                }
                let first_pair = u16::from_le_bytes([data[0], data[1]]);
                let flags = BodyFlags::from_bits_truncate(first_pair & 0x0FFF);
                let header_size = usize::from(first_pair >> 12) * 4;
                let max_stack = u16::from_le_bytes([data[2], data[3]]);
                let code_size = u32::from_le_bytes([data[4], data[5], data[6], data[7]]) as usize;
                let local_var_sig_token =
                    u32::from_le_bytes([data[8], data[9], data[10], data[11]]);

                if header_size < 12 {
                    return Err(Error::Malformed(format!(
                        "fat method header claims size {header_size}"
                    )));
                }
                if header_size + code_size > data.len() {
                    return Err(Error::Malformed(
                        "fat method body extends past the image".into(),
                    ));
                }
                Ok(BodyHeader {
                    is_fat: true,
                    header_size,
                    code_size,
                    max_stack,
                    local_var_sig_token,
                    init_locals: flags.contains(BodyFlags::INIT_LOCALS),
                })
            }
            _ => Err(Error::Malformed(format!(
                "method header is neither fat nor tiny: 0x{first:02X}"
            ))),
        }
    }

    /// The byte range the IL code occupies, relative to the header start.
    #[must_use]
    pub fn code_range(&self) -> std::ops::Range<usize> {
        self.header_size..self.header_size + self.code_size
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tiny_header() {
        // (2 << 2) | 0x2: two bytes of code
        let data = [0x0A, 0x00, 0x2A];
        let header = BodyHeader::parse(&data).unwrap();
        assert!(!header.is_fat);
        assert_eq!(header.header_size, 1);
        assert_eq!(header.code_size, 2);
        assert!(!header.init_locals);
        assert_eq!(header.local_var_sig_token, 0);
        assert_eq!(header.code_range(), 1..3);
    }

    #[test]
    fn fat_header_with_init_locals() {
        let mut data = vec![
            0x13, 0x30, // flags: fat | init locals, header size 3 * 4
            0x02, 0x00, // max stack 2
            0x03, 0x00, 0x00, 0x00, // code size 3
            0x01, 0x00, 0x00, 0x11, // locals token 0x11000001
        ];
        data.extend_from_slice(&[0x16, 0x0A, 0x2A]); // ldc.i4.0; stloc.0; ret
        let header = BodyHeader::parse(&data).unwrap();
        assert!(header.is_fat);
        assert!(header.init_locals);
        assert_eq!(header.header_size, 12);
        assert_eq!(header.code_size, 3);
        assert_eq!(header.max_stack, 2);
        assert_eq!(header.local_var_sig_token, 0x1100_0001);
        assert_eq!(header.code_range(), 12..15);
    }

    #[test]
    fn fat_header_without_init_locals() {
        let mut data = vec![0x03, 0x30, 0x08, 0x00, 0x01, 0x00, 0x00, 0x00];
        data.extend_from_slice(&[0x00, 0x00, 0x00, 0x00, 0x2A]);
        let header = BodyHeader::parse(&data).unwrap();
        assert!(header.is_fat);
        assert!(!header.init_locals);
    }

    #[test]
    fn truncated_and_garbage_headers_fail() {
        assert!(BodyHeader::parse(&[]).is_err());
        assert!(BodyHeader::parse(&[0x13, 0x30, 0x02]).is_err());
        assert!(BodyHeader::parse(&[0x00]).is_err()); // neither form
        // Tiny header claiming more code than present.
        assert!(BodyHeader::parse(&[0x0E, 0x00]).is_err());
    }
}
