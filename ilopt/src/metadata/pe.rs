//! PE container access: sections, the CLI header, and the metadata root
//! location.
//!
//! PE parsing proper is goblin's job; this layer only resolves RVAs
//! through the section table and follows data directory 14 to the CLR
//! runtime header (ECMA-335 II.25.3.3).

use goblin::pe::PE;

use crate::{Error, Result};

/// Byte offset of the metadata directory RVA within the CLI header.
const CLI_HEADER_METADATA_OFFSET: usize = 8;

struct Section {
    virtual_address: u32,
    virtual_size: u32,
    raw_offset: u32,
    raw_size: u32,
}

/// A parsed PE image with RVA resolution and the located CLI metadata.
pub struct PeImage<'d> {
    data: &'d [u8],
    sections: Vec<Section>,
    metadata_rva: u32,
    metadata_size: u32,
}

impl<'d> PeImage<'d> {
    /// Parses the PE headers of `data` and locates the CLI metadata root.
    ///
    /// # Errors
    ///
    /// Fails with [`Error::Pe`] on malformed PE structures and with
    /// [`Error::Malformed`] when the image carries no CLR runtime header.
    pub fn parse(data: &'d [u8]) -> Result<Self> {
        let pe = PE::parse(data)?;

        let optional_header = pe
            .header
            .optional_header
            .ok_or_else(|| Error::Malformed("image has no optional header".into()))?;
        if optional_header
            .data_directories
            .get_clr_runtime_header()
            .is_none()
        {
            return Err(Error::Malformed("image has no CLR runtime header".into()));
        }
        let clr = optional_header
            .data_directories
            .get_clr_runtime_header()
            .unwrap();

        let sections = pe
            .sections
            .iter()
            .map(|section| Section {
                virtual_address: section.virtual_address,
                virtual_size: section.virtual_size,
                raw_offset: section.pointer_to_raw_data,
                raw_size: section.size_of_raw_data,
            })
            .collect();

        let image = PeImage {
            data,
            sections,
            metadata_rva: 0,
            metadata_size: 0,
        };

        // The CLI header's second directory entry points at the metadata
        // root.
        let cli_offset = image.rva_to_offset(clr.virtual_address)?;
        let entry = image
            .data
            .get(cli_offset + CLI_HEADER_METADATA_OFFSET..cli_offset + CLI_HEADER_METADATA_OFFSET + 8)
            .ok_or_else(|| Error::Malformed("truncated CLI header".into()))?;
        let metadata_rva = u32::from_le_bytes([entry[0], entry[1], entry[2], entry[3]]);
        let metadata_size = u32::from_le_bytes([entry[4], entry[5], entry[6], entry[7]]);
        if metadata_rva == 0 || metadata_size == 0 {
            return Err(Error::Malformed("CLI header has no metadata directory".into()));
        }

        Ok(PeImage {
            metadata_rva,
            metadata_size,
            ..image
        })
    }

    /// Translates an RVA to a file offset through the section table.
    ///
    /// # Errors
    ///
    /// Fails with [`Error::Malformed`] when the RVA falls outside every
    /// section.
    pub fn rva_to_offset(&self, rva: u32) -> Result<usize> {
        for section in &self.sections {
            let span = section.virtual_size.max(section.raw_size);
            let section_end = section.virtual_address.checked_add(span).ok_or_else(|| {
                Error::Malformed(format!(
                    "section at RVA 0x{:08X} overflows the address space",
                    section.virtual_address
                ))
            })?;
            if rva >= section.virtual_address && rva < section_end {
                return Ok((rva - section.virtual_address + section.raw_offset) as usize);
            }
        }
        Err(Error::Malformed(format!(
            "RVA 0x{rva:08X} falls outside every section"
        )))
    }

    /// The raw metadata root bytes.
    ///
    /// # Errors
    ///
    /// Fails with [`Error::Malformed`] when the metadata directory extends
    /// past the image.
    pub fn metadata(&self) -> Result<&'d [u8]> {
        let offset = self.rva_to_offset(self.metadata_rva)?;
        self.data
            .get(offset..offset + self.metadata_size as usize)
            .ok_or_else(|| Error::Malformed("metadata directory extends past the image".into()))
    }

    /// The full image bytes.
    #[must_use]
    pub fn data(&self) -> &'d [u8] {
        self.data
    }
}
