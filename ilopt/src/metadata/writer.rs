//! Writing optimized modules back out.
//!
//! The output is the input image verbatim except for one bit: each updated
//! method's fat header has `INIT_LOCALS` cleared. Nothing is re-laid-out,
//! so every other byte round-trips untouched.

use std::path::Path;

use log::debug;

use crate::metadata::body::BodyFlags;
use crate::metadata::module::Module;
use crate::{Error, Result};

/// Produces the output image for `module`: a copy of `data` with the
/// `init locals` header bit cleared for every method whose in-memory body
/// has the flag cleared.
///
/// Methods still carrying the flag, tiny-header methods, and every other
/// byte of the image are left untouched.
///
/// # Errors
///
/// Fails with [`Error::Malformed`] when a recorded header offset does not
/// name a fat header in `data` — a sign the module and image diverged.
pub fn patched_image(module: &Module, data: &[u8]) -> Result<Vec<u8>> {
    let mut image = data.to_vec();
    for ty in &module.types {
        for method in &ty.methods {
            let Some(body) = &method.body else { continue };
            let Some(offset) = method.header_offset else { continue };
            if body.init_locals || !method.fat_header {
                continue;
            }
            let header = image.get_mut(offset..offset + 2).ok_or_else(|| {
                Error::Malformed(format!(
                    "method header offset 0x{offset:X} is outside the image"
                ))
            })?;
            let mut flags = u16::from_le_bytes([header[0], header[1]]);
            if flags & 0x3 != BodyFlags::FAT_FORMAT.bits() {
                return Err(Error::Malformed(format!(
                    "no fat method header at offset 0x{offset:X}"
                )));
            }
            flags &= !BodyFlags::INIT_LOCALS.bits();
            header.copy_from_slice(&flags.to_le_bytes());
        }
    }
    Ok(image)
}

/// Writes an output image, deleting the partial file on failure.
///
/// # Errors
///
/// Propagates the underlying I/O error after removing whatever was
/// written.
pub fn write_module(path: &Path, image: &[u8]) -> Result<()> {
    if let Err(error) = std::fs::write(path, image) {
        debug!("removing partial output {}", path.display());
        let _ = std::fs::remove_file(path);
        return Err(error.into());
    }
    Ok(())
}
