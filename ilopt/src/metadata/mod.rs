//! Compact ECMA-335 container access.
//!
//! Reads just enough of a .NET PE module to drive the optimizer — type and
//! method tables, signatures, and method bodies — and writes the result
//! back as a byte-exact copy of the input with only the `init locals`
//! header bit cleared for updated methods.
//!
//! # Layers
//!
//! - [`pe`]: PE container access through goblin, RVA resolution, and the
//!   CLI header
//! - [`streams`]: metadata root, `#~`, `#Strings`, and `#Blob` streams
//! - [`tables`]: row counts, row sizes, and the parsed rows the optimizer
//!   consumes
//! - [`signatures`]: blob signature parsing into [`crate::il::CilType`]
//! - [`body`]: tiny/fat method body headers
//! - [`module`]: the in-memory object model handed to the driver
//! - [`loader`] / [`writer`]: assembling a [`Module`] from an image, and
//!   patching the image back out
//!
//! # Example
//! ```rust,no_run
//! let data = std::fs::read("Input.dll")?;
//! let mut module = ilopt::metadata::read_module(&data)?;
//! // ... run optimizations over `module` ...
//! let patched = ilopt::metadata::patched_image(&module, &data)?;
//! ilopt::metadata::write_module("optimized/Input.dll".as_ref(), &patched)?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod body;
mod loader;
pub mod module;
pub mod pe;
pub mod signatures;
pub mod streams;
pub mod tables;
mod writer;

pub use body::{BodyFlags, BodyHeader};
pub use loader::read_module;
pub use module::{MethodDef, Module, TypeDef};
pub use writer::{patched_image, write_module};
