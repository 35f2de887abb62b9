#![deny(missing_docs)]

//! # ilopt
//!
//! A post-compilation optimizer for .NET CIL (ECMA-335) modules, built in
//! pure Rust. Its shipped optimization strips the `init` flag from the
//! `.locals` directive of method bodies whenever static analysis proves that
//! every local variable is definitely assigned before its first use, making
//! runtime zero-initialization of the local variable area unnecessary.
//!
//! # Architecture
//!
//! The crate is organized as a per-method analysis pipeline with a thin
//! container layer around it:
//!
//! - [`crate::il`] - CIL instruction model: opcode tables, instruction
//!   families, operand representation, and the bytecode decoder
//! - [`crate::analysis`] - Control flow graph construction, the abstract
//!   evaluation-stack simulator, and the definite-assignment analyzer
//! - [`crate::optimize`] - The optimization driver: applies analyses per
//!   method and aggregates updated/skipped/failed counts
//! - [`crate::metadata`] - Compact ECMA-335 reader and the byte-patching
//!   module writer
//!
//! A method body enters the driver, which builds a CFG for it and invokes the
//! definite-assignment analyzer; the analyzer consults the opcode classifier,
//! the operand accessors, and the stack simulator while scanning each basic
//! block. The verdict drives a single mutation: clearing the `init locals`
//! bit of the method body header. No instruction is ever created, removed, or
//! reordered.
//!
//! # Usage
//!
//! ```rust,no_run
//! use ilopt::metadata;
//! use ilopt::optimize::{Mode, Optimizer, StripLocalsInit};
//!
//! let data = std::fs::read("Input.dll")?;
//! let mut module = metadata::read_module(&data)?;
//!
//! let mut optimizer = Optimizer::new();
//! optimizer.add(Box::new(StripLocalsInit::new(Mode::CSharp)));
//! let report = optimizer.run(&mut module)?;
//!
//! for stats in &report.optimizations {
//!     println!("{stats}");
//! }
//! let patched = metadata::patched_image(&module, &data)?;
//! metadata::write_module("Output.dll".as_ref(), &patched)?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! # Error Handling
//!
//! All fallible operations return [`Result<T, Error>`](Result). Errors raised
//! while analyzing a single method are contained by the driver: the method is
//! counted as failed and processing continues with the next one. Errors
//! outside analysis (container parsing, I/O) propagate to the caller.
//!
//! # Thread Safety
//!
//! The opcode descriptor tables are immutable statics and may be shared
//! freely. All per-method state (CFG, access side tables, simulator stack) is
//! confined to one method's analysis, so a driver that fans methods out over
//! threads is correct by construction.

mod error;
mod reader;

pub mod analysis;
pub mod il;
pub mod metadata;
pub mod optimize;

#[cfg(test)]
pub(crate) mod test;

pub use error::Error;
pub use reader::Reader;

/// `ilopt` Result type, used by every fallible operation in the crate.
pub type Result<T> = std::result::Result<T, Error>;
