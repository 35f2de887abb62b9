use thiserror::Error;

use crate::il::Family;

/// The error type covering every failure this library can report.
///
/// The first seven variants form the per-method analysis taxonomy: the
/// optimization driver catches them at the method boundary, counts the method
/// as failed, and moves on. [`Error::Malformed`], [`Error::Io`] and
/// [`Error::Pe`] concern the container and abort the run.
#[derive(Error, Debug)]
pub enum Error {
    /// An opcode's numeric code lies outside the instruction descriptor
    /// table, or names a reserved slot inside it.
    #[error("unknown opcode 0x{0:04X}")]
    UnknownOpcode(u16),

    /// An operand accessor was applied to an instruction of the wrong
    /// family. This is a programmer error, not a property of the input.
    #[error("{accessor} applied to an instruction of family {found:?}")]
    FamilyMismatch {
        /// Name of the accessor that was misapplied.
        accessor: &'static str,
        /// The family the instruction actually belongs to.
        found: Family,
    },

    /// The CFG builder met a flow-control category it does not model:
    /// `Phi`, or a `Meta` opcode other than `volatile.`.
    #[error("unsupported control flow: {0}")]
    UnsupportedFlow(&'static str),

    /// The stack simulator met an instruction family it does not model.
    #[error("instruction family {0:?} is not modeled by the stack simulator")]
    UnsupportedFamily(Family),

    /// The stack simulator tried to pop from an empty evaluation stack.
    #[error("evaluation stack underflow at offset 0x{0:04X}")]
    StackUnderflow(u32),

    /// The stack simulator popped a slot of an unexpected width.
    #[error("stack slot mismatch at offset 0x{offset:04X}: expected {expected} bytes, found {found}")]
    StackMismatch {
        /// Byte offset of the offending instruction.
        offset: u32,
        /// Slot width the instruction required.
        expected: u32,
        /// Slot width actually on top of the stack.
        found: u32,
    },

    /// A type with no evaluation-stack representation (`void`,
    /// `typedbyref`, a sentinel) was asked for its slot width.
    #[error("type has no stack slot width: {0}")]
    UnsizedType(&'static str),

    /// The module container is damaged or violates ECMA-335 layout rules.
    #[error("malformed module: {0}")]
    Malformed(String),

    /// File I/O failure while reading or writing a module.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// PE parsing failure from the goblin crate.
    #[error(transparent)]
    Pe(#[from] goblin::error::Error),
}

impl Error {
    /// Whether this error is confined to a single method's analysis.
    ///
    /// The driver counts such methods as failed and keeps going; anything
    /// else aborts the run.
    #[must_use]
    pub fn is_method_local(&self) -> bool {
        matches!(
            self,
            Error::UnknownOpcode(_)
                | Error::FamilyMismatch { .. }
                | Error::UnsupportedFlow(_)
                | Error::UnsupportedFamily(_)
                | Error::StackUnderflow(_)
                | Error::StackMismatch { .. }
                | Error::UnsizedType(_)
        )
    }
}
