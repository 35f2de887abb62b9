//! CIL instruction model based on ECMA-335.
//!
//! This module defines everything the analyses need to know about a CIL
//! instruction stream: the opcode byte constants, the instruction-family
//! alphabet, per-opcode descriptor tables, the decoded [`Instruction`]
//! representation, the slot-width-oriented type model, and the bytecode
//! decoder that turns raw IL bytes into instructions.
//!
//! # Key Types
//! - [`Instruction`] - A decoded CIL instruction
//! - [`Family`] - The closed instruction-family alphabet
//! - [`FlowKind`] - Flow-control categories used by the CFG builder
//! - [`MethodBody`] - The in-memory method body the analyses consume
//! - [`CilType`] - Type shapes reduced to what slot sizing requires
//!
//! # Example
//! ```rust
//! use ilopt::il::{decode_stream, Family};
//!
//! let bytecode = [0x00, 0x2A]; // nop, ret
//! let instructions = decode_stream(&bytecode)?;
//! assert_eq!(instructions[0].family, Family::Nop);
//! assert_eq!(instructions[1].mnemonic, "ret");
//! # Ok::<(), ilopt::Error>(())
//! ```

mod body;
mod decoder;
mod family;
mod instruction;
pub mod opcodes;
mod ty;

pub use body::{ArgSlot, MethodBody};
pub use decoder::{decode_instruction, decode_stream};
pub use family::{op_spec, Family, FlowKind, OpSpec, OperandKind};
pub use instruction::{Immediate, Instruction, MethodSig, Operand, ParamSig, Token};
pub use ty::{CilType, SlotWidth};
