//! Decoded CIL instruction representation and operand types.

use std::fmt;
use std::sync::Arc;

use crate::il::{CilType, Family, FlowKind};

/// A metadata token: table id in the high byte, row index below.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Token(u32);

impl Token {
    /// Creates a token from its raw 32-bit value.
    #[must_use]
    pub fn new(value: u32) -> Self {
        Token(value)
    }

    /// The raw 32-bit value.
    #[must_use]
    pub fn value(&self) -> u32 {
        self.0
    }

    /// The table identifier (high byte).
    #[must_use]
    pub fn table(&self) -> u8 {
        (self.0 >> 24) as u8
    }

    /// The row index (low three bytes, 1-based).
    #[must_use]
    pub fn row(&self) -> u32 {
        self.0 & 0x00FF_FFFF
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:08X}", self.0)
    }
}

/// An immediate value embedded in the instruction stream.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Immediate {
    /// Signed 8-bit immediate (`ldc.i4.s`).
    Int8(i8),
    /// Unsigned 8-bit immediate (`unaligned.`, `no.`).
    UInt8(u8),
    /// Signed 32-bit immediate (`ldc.i4`).
    Int32(i32),
    /// Signed 64-bit immediate (`ldc.i8`).
    Int64(i64),
    /// 32-bit float immediate (`ldc.r4`).
    Float32(f32),
    /// 64-bit float immediate (`ldc.r8`).
    Float64(f64),
}

/// One parameter of a callable signature.
#[derive(Debug, Clone, PartialEq)]
pub struct ParamSig {
    /// Declared parameter type.
    pub ty: CilType,
    /// Whether the parameter carries the `[out]` contract: the callee
    /// assigns it before returning.
    pub is_out: bool,
}

impl ParamSig {
    /// A plain (non-`out`) parameter of the given type.
    #[must_use]
    pub fn plain(ty: CilType) -> Self {
        ParamSig { ty, is_out: false }
    }

    /// An `out` parameter; the stored type is a managed pointer to `ty`.
    #[must_use]
    pub fn out(ty: CilType) -> Self {
        ParamSig {
            ty: CilType::ByRef(Box::new(ty)),
            is_out: true,
        }
    }
}

/// Signature of a call target, resolved from a `call`/`callvirt`/`newobj`
/// operand token.
#[derive(Debug, Clone, PartialEq)]
pub struct MethodSig {
    /// `HASTHIS`: the callee takes an implicit receiver.
    pub has_this: bool,
    /// `EXPLICITTHIS`: the receiver is already part of `params`.
    pub explicit_this: bool,
    /// Whether the callee is an instance constructor (`.ctor`).
    pub is_ctor: bool,
    /// Declared parameters, in order.
    pub params: Vec<ParamSig>,
    /// Declared return type (`Void` for none).
    pub return_type: CilType,
}

impl MethodSig {
    /// Number of stack slots a call to this signature pops: the declared
    /// parameters plus the implicit receiver when present.
    #[must_use]
    pub fn argument_count(&self) -> usize {
        self.params.len() + usize::from(self.has_this && !self.explicit_this)
    }
}

/// A decoded instruction operand.
///
/// Operands referring to metadata are resolved up front — the analyses see a
/// shared [`MethodSig`] or [`CilType`], never a raw token — except for
/// operands the analyses ignore (`ldstr`, `ldtoken`, …), which stay opaque.
#[derive(Debug, Clone)]
pub enum Operand {
    /// No operand.
    None,
    /// Immediate constant.
    Immediate(Immediate),
    /// Branch target, as a byte offset into the method body.
    Target(u32),
    /// Switch case targets, as byte offsets into the method body.
    Switch(Vec<u32>),
    /// Local variable index.
    Local(u16),
    /// Argument index (0 is `this` for instance methods).
    Argument(u16),
    /// Resolved field reference: the field's declared type.
    Field(Arc<CilType>),
    /// Resolved call target signature.
    Method(Arc<MethodSig>),
    /// Resolved type reference (`initobj`, `ldelem <T>`, `sizeof`, …).
    Type(Arc<CilType>),
    /// Unresolved metadata token, kept opaque.
    Token(Token),
}

/// A decoded CIL instruction.
///
/// Instructions live in a method body's `Vec` in stream order; the byte
/// `offset` identifies the instruction within the body and "the next
/// instruction" is the next vector element. The core never creates,
/// removes, or reorders instructions.
#[derive(Clone)]
pub struct Instruction {
    /// Byte offset of this instruction within the method body's code.
    pub offset: u32,
    /// Encoded size in bytes, operand included.
    pub size: u32,
    /// Opcode byte (second byte for `0xFE`-prefixed opcodes).
    pub opcode: u8,
    /// Prefix byte, `0` or `0xFE`.
    pub prefix: u8,
    /// Instruction mnemonic.
    pub mnemonic: &'static str,
    /// Instruction family.
    pub family: Family,
    /// Flow-control category.
    pub flow: FlowKind,
    /// Decoded operand.
    pub operand: Operand,
}

impl Instruction {
    /// Byte offset of the instruction following this one.
    #[must_use]
    pub fn next_offset(&self) -> u32 {
        self.offset + self.size
    }

    /// Whether this instruction ends a basic block.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(
            self.flow,
            FlowKind::Branch | FlowKind::CondBranch | FlowKind::Return | FlowKind::Throw
        )
    }

    /// All branch targets of this instruction, as body byte offsets.
    /// Empty for non-branching instructions; excludes fall-through.
    #[must_use]
    pub fn branch_targets(&self) -> Vec<u32> {
        match &self.operand {
            Operand::Target(target) => vec![*target],
            Operand::Switch(targets) => targets.clone(),
            _ => Vec::new(),
        }
    }
}

impl fmt::Debug for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "IL_{:04X}: {}", self.offset, self.mnemonic)?;
        match &self.operand {
            Operand::None => Ok(()),
            Operand::Immediate(imm) => write!(f, " {imm:?}"),
            Operand::Target(target) => write!(f, " IL_{target:04X}"),
            Operand::Switch(targets) => write!(f, " switch[{}]", targets.len()),
            Operand::Local(index) => write!(f, " V_{index}"),
            Operand::Argument(index) => write!(f, " A_{index}"),
            Operand::Field(ty) => write!(f, " field:{ty:?}"),
            Operand::Method(sig) => write!(f, " method({} params)", sig.params.len()),
            Operand::Type(ty) => write!(f, " type:{ty:?}"),
            Operand::Token(token) => write!(f, " {token}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_fields() {
        let token = Token::new(0x0600_002A);
        assert_eq!(token.table(), 0x06);
        assert_eq!(token.row(), 0x2A);
        assert_eq!(token.to_string(), "0x0600002A");
    }

    #[test]
    fn argument_count_includes_the_receiver() {
        let static_sig = MethodSig {
            has_this: false,
            explicit_this: false,
            is_ctor: false,
            params: vec![ParamSig::plain(CilType::I4)],
            return_type: CilType::Void,
        };
        assert_eq!(static_sig.argument_count(), 1);

        let instance_sig = MethodSig {
            has_this: true,
            ..static_sig.clone()
        };
        assert_eq!(instance_sig.argument_count(), 2);

        let explicit = MethodSig {
            has_this: true,
            explicit_this: true,
            ..static_sig
        };
        assert_eq!(explicit.argument_count(), 1);
    }

    #[test]
    fn out_params_are_by_ref() {
        let param = ParamSig::out(CilType::I4);
        assert!(param.is_out);
        assert!(param.ty.is_by_ref());
    }
}
