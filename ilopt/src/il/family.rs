//! Instruction families, flow-control categories, and the opcode
//! descriptor tables.
//!
//! The [`Family`] enum is the closed alphabet the analyses are written
//! against: every one of the ~220 CIL opcodes maps to one of these tags.
//! The mapping is a dense static table indexed by the opcode byte (with a
//! second table for the `0xFE`-prefixed opcodes), so classification is a
//! bounds-checked array load. Reserved encoding holes are represented by
//! empty descriptor slots and classify as [`crate::Error::UnknownOpcode`].

use crate::{Error, Result};

/// Semantic grouping of CIL opcodes.
///
/// Families collapse encoding variants into one tag: `ldloc.0` through
/// `ldloc.3`, `ldloc.s` and `ldloc` are all [`Family::Ldloc`]; every
/// `conv.*` form is [`Family::Conv`]; signed/unsigned and short/long branch
/// forms share their base family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub enum Family {
    Nop,
    Break,
    Ldarg,
    Ldarga,
    Starg,
    Ldloc,
    Ldloca,
    Stloc,
    Ldnull,
    Ldc,
    Dup,
    Pop,
    Jmp,
    Call,
    Calli,
    Callvirt,
    Newobj,
    Ret,
    Br,
    Brfalse,
    Brtrue,
    Beq,
    Bge,
    Bgt,
    Ble,
    Blt,
    Bne,
    Switch,
    Ldind,
    Stind,
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    And,
    Or,
    Xor,
    Shl,
    Shr,
    Neg,
    Not,
    Conv,
    Cpobj,
    Ldobj,
    Ldstr,
    Castclass,
    Isinst,
    Unbox,
    Throw,
    Ldfld,
    Ldflda,
    Stfld,
    Ldsfld,
    Ldsflda,
    Stsfld,
    Stobj,
    Box,
    Newarr,
    Ldlen,
    Ldelema,
    Ldelem,
    Stelem,
    Refanyval,
    Ckfinite,
    Mkrefany,
    Ldtoken,
    Endfinally,
    Leave,
    Arglist,
    Ceq,
    Cgt,
    Clt,
    Ldftn,
    Ldvirtftn,
    Localloc,
    Endfilter,
    Unaligned,
    Volatile,
    Tail,
    Initobj,
    Constrained,
    Cpblk,
    Initblk,
    No,
    Rethrow,
    Sizeof,
    Refanytype,
    Readonly,
}

impl Family {
    /// Classifies an opcode into its instruction family.
    ///
    /// `prefix` is `0` for single-byte opcodes or `0xFE` for two-byte ones.
    ///
    /// # Errors
    ///
    /// Fails with [`Error::UnknownOpcode`] when the numeric code lies outside
    /// the descriptor tables or names a reserved encoding hole.
    pub fn of(prefix: u8, opcode: u8) -> Result<Family> {
        Ok(op_spec(prefix, opcode)?.family)
    }
}

/// How an instruction relates to control flow, as the CFG builder sees it.
///
/// These are the nine flow-control categories of the ECMA-335 opcode tables.
/// `leave`/`leave.s` are unconditional [`FlowKind::Branch`]es,
/// `endfinally`/`endfilter` terminate like [`FlowKind::Return`], `switch` is
/// a [`FlowKind::CondBranch`], and prefix opcodes are [`FlowKind::Meta`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowKind {
    /// Execution falls through to the next instruction.
    Next,
    /// Debugger breakpoint; falls through.
    Break,
    /// Method invocation; falls through after the callee returns.
    Call,
    /// Prefix modifying the following instruction.
    Meta,
    /// Unconditional transfer to the operand target.
    Branch,
    /// Two-way or multi-way transfer with fall-through.
    CondBranch,
    /// Terminates the method (or a finally/filter region).
    Return,
    /// Raises an exception; never falls through.
    Throw,
    /// SSA-style phi marker; never produced by the decoder but part of the
    /// category alphabet.
    Phi,
}

/// Operand encoding attached to an opcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperandKind {
    /// No operand bytes.
    None,
    /// Unsigned 8-bit immediate (`unaligned.`, `no.`).
    U8,
    /// Signed 8-bit immediate (`ldc.i4.s`).
    I8,
    /// Signed 32-bit immediate (`ldc.i4`).
    I32,
    /// Signed 64-bit immediate (`ldc.i8`).
    I64,
    /// 32-bit float immediate (`ldc.r4`).
    F32,
    /// 64-bit float immediate (`ldc.r8`).
    F64,
    /// Local variable index, one byte (`ldloc.s` et al.).
    VarU8,
    /// Local variable index, two bytes (`ldloc` et al.).
    VarU16,
    /// Argument index, one byte (`ldarg.s` et al.).
    ArgU8,
    /// Argument index, two bytes (`ldarg` et al.).
    ArgU16,
    /// Metadata token, four bytes.
    Token,
    /// Branch displacement, one signed byte.
    Target8,
    /// Branch displacement, four signed bytes.
    Target32,
    /// Switch table: count plus that many 32-bit displacements.
    Switch,
}

/// Static description of one opcode: mnemonic, family, flow category, and
/// operand encoding. Reserved slots carry an empty mnemonic.
#[derive(Debug, Clone, Copy)]
pub struct OpSpec {
    /// Instruction mnemonic, `""` for reserved encoding holes.
    pub mnemonic: &'static str,
    /// Instruction family.
    pub family: Family,
    /// Flow-control category.
    pub flow: FlowKind,
    /// Operand encoding.
    pub operand: OperandKind,
}

const fn op(mnemonic: &'static str, family: Family, flow: FlowKind, operand: OperandKind) -> OpSpec {
    OpSpec {
        mnemonic,
        family,
        flow,
        operand,
    }
}

/// Reserved encoding hole.
const RES: OpSpec = op("", Family::Nop, FlowKind::Next, OperandKind::None);

/// Looks up the descriptor for an opcode.
///
/// # Errors
///
/// Fails with [`Error::UnknownOpcode`] for codes outside the tables and for
/// reserved holes inside them. The error payload is `prefix << 8 | opcode`.
pub fn op_spec(prefix: u8, opcode: u8) -> Result<&'static OpSpec> {
    let spec = match prefix {
        0x00 => OPCODES.get(opcode as usize),
        0xFE => OPCODES_FE.get(opcode as usize),
        _ => None,
    };
    match spec {
        Some(spec) if !spec.mnemonic.is_empty() => Ok(spec),
        _ => Err(Error::UnknownOpcode(u16::from_be_bytes([prefix, opcode]))),
    }
}

use Family as F;
use FlowKind::{Branch, Call, CondBranch, Meta, Next, Return, Throw};
use OperandKind as O;

/// Descriptors for the single-byte opcodes `0x00..=0xE0`.
pub(crate) static OPCODES: [OpSpec; 0xE1] = [
    op("nop", F::Nop, Next, O::None),                     // 0x00
    op("break", F::Break, FlowKind::Break, O::None),      // 0x01
    op("ldarg.0", F::Ldarg, Next, O::None),               // 0x02
    op("ldarg.1", F::Ldarg, Next, O::None),               // 0x03
    op("ldarg.2", F::Ldarg, Next, O::None),               // 0x04
    op("ldarg.3", F::Ldarg, Next, O::None),               // 0x05
    op("ldloc.0", F::Ldloc, Next, O::None),               // 0x06
    op("ldloc.1", F::Ldloc, Next, O::None),               // 0x07
    op("ldloc.2", F::Ldloc, Next, O::None),               // 0x08
    op("ldloc.3", F::Ldloc, Next, O::None),               // 0x09
    op("stloc.0", F::Stloc, Next, O::None),               // 0x0A
    op("stloc.1", F::Stloc, Next, O::None),               // 0x0B
    op("stloc.2", F::Stloc, Next, O::None),               // 0x0C
    op("stloc.3", F::Stloc, Next, O::None),               // 0x0D
    op("ldarg.s", F::Ldarg, Next, O::ArgU8),              // 0x0E
    op("ldarga.s", F::Ldarga, Next, O::ArgU8),            // 0x0F
    op("starg.s", F::Starg, Next, O::ArgU8),              // 0x10
    op("ldloc.s", F::Ldloc, Next, O::VarU8),              // 0x11
    op("ldloca.s", F::Ldloca, Next, O::VarU8),            // 0x12
    op("stloc.s", F::Stloc, Next, O::VarU8),              // 0x13
    op("ldnull", F::Ldnull, Next, O::None),               // 0x14
    op("ldc.i4.m1", F::Ldc, Next, O::None),               // 0x15
    op("ldc.i4.0", F::Ldc, Next, O::None),                // 0x16
    op("ldc.i4.1", F::Ldc, Next, O::None),                // 0x17
    op("ldc.i4.2", F::Ldc, Next, O::None),                // 0x18
    op("ldc.i4.3", F::Ldc, Next, O::None),                // 0x19
    op("ldc.i4.4", F::Ldc, Next, O::None),                // 0x1A
    op("ldc.i4.5", F::Ldc, Next, O::None),                // 0x1B
    op("ldc.i4.6", F::Ldc, Next, O::None),                // 0x1C
    op("ldc.i4.7", F::Ldc, Next, O::None),                // 0x1D
    op("ldc.i4.8", F::Ldc, Next, O::None),                // 0x1E
    op("ldc.i4.s", F::Ldc, Next, O::I8),                  // 0x1F
    op("ldc.i4", F::Ldc, Next, O::I32),                   // 0x20
    op("ldc.i8", F::Ldc, Next, O::I64),                   // 0x21
    op("ldc.r4", F::Ldc, Next, O::F32),                   // 0x22
    op("ldc.r8", F::Ldc, Next, O::F64),                   // 0x23
    RES,                                                  // 0x24
    op("dup", F::Dup, Next, O::None),                     // 0x25
    op("pop", F::Pop, Next, O::None),                     // 0x26
    op("jmp", F::Jmp, Call, O::Token),                    // 0x27
    op("call", F::Call, Call, O::Token),                  // 0x28
    op("calli", F::Calli, Call, O::Token),                // 0x29
    op("ret", F::Ret, Return, O::None),                   // 0x2A
    op("br.s", F::Br, Branch, O::Target8),                // 0x2B
    op("brfalse.s", F::Brfalse, CondBranch, O::Target8),  // 0x2C
    op("brtrue.s", F::Brtrue, CondBranch, O::Target8),    // 0x2D
    op("beq.s", F::Beq, CondBranch, O::Target8),          // 0x2E
    op("bge.s", F::Bge, CondBranch, O::Target8),          // 0x2F
    op("bgt.s", F::Bgt, CondBranch, O::Target8),          // 0x30
    op("ble.s", F::Ble, CondBranch, O::Target8),          // 0x31
    op("blt.s", F::Blt, CondBranch, O::Target8),          // 0x32
    op("bne.un.s", F::Bne, CondBranch, O::Target8),       // 0x33
    op("bge.un.s", F::Bge, CondBranch, O::Target8),       // 0x34
    op("bgt.un.s", F::Bgt, CondBranch, O::Target8),       // 0x35
    op("ble.un.s", F::Ble, CondBranch, O::Target8),       // 0x36
    op("blt.un.s", F::Blt, CondBranch, O::Target8),       // 0x37
    op("br", F::Br, Branch, O::Target32),                 // 0x38
    op("brfalse", F::Brfalse, CondBranch, O::Target32),   // 0x39
    op("brtrue", F::Brtrue, CondBranch, O::Target32),     // 0x3A
    op("beq", F::Beq, CondBranch, O::Target32),           // 0x3B
    op("bge", F::Bge, CondBranch, O::Target32),           // 0x3C
    op("bgt", F::Bgt, CondBranch, O::Target32),           // 0x3D
    op("ble", F::Ble, CondBranch, O::Target32),           // 0x3E
    op("blt", F::Blt, CondBranch, O::Target32),           // 0x3F
    op("bne.un", F::Bne, CondBranch, O::Target32),        // 0x40
    op("bge.un", F::Bge, CondBranch, O::Target32),        // 0x41
    op("bgt.un", F::Bgt, CondBranch, O::Target32),        // 0x42
    op("ble.un", F::Ble, CondBranch, O::Target32),        // 0x43
    op("blt.un", F::Blt, CondBranch, O::Target32),        // 0x44
    op("switch", F::Switch, CondBranch, O::Switch),       // 0x45
    op("ldind.i1", F::Ldind, Next, O::None),              // 0x46
    op("ldind.u1", F::Ldind, Next, O::None),              // 0x47
    op("ldind.i2", F::Ldind, Next, O::None),              // 0x48
    op("ldind.u2", F::Ldind, Next, O::None),              // 0x49
    op("ldind.i4", F::Ldind, Next, O::None),              // 0x4A
    op("ldind.u4", F::Ldind, Next, O::None),              // 0x4B
    op("ldind.i8", F::Ldind, Next, O::None),              // 0x4C
    op("ldind.i", F::Ldind, Next, O::None),               // 0x4D
    op("ldind.r4", F::Ldind, Next, O::None),              // 0x4E
    op("ldind.r8", F::Ldind, Next, O::None),              // 0x4F
    op("ldind.ref", F::Ldind, Next, O::None),             // 0x50
    op("stind.ref", F::Stind, Next, O::None),             // 0x51
    op("stind.i1", F::Stind, Next, O::None),              // 0x52
    op("stind.i2", F::Stind, Next, O::None),              // 0x53
    op("stind.i4", F::Stind, Next, O::None),              // 0x54
    op("stind.i8", F::Stind, Next, O::None),              // 0x55
    op("stind.r4", F::Stind, Next, O::None),              // 0x56
    op("stind.r8", F::Stind, Next, O::None),              // 0x57
    op("add", F::Add, Next, O::None),                     // 0x58
    op("sub", F::Sub, Next, O::None),                     // 0x59
    op("mul", F::Mul, Next, O::None),                     // 0x5A
    op("div", F::Div, Next, O::None),                     // 0x5B
    op("div.un", F::Div, Next, O::None),                  // 0x5C
    op("rem", F::Rem, Next, O::None),                     // 0x5D
    op("rem.un", F::Rem, Next, O::None),                  // 0x5E
    op("and", F::And, Next, O::None),                     // 0x5F
    op("or", F::Or, Next, O::None),                       // 0x60
    op("xor", F::Xor, Next, O::None),                     // 0x61
    op("shl", F::Shl, Next, O::None),                     // 0x62
    op("shr", F::Shr, Next, O::None),                     // 0x63
    op("shr.un", F::Shr, Next, O::None),                  // 0x64
    op("neg", F::Neg, Next, O::None),                     // 0x65
    op("not", F::Not, Next, O::None),                     // 0x66
    op("conv.i1", F::Conv, Next, O::None),                // 0x67
    op("conv.i2", F::Conv, Next, O::None),                // 0x68
    op("conv.i4", F::Conv, Next, O::None),                // 0x69
    op("conv.i8", F::Conv, Next, O::None),                // 0x6A
    op("conv.r4", F::Conv, Next, O::None),                // 0x6B
    op("conv.r8", F::Conv, Next, O::None),                // 0x6C
    op("conv.u4", F::Conv, Next, O::None),                // 0x6D
    op("conv.u8", F::Conv, Next, O::None),                // 0x6E
    op("callvirt", F::Callvirt, Call, O::Token),          // 0x6F
    op("cpobj", F::Cpobj, Next, O::Token),                // 0x70
    op("ldobj", F::Ldobj, Next, O::Token),                // 0x71
    op("ldstr", F::Ldstr, Next, O::Token),                // 0x72
    op("newobj", F::Newobj, Call, O::Token),              // 0x73
    op("castclass", F::Castclass, Next, O::Token),        // 0x74
    op("isinst", F::Isinst, Next, O::Token),              // 0x75
    op("conv.r.un", F::Conv, Next, O::None),              // 0x76
    RES,                                                  // 0x77
    RES,                                                  // 0x78
    op("unbox", F::Unbox, Next, O::Token),                // 0x79
    op("throw", F::Throw, Throw, O::None),                // 0x7A
    op("ldfld", F::Ldfld, Next, O::Token),                // 0x7B
    op("ldflda", F::Ldflda, Next, O::Token),              // 0x7C
    op("stfld", F::Stfld, Next, O::Token),                // 0x7D
    op("ldsfld", F::Ldsfld, Next, O::Token),              // 0x7E
    op("ldsflda", F::Ldsflda, Next, O::Token),            // 0x7F
    op("stsfld", F::Stsfld, Next, O::Token),              // 0x80
    op("stobj", F::Stobj, Next, O::Token),                // 0x81
    op("conv.ovf.i1.un", F::Conv, Next, O::None),         // 0x82
    op("conv.ovf.i2.un", F::Conv, Next, O::None),         // 0x83
    op("conv.ovf.i4.un", F::Conv, Next, O::None),         // 0x84
    op("conv.ovf.i8.un", F::Conv, Next, O::None),         // 0x85
    op("conv.ovf.u1.un", F::Conv, Next, O::None),         // 0x86
    op("conv.ovf.u2.un", F::Conv, Next, O::None),         // 0x87
    op("conv.ovf.u4.un", F::Conv, Next, O::None),         // 0x88
    op("conv.ovf.u8.un", F::Conv, Next, O::None),         // 0x89
    op("conv.ovf.i.un", F::Conv, Next, O::None),          // 0x8A
    op("conv.ovf.u.un", F::Conv, Next, O::None),          // 0x8B
    op("box", F::Box, Next, O::Token),                    // 0x8C
    op("newarr", F::Newarr, Next, O::Token),              // 0x8D
    op("ldlen", F::Ldlen, Next, O::None),                 // 0x8E
    op("ldelema", F::Ldelema, Next, O::Token),            // 0x8F
    op("ldelem.i1", F::Ldelem, Next, O::None),            // 0x90
    op("ldelem.u1", F::Ldelem, Next, O::None),            // 0x91
    op("ldelem.i2", F::Ldelem, Next, O::None),            // 0x92
    op("ldelem.u2", F::Ldelem, Next, O::None),            // 0x93
    op("ldelem.i4", F::Ldelem, Next, O::None),            // 0x94
    op("ldelem.u4", F::Ldelem, Next, O::None),            // 0x95
    op("ldelem.i8", F::Ldelem, Next, O::None),            // 0x96
    op("ldelem.i", F::Ldelem, Next, O::None),             // 0x97
    op("ldelem.r4", F::Ldelem, Next, O::None),            // 0x98
    op("ldelem.r8", F::Ldelem, Next, O::None),            // 0x99
    op("ldelem.ref", F::Ldelem, Next, O::None),           // 0x9A
    op("stelem.i", F::Stelem, Next, O::None),             // 0x9B
    op("stelem.i1", F::Stelem, Next, O::None),            // 0x9C
    op("stelem.i2", F::Stelem, Next, O::None),            // 0x9D
    op("stelem.i4", F::Stelem, Next, O::None),            // 0x9E
    op("stelem.i8", F::Stelem, Next, O::None),            // 0x9F
    op("stelem.r4", F::Stelem, Next, O::None),            // 0xA0
    op("stelem.r8", F::Stelem, Next, O::None),            // 0xA1
    op("stelem.ref", F::Stelem, Next, O::None),           // 0xA2
    op("ldelem", F::Ldelem, Next, O::Token),              // 0xA3
    op("stelem", F::Stelem, Next, O::Token),              // 0xA4
    op("unbox.any", F::Unbox, Next, O::Token),            // 0xA5
    RES,                                                  // 0xA6
    RES,                                                  // 0xA7
    RES,                                                  // 0xA8
    RES,                                                  // 0xA9
    RES,                                                  // 0xAA
    RES,                                                  // 0xAB
    RES,                                                  // 0xAC
    RES,                                                  // 0xAD
    RES,                                                  // 0xAE
    RES,                                                  // 0xAF
    RES,                                                  // 0xB0
    RES,                                                  // 0xB1
    RES,                                                  // 0xB2
    op("conv.ovf.i1", F::Conv, Next, O::None),            // 0xB3
    op("conv.ovf.u1", F::Conv, Next, O::None),            // 0xB4
    op("conv.ovf.i2", F::Conv, Next, O::None),            // 0xB5
    op("conv.ovf.u2", F::Conv, Next, O::None),            // 0xB6
    op("conv.ovf.i4", F::Conv, Next, O::None),            // 0xB7
    op("conv.ovf.u4", F::Conv, Next, O::None),            // 0xB8
    op("conv.ovf.i8", F::Conv, Next, O::None),            // 0xB9
    op("conv.ovf.u8", F::Conv, Next, O::None),            // 0xBA
    RES,                                                  // 0xBB
    RES,                                                  // 0xBC
    RES,                                                  // 0xBD
    RES,                                                  // 0xBE
    RES,                                                  // 0xBF
    RES,                                                  // 0xC0
    RES,                                                  // 0xC1
    op("refanyval", F::Refanyval, Next, O::Token),        // 0xC2
    op("ckfinite", F::Ckfinite, Next, O::None),           // 0xC3
    RES,                                                  // 0xC4
    RES,                                                  // 0xC5
    op("mkrefany", F::Mkrefany, Next, O::Token),          // 0xC6
    RES,                                                  // 0xC7
    RES,                                                  // 0xC8
    RES,                                                  // 0xC9
    RES,                                                  // 0xCA
    RES,                                                  // 0xCB
    RES,                                                  // 0xCC
    RES,                                                  // 0xCD
    RES,                                                  // 0xCE
    RES,                                                  // 0xCF
    op("ldtoken", F::Ldtoken, Next, O::Token),            // 0xD0
    op("conv.u2", F::Conv, Next, O::None),                // 0xD1
    op("conv.u1", F::Conv, Next, O::None),                // 0xD2
    op("conv.i", F::Conv, Next, O::None),                 // 0xD3
    op("conv.ovf.i", F::Conv, Next, O::None),             // 0xD4
    op("conv.ovf.u", F::Conv, Next, O::None),             // 0xD5
    op("add.ovf", F::Add, Next, O::None),                 // 0xD6
    op("add.ovf.un", F::Add, Next, O::None),              // 0xD7
    op("mul.ovf", F::Mul, Next, O::None),                 // 0xD8
    op("mul.ovf.un", F::Mul, Next, O::None),              // 0xD9
    op("sub.ovf", F::Sub, Next, O::None),                 // 0xDA
    op("sub.ovf.un", F::Sub, Next, O::None),              // 0xDB
    op("endfinally", F::Endfinally, Return, O::None),     // 0xDC
    op("leave", F::Leave, Branch, O::Target32),           // 0xDD
    op("leave.s", F::Leave, Branch, O::Target8),          // 0xDE
    op("stind.i", F::Stind, Next, O::None),               // 0xDF
    op("conv.u", F::Conv, Next, O::None),                 // 0xE0
];

/// Descriptors for the `0xFE`-prefixed opcodes, indexed by their second byte.
pub(crate) static OPCODES_FE: [OpSpec; 0x1F] = [
    op("arglist", F::Arglist, Next, O::None),             // 0x00
    op("ceq", F::Ceq, Next, O::None),                     // 0x01
    op("cgt", F::Cgt, Next, O::None),                     // 0x02
    op("cgt.un", F::Cgt, Next, O::None),                  // 0x03
    op("clt", F::Clt, Next, O::None),                     // 0x04
    op("clt.un", F::Clt, Next, O::None),                  // 0x05
    op("ldftn", F::Ldftn, Next, O::Token),                // 0x06
    op("ldvirtftn", F::Ldvirtftn, Next, O::Token),        // 0x07
    RES,                                                  // 0x08
    op("ldarg", F::Ldarg, Next, O::ArgU16),               // 0x09
    op("ldarga", F::Ldarga, Next, O::ArgU16),             // 0x0A
    op("starg", F::Starg, Next, O::ArgU16),               // 0x0B
    op("ldloc", F::Ldloc, Next, O::VarU16),               // 0x0C
    op("ldloca", F::Ldloca, Next, O::VarU16),             // 0x0D
    op("stloc", F::Stloc, Next, O::VarU16),               // 0x0E
    op("localloc", F::Localloc, Next, O::None),           // 0x0F
    RES,                                                  // 0x10
    op("endfilter", F::Endfilter, Return, O::None),       // 0x11
    op("unaligned.", F::Unaligned, Meta, O::U8),          // 0x12
    op("volatile.", F::Volatile, Meta, O::None),          // 0x13
    op("tail.", F::Tail, Meta, O::None),                  // 0x14
    op("initobj", F::Initobj, Next, O::Token),            // 0x15
    op("constrained.", F::Constrained, Meta, O::Token),   // 0x16
    op("cpblk", F::Cpblk, Next, O::None),                 // 0x17
    op("initblk", F::Initblk, Next, O::None),             // 0x18
    op("no.", F::No, Meta, O::U8),                        // 0x19
    op("rethrow", F::Rethrow, Throw, O::None),            // 0x1A
    RES,                                                  // 0x1B
    op("sizeof", F::Sizeof, Next, O::Token),              // 0x1C
    op("refanytype", F::Refanytype, Next, O::None),       // 0x1D
    op("readonly.", F::Readonly, Meta, O::None),          // 0x1E
];
