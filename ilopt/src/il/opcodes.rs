//! CIL opcode byte constants (ECMA-335) used across the crate.
//!
//! Only the opcodes the analyses and tests refer to by name are listed;
//! the full instruction set lives in the descriptor tables of
//! [`crate::il::family`]. Two-byte opcodes share the [`FE_PREFIX`] first
//! byte and are named with an `FE_` prefix.
#![allow(missing_docs)]

pub const NOP: u8 = 0x00;

pub const LDARG_0: u8 = 0x02;
pub const LDARG_3: u8 = 0x05;
pub const LDLOC_0: u8 = 0x06;
pub const LDLOC_3: u8 = 0x09;
pub const STLOC_0: u8 = 0x0A;
pub const STLOC_3: u8 = 0x0D;

pub const LDARG_S: u8 = 0x0E;
pub const LDARGA_S: u8 = 0x0F;
pub const STARG_S: u8 = 0x10;
pub const LDLOC_S: u8 = 0x11;
pub const LDLOCA_S: u8 = 0x12;
pub const STLOC_S: u8 = 0x13;

pub const LDC_I4_M1: u8 = 0x15;
pub const LDC_I4_0: u8 = 0x16;
pub const LDC_I4_8: u8 = 0x1E;
pub const LDC_I4_S: u8 = 0x1F;
pub const LDC_I4: u8 = 0x20;
pub const LDC_I8: u8 = 0x21;
pub const LDC_R4: u8 = 0x22;
pub const LDC_R8: u8 = 0x23;

pub const DUP: u8 = 0x25;
pub const POP: u8 = 0x26;

pub const CALL: u8 = 0x28;
pub const RET: u8 = 0x2A;

pub const BR_S: u8 = 0x2B;
pub const BRFALSE_S: u8 = 0x2C;
pub const BRTRUE_S: u8 = 0x2D;
pub const BR: u8 = 0x38;
pub const SWITCH: u8 = 0x45;

pub const LDIND_I8: u8 = 0x4C;
pub const LDIND_R8: u8 = 0x4F;
pub const STIND_I4: u8 = 0x54;
pub const STIND_I8: u8 = 0x55;
pub const STIND_R8: u8 = 0x57;

pub const ADD: u8 = 0x58;

pub const CALLVIRT: u8 = 0x6F;
pub const NEWOBJ: u8 = 0x73;

pub const LDELEM_I8: u8 = 0x96;
pub const LDELEM_R8: u8 = 0x99;
pub const STELEM_I8: u8 = 0x9F;
pub const STELEM_R8: u8 = 0xA1;

pub const LEAVE_S: u8 = 0xDE;

pub const FE_PREFIX: u8 = 0xFE;

pub const FE_CEQ: u8 = 0x01;
pub const FE_LDLOC: u8 = 0x0C;
pub const FE_LDLOCA: u8 = 0x0D;
pub const FE_STLOC: u8 = 0x0E;
pub const FE_LOCALLOC: u8 = 0x0F;
pub const FE_VOLATILE: u8 = 0x13;
pub const FE_INITOBJ: u8 = 0x15;
pub const FE_CONSTRAINED: u8 = 0x16;
