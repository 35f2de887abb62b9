//! CIL bytecode decoding: raw IL bytes to [`Instruction`] values.
//!
//! The decoder is strictly linear: it never follows control flow, it only
//! turns bytes into instructions with resolved branch-target offsets. Basic
//! block discovery happens later in [`crate::analysis::cfg`].
//!
//! # Example
//! ```rust
//! use ilopt::il::decode_stream;
//!
//! // nop; brfalse.s +1; ret; ret
//! let code = [0x00, 0x2C, 0x01, 0x2A, 0x2A];
//! let instructions = decode_stream(&code)?;
//! assert_eq!(instructions.len(), 4);
//! assert_eq!(instructions[1].branch_targets(), vec![4]);
//! # Ok::<(), ilopt::Error>(())
//! ```

use crate::il::{op_spec, opcodes, Immediate, Instruction, Operand, OperandKind, Token};
use crate::reader::Reader;
use crate::{Error, Result};

/// Decodes a single instruction at the reader's cursor.
///
/// The cursor position on entry is taken as the instruction's byte offset
/// within the method body; the cursor is left one past the instruction's
/// operand bytes.
///
/// # Errors
///
/// Fails with [`Error::UnknownOpcode`] for reserved or out-of-range opcode
/// bytes, and with [`Error::Malformed`] when operand bytes are truncated or
/// a branch displacement escapes the method body.
pub fn decode_instruction(reader: &mut Reader<'_>) -> Result<Instruction> {
    let offset = u32::try_from(reader.pos())
        .map_err(|_| Error::Malformed("method body exceeds 4 GiB".into()))?;

    let first = reader.read_le::<u8>()?;
    let (prefix, opcode) = if first == opcodes::FE_PREFIX {
        (opcodes::FE_PREFIX, reader.read_le::<u8>()?)
    } else {
        (0, first)
    };
    let spec = op_spec(prefix, opcode)?;

    let operand = match spec.operand {
        OperandKind::None => Operand::None,
        OperandKind::U8 => Operand::Immediate(Immediate::UInt8(reader.read_le::<u8>()?)),
        OperandKind::I8 => Operand::Immediate(Immediate::Int8(reader.read_le::<i8>()?)),
        OperandKind::I32 => Operand::Immediate(Immediate::Int32(reader.read_le::<i32>()?)),
        OperandKind::I64 => Operand::Immediate(Immediate::Int64(reader.read_le::<i64>()?)),
        OperandKind::F32 => Operand::Immediate(Immediate::Float32(reader.read_le::<f32>()?)),
        OperandKind::F64 => Operand::Immediate(Immediate::Float64(reader.read_le::<f64>()?)),
        OperandKind::VarU8 => Operand::Local(u16::from(reader.read_le::<u8>()?)),
        OperandKind::VarU16 => Operand::Local(reader.read_le::<u16>()?),
        OperandKind::ArgU8 => Operand::Argument(u16::from(reader.read_le::<u8>()?)),
        OperandKind::ArgU16 => Operand::Argument(reader.read_le::<u16>()?),
        OperandKind::Token => Operand::Token(Token::new(reader.read_le::<u32>()?)),
        OperandKind::Target8 => {
            let displacement = i32::from(reader.read_le::<i8>()?);
            Operand::Target(resolve_target(reader.pos(), displacement)?)
        }
        OperandKind::Target32 => {
            let displacement = reader.read_le::<i32>()?;
            Operand::Target(resolve_target(reader.pos(), displacement)?)
        }
        OperandKind::Switch => {
            let count = reader.read_le::<u32>()? as usize;
            let mut displacements = Vec::with_capacity(count);
            for _ in 0..count {
                displacements.push(reader.read_le::<i32>()?);
            }
            let base = reader.pos();
            let targets = displacements
                .into_iter()
                .map(|displacement| resolve_target(base, displacement))
                .collect::<Result<Vec<u32>>>()?;
            Operand::Switch(targets)
        }
    };

    Ok(Instruction {
        offset,
        size: reader.pos() as u32 - offset,
        opcode,
        prefix,
        mnemonic: spec.mnemonic,
        family: spec.family,
        flow: spec.flow,
        operand,
    })
}

/// Turns a relative branch displacement into an absolute body offset.
fn resolve_target(next: usize, displacement: i32) -> Result<u32> {
    let target = next as i64 + i64::from(displacement);
    u32::try_from(target)
        .map_err(|_| Error::Malformed(format!("branch displacement {displacement} escapes the method body")))
}

/// Decodes a whole method body's code bytes into an instruction list.
///
/// # Errors
///
/// Propagates any [`decode_instruction`] failure; a truncated final
/// instruction is an error, not a partial result.
pub fn decode_stream(code: &[u8]) -> Result<Vec<Instruction>> {
    let mut reader = Reader::new(code);
    let mut instructions = Vec::new();
    while reader.has_more() {
        instructions.push(decode_instruction(&mut reader)?);
    }
    Ok(instructions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::il::{Family, FlowKind};

    #[test]
    fn decodes_simple_stream() {
        let code = [0x00, 0x06, 0x2A]; // nop, ldloc.0, ret
        let instructions = decode_stream(&code).unwrap();
        assert_eq!(instructions.len(), 3);
        assert_eq!(instructions[0].mnemonic, "nop");
        assert_eq!(instructions[1].family, Family::Ldloc);
        assert_eq!(instructions[2].flow, FlowKind::Return);
        assert_eq!(instructions[1].offset, 1);
        assert_eq!(instructions[2].offset, 2);
    }

    #[test]
    fn decodes_fe_prefixed_opcodes() {
        let code = [0xFE, 0x0D, 0x02, 0x00, 0x2A]; // ldloca V_2, ret
        let instructions = decode_stream(&code).unwrap();
        assert_eq!(instructions[0].mnemonic, "ldloca");
        assert_eq!(instructions[0].prefix, 0xFE);
        assert_eq!(instructions[0].size, 4);
        assert!(matches!(instructions[0].operand, Operand::Local(2)));
    }

    #[test]
    fn short_form_indices_widen() {
        let code = [0x11, 0x07]; // ldloc.s V_7
        let instructions = decode_stream(&code).unwrap();
        assert!(matches!(instructions[0].operand, Operand::Local(7)));

        let code = [0x0E, 0x03]; // ldarg.s A_3
        let instructions = decode_stream(&code).unwrap();
        assert!(matches!(instructions[0].operand, Operand::Argument(3)));
    }

    #[test]
    fn branch_targets_are_absolute() {
        // 0: br.s +2 -> 4;  2: br -5 -> 2
        let code = [0x2B, 0x02, 0x38, 0xFB, 0xFF, 0xFF, 0xFF];
        let instructions = decode_stream(&code).unwrap();
        assert!(matches!(instructions[0].operand, Operand::Target(4)));
        assert!(matches!(instructions[1].operand, Operand::Target(2)));
    }

    #[test]
    fn switch_targets_are_absolute() {
        // switch (2 cases: +1, +2), then two rets; base offset is 13
        let code = [
            0x45, 0x02, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x02, 0x00, 0x00, 0x00, 0x2A,
            0x2A, 0x2A,
        ];
        let instructions = decode_stream(&code).unwrap();
        match &instructions[0].operand {
            Operand::Switch(targets) => assert_eq!(targets, &vec![14, 15]),
            other => panic!("expected switch operand, found {other:?}"),
        }
    }

    #[test]
    fn negative_displacement_before_body_start_fails() {
        let code = [0x2B, 0xF0]; // br.s -16 from offset 2
        assert!(decode_stream(&code).is_err());
    }

    #[test]
    fn reserved_opcode_fails() {
        assert!(matches!(
            decode_stream(&[0x24]),
            Err(Error::UnknownOpcode(0x0024))
        ));
    }

    #[test]
    fn truncated_operand_fails() {
        assert!(decode_stream(&[0x20, 0x01, 0x02]).is_err()); // ldc.i4 missing a byte
    }

    #[test]
    fn decodes_every_live_opcode_without_operand_bytes() {
        for (byte, spec) in super::super::family::OPCODES.iter().enumerate() {
            if spec.mnemonic.is_empty() || spec.operand != OperandKind::None {
                continue;
            }
            let code = [byte as u8];
            let decoded = decode_stream(&code).unwrap();
            assert_eq!(decoded[0].mnemonic, spec.mnemonic);
        }
    }
}
