//! Operand accessors: resolve short and indexed instruction forms to
//! explicit local, argument, field, method, and type references.
//!
//! These are free functions dispatched on [`Family`], not methods on an
//! instruction hierarchy. Each fails with [`Error::FamilyMismatch`] when
//! applied to an instruction of the wrong family, which is a bug in the
//! caller rather than a property of the input.

use std::sync::Arc;

use crate::il::{opcodes, ArgSlot, CilType, Family, Instruction, MethodBody, MethodSig, Operand};
use crate::{Error, Result};

fn mismatch(accessor: &'static str, instruction: &Instruction) -> Error {
    Error::FamilyMismatch {
        accessor,
        found: instruction.family,
    }
}

/// The local variable index of a `ldloc`/`stloc`/`ldloca` form.
///
/// Fixed forms (`ldloc.0..3`, `stloc.0..3`) encode the index in the opcode;
/// short and long forms carry it as an operand.
///
/// # Errors
///
/// Fails with [`Error::FamilyMismatch`] for any other family.
pub fn local_index(instruction: &Instruction) -> Result<u16> {
    match instruction.family {
        Family::Ldloc | Family::Stloc | Family::Ldloca => {}
        _ => return Err(mismatch("local_index", instruction)),
    }
    if let Operand::Local(index) = instruction.operand {
        return Ok(index);
    }
    let index = match instruction.opcode {
        opcodes::LDLOC_0..=opcodes::LDLOC_3 => instruction.opcode - opcodes::LDLOC_0,
        opcodes::STLOC_0..=opcodes::STLOC_3 => instruction.opcode - opcodes::STLOC_0,
        _ => return Err(mismatch("local_index", instruction)),
    };
    Ok(u16::from(index))
}

/// The declared type of the local a `ldloc`/`stloc`/`ldloca` form touches.
///
/// # Errors
///
/// Fails with [`Error::FamilyMismatch`] for other families, and with
/// [`Error::Malformed`] when the index has no matching declaration.
pub fn local_type<'a>(instruction: &Instruction, body: &'a MethodBody) -> Result<&'a CilType> {
    let index = local_index(instruction)?;
    body.locals.get(usize::from(index)).ok_or_else(|| {
        Error::Malformed(format!(
            "instruction at offset 0x{:04X} references undeclared local {index}",
            instruction.offset
        ))
    })
}

/// The argument index of a `ldarg`/`ldarga`/`starg` form.
///
/// # Errors
///
/// Fails with [`Error::FamilyMismatch`] for any other family.
pub fn argument_index(instruction: &Instruction) -> Result<u16> {
    match instruction.family {
        Family::Ldarg | Family::Ldarga | Family::Starg => {}
        _ => return Err(mismatch("argument_index", instruction)),
    }
    if let Operand::Argument(index) = instruction.operand {
        return Ok(index);
    }
    match instruction.opcode {
        opcodes::LDARG_0..=opcodes::LDARG_3 => {
            Ok(u16::from(instruction.opcode - opcodes::LDARG_0))
        }
        _ => Err(mismatch("argument_index", instruction)),
    }
}

/// Resolves a `ldarg`/`ldarga`/`starg` form to its argument slot.
///
/// For a method with an implicit receiver, index 0 is `this` and indices
/// 1.. map to parameter (index − 1); otherwise indices map one to one.
///
/// # Errors
///
/// Fails with [`Error::FamilyMismatch`] for other families, and with
/// [`Error::Malformed`] when the index is out of range.
pub fn argument_of<'a>(instruction: &Instruction, body: &'a MethodBody) -> Result<ArgSlot<'a>> {
    let index = argument_index(instruction)?;
    body.argument(index).ok_or_else(|| {
        Error::Malformed(format!(
            "instruction at offset 0x{:04X} references undeclared argument {index}",
            instruction.offset
        ))
    })
}

/// The declared type of the field a field-access instruction touches.
///
/// # Errors
///
/// Fails with [`Error::FamilyMismatch`] for non-field families, and with
/// [`Error::Malformed`] when the operand token was never resolved.
pub fn field_type(instruction: &Instruction) -> Result<&Arc<CilType>> {
    match instruction.family {
        Family::Ldfld
        | Family::Ldflda
        | Family::Stfld
        | Family::Ldsfld
        | Family::Ldsflda
        | Family::Stsfld => {}
        _ => return Err(mismatch("field_type", instruction)),
    }
    match &instruction.operand {
        Operand::Field(ty) => Ok(ty),
        _ => Err(Error::Malformed(format!(
            "unresolved field reference at offset 0x{:04X}",
            instruction.offset
        ))),
    }
}

/// The callee signature of a `call`/`callvirt`/`newobj`/`jmp` instruction.
///
/// # Errors
///
/// Fails with [`Error::FamilyMismatch`] for non-call families, and with
/// [`Error::Malformed`] when the operand token was never resolved.
pub fn method_sig(instruction: &Instruction) -> Result<&Arc<MethodSig>> {
    match instruction.family {
        Family::Call | Family::Callvirt | Family::Newobj | Family::Jmp => {}
        _ => return Err(mismatch("method_sig", instruction)),
    }
    match &instruction.operand {
        Operand::Method(sig) => Ok(sig),
        _ => Err(Error::Malformed(format!(
            "unresolved call target at offset 0x{:04X}",
            instruction.offset
        ))),
    }
}

/// The element type of a `ldelem`/`ldelema`/`stelem` form, or `None` for
/// the encoded-type forms (`ldelem.i4`, `stelem.ref`, …) whose element
/// width lives in the opcode.
///
/// # Errors
///
/// Fails with [`Error::FamilyMismatch`] for any other family.
pub fn element_type(instruction: &Instruction) -> Result<Option<&Arc<CilType>>> {
    match instruction.family {
        Family::Ldelem | Family::Ldelema | Family::Stelem => {}
        _ => return Err(mismatch("element_type", instruction)),
    }
    match &instruction.operand {
        Operand::Type(ty) => Ok(Some(ty)),
        _ => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::il::{decode_stream, ParamSig};

    fn body_of(code: &[u8], locals: Vec<CilType>, params: Vec<ParamSig>, has_this: bool) -> MethodBody {
        MethodBody::new(decode_stream(code).unwrap(), locals, params, has_this)
    }

    #[test]
    fn fixed_local_forms_resolve_from_the_opcode() {
        let body = body_of(
            &[0x06, 0x09, 0x0A, 0x0D], // ldloc.0 ldloc.3 stloc.0 stloc.3
            vec![CilType::I4; 4],
            Vec::new(),
            false,
        );
        let indices: Vec<u16> = body
            .instructions
            .iter()
            .map(|i| local_index(i).unwrap())
            .collect();
        assert_eq!(indices, vec![0, 3, 0, 3]);
    }

    #[test]
    fn operand_local_forms_resolve_from_the_operand() {
        let body = body_of(
            &[0x11, 0x05, 0xFE, 0x0E, 0x2A, 0x01, 0x12, 0x02],
            vec![CilType::I4; 0x2B0],
            Vec::new(),
            false,
        ); // ldloc.s 5, stloc 0x12A, ldloca.s 2
        assert_eq!(local_index(&body.instructions[0]).unwrap(), 5);
        assert_eq!(local_index(&body.instructions[1]).unwrap(), 0x12A);
        assert_eq!(local_index(&body.instructions[2]).unwrap(), 2);
    }

    #[test]
    fn ldarg_fixed_forms_map_through_this() {
        // Instance method with params (i4, i8, r4): ldarg.0..3
        let body = body_of(
            &[0x02, 0x03, 0x04, 0x05],
            Vec::new(),
            vec![
                ParamSig::plain(CilType::I4),
                ParamSig::plain(CilType::I8),
                ParamSig::plain(CilType::R4),
            ],
            true,
        );
        assert!(matches!(
            argument_of(&body.instructions[0], &body).unwrap(),
            ArgSlot::This
        ));
        assert!(matches!(
            argument_of(&body.instructions[1], &body).unwrap(),
            ArgSlot::Param(p) if p.ty == CilType::I4
        ));
        assert!(matches!(
            argument_of(&body.instructions[3], &body).unwrap(),
            ArgSlot::Param(p) if p.ty == CilType::R4
        ));
    }

    #[test]
    fn ldarg_fixed_forms_without_this_map_directly() {
        let body = body_of(
            &[0x02, 0x03],
            Vec::new(),
            vec![ParamSig::plain(CilType::I8), ParamSig::plain(CilType::R8)],
            false,
        );
        assert!(matches!(
            argument_of(&body.instructions[0], &body).unwrap(),
            ArgSlot::Param(p) if p.ty == CilType::I8
        ));
        assert!(matches!(
            argument_of(&body.instructions[1], &body).unwrap(),
            ArgSlot::Param(p) if p.ty == CilType::R8
        ));
    }

    #[test]
    fn wrong_family_is_a_mismatch() {
        let body = body_of(&[0x00], Vec::new(), Vec::new(), false); // nop
        assert!(matches!(
            local_index(&body.instructions[0]),
            Err(Error::FamilyMismatch { found: Family::Nop, .. })
        ));
        assert!(matches!(
            argument_index(&body.instructions[0]),
            Err(Error::FamilyMismatch { .. })
        ));
        assert!(matches!(
            field_type(&body.instructions[0]),
            Err(Error::FamilyMismatch { .. })
        ));
        assert!(matches!(
            element_type(&body.instructions[0]),
            Err(Error::FamilyMismatch { .. })
        ));
    }

    #[test]
    fn undeclared_local_is_malformed() {
        let body = body_of(&[0x06, 0x2A], Vec::new(), Vec::new(), false); // ldloc.0 with no locals
        assert!(matches!(
            local_type(&body.instructions[0], &body),
            Err(Error::Malformed(_))
        ));
    }

    #[test]
    fn encoded_element_forms_have_no_operand_type() {
        let body = body_of(&[0x94], Vec::new(), Vec::new(), false); // ldelem.i4
        assert!(element_type(&body.instructions[0]).unwrap().is_none());
    }
}
