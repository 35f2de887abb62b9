//! Builders producing method bodies with resolved operands.
//!
//! Branch-free scenarios are easiest to express through [`Asm`], which lays
//! out instructions with correct offsets and sizes; branch-heavy scenarios
//! are usually clearer as raw bytecode fed to
//! [`crate::il::decode_stream`].

use std::sync::Arc;

use crate::il::{
    op_spec, opcodes, CilType, Immediate, Instruction, MethodBody, MethodSig, Operand, OperandKind,
    ParamSig,
};

/// Signature of a static method.
pub(crate) fn static_sig(params: Vec<ParamSig>, return_type: CilType) -> Arc<MethodSig> {
    Arc::new(MethodSig {
        has_this: false,
        explicit_this: false,
        is_ctor: false,
        params,
        return_type,
    })
}

/// Signature of an instance constructor.
pub(crate) fn ctor_sig(params: Vec<ParamSig>) -> Arc<MethodSig> {
    Arc::new(MethodSig {
        has_this: true,
        explicit_this: false,
        is_ctor: true,
        params,
        return_type: CilType::Void,
    })
}

/// Straight-line instruction assembler with exact offsets and sizes.
#[derive(Default)]
pub(crate) struct Asm {
    instructions: Vec<Instruction>,
    offset: u32,
}

impl Asm {
    pub(crate) fn new() -> Self {
        Asm::default()
    }

    fn emit(&mut self, prefix: u8, opcode: u8, operand: Operand) -> &mut Self {
        let spec = op_spec(prefix, opcode).expect("test emitted a reserved opcode");
        let operand_bytes = match spec.operand {
            OperandKind::None => 0,
            OperandKind::U8 | OperandKind::I8 | OperandKind::VarU8 | OperandKind::ArgU8 => 1,
            OperandKind::VarU16 | OperandKind::ArgU16 => 2,
            OperandKind::I32
            | OperandKind::F32
            | OperandKind::Token
            | OperandKind::Target32 => 4,
            OperandKind::I64 | OperandKind::F64 => 8,
            OperandKind::Target8 => 1,
            OperandKind::Switch => match &operand {
                Operand::Switch(targets) => 4 + 4 * targets.len() as u32,
                _ => 4,
            },
        };
        let size = operand_bytes + if prefix == 0 { 1 } else { 2 };
        self.instructions.push(Instruction {
            offset: self.offset,
            size,
            opcode,
            prefix,
            mnemonic: spec.mnemonic,
            family: spec.family,
            flow: spec.flow,
            operand,
        });
        self.offset += size;
        self
    }

    pub(crate) fn nop(&mut self) -> &mut Self {
        self.emit(0, opcodes::NOP, Operand::None)
    }

    pub(crate) fn ret(&mut self) -> &mut Self {
        self.emit(0, opcodes::RET, Operand::None)
    }

    pub(crate) fn ldc_i4(&mut self, value: i32) -> &mut Self {
        self.emit(0, opcodes::LDC_I4, Operand::Immediate(Immediate::Int32(value)))
    }

    pub(crate) fn ldc_i8(&mut self, value: i64) -> &mut Self {
        self.emit(0, opcodes::LDC_I8, Operand::Immediate(Immediate::Int64(value)))
    }

    pub(crate) fn ldloc(&mut self, index: u16) -> &mut Self {
        self.emit(0xFE, opcodes::FE_LDLOC, Operand::Local(index))
    }

    pub(crate) fn stloc(&mut self, index: u16) -> &mut Self {
        self.emit(0xFE, opcodes::FE_STLOC, Operand::Local(index))
    }

    pub(crate) fn ldloca(&mut self, index: u16) -> &mut Self {
        self.emit(0, opcodes::LDLOCA_S, Operand::Local(index))
    }

    pub(crate) fn ldarg(&mut self, index: u16) -> &mut Self {
        self.emit(0, opcodes::LDARG_S, Operand::Argument(index))
    }

    pub(crate) fn dup(&mut self) -> &mut Self {
        self.emit(0, opcodes::DUP, Operand::None)
    }

    pub(crate) fn pop(&mut self) -> &mut Self {
        self.emit(0, opcodes::POP, Operand::None)
    }

    pub(crate) fn add(&mut self) -> &mut Self {
        self.emit(0, opcodes::ADD, Operand::None)
    }

    pub(crate) fn stind_i4(&mut self) -> &mut Self {
        self.emit(0, opcodes::STIND_I4, Operand::None)
    }

    pub(crate) fn call(&mut self, sig: Arc<MethodSig>) -> &mut Self {
        self.emit(0, opcodes::CALL, Operand::Method(sig))
    }

    pub(crate) fn callvirt(&mut self, sig: Arc<MethodSig>) -> &mut Self {
        self.emit(0, opcodes::CALLVIRT, Operand::Method(sig))
    }

    pub(crate) fn newobj(&mut self, sig: Arc<MethodSig>) -> &mut Self {
        self.emit(0, opcodes::NEWOBJ, Operand::Method(sig))
    }

    pub(crate) fn initobj(&mut self, ty: CilType) -> &mut Self {
        self.emit(0xFE, opcodes::FE_INITOBJ, Operand::Type(Arc::new(ty)))
    }

    pub(crate) fn localloc(&mut self) -> &mut Self {
        self.emit(0xFE, opcodes::FE_LOCALLOC, Operand::None)
    }

    /// Finishes into a static, parameterless body.
    pub(crate) fn body(&mut self, locals: Vec<CilType>) -> MethodBody {
        self.body_with(locals, Vec::new(), false)
    }

    pub(crate) fn body_with(
        &mut self,
        locals: Vec<CilType>,
        params: Vec<ParamSig>,
        has_this: bool,
    ) -> MethodBody {
        MethodBody::new(std::mem::take(&mut self.instructions), locals, params, has_this)
    }
}
