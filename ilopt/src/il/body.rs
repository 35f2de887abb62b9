//! In-memory method body model.

use rustc_hash::FxHashMap;

use crate::il::{CilType, Instruction, ParamSig};

/// What an argument index resolves to.
#[derive(Debug, Clone, Copy)]
pub enum ArgSlot<'a> {
    /// The implicit `this` receiver of an instance method.
    This,
    /// A declared parameter.
    Param(&'a ParamSig),
}

impl ArgSlot<'_> {
    /// The argument's type; `this` is always pointer-shaped.
    #[must_use]
    pub fn ty(&self) -> CilType {
        match self {
            ArgSlot::This => CilType::Class,
            ArgSlot::Param(param) => param.ty.clone(),
        }
    }
}

/// A method body as the analyses consume it: an ordered instruction stream,
/// typed local and parameter declarations, and the one flag this crate ever
/// mutates.
#[derive(Debug, Clone)]
pub struct MethodBody {
    /// Instructions in stream order.
    pub instructions: Vec<Instruction>,
    /// Declared local variable types, in signature order.
    pub locals: Vec<CilType>,
    /// Declared parameter types, in signature order (`this` excluded).
    pub params: Vec<ParamSig>,
    /// Whether the method takes an implicit `this` receiver.
    pub has_this: bool,
    /// The `init` flag of the `.locals` directive: when set, the runtime
    /// zero-initializes the local variable area on entry.
    pub init_locals: bool,
    /// Declared operand stack depth bound, carried from the header.
    pub max_stack: u16,
}

impl MethodBody {
    /// Creates a body from already-decoded parts with `init_locals` set.
    #[must_use]
    pub fn new(
        instructions: Vec<Instruction>,
        locals: Vec<CilType>,
        params: Vec<ParamSig>,
        has_this: bool,
    ) -> Self {
        MethodBody {
            instructions,
            locals,
            params,
            has_this,
            init_locals: true,
            max_stack: 8,
        }
    }

    /// Resolves an argument index: index 0 is `this` for instance methods,
    /// and declared parameters follow, shifted by one.
    #[must_use]
    pub fn argument(&self, index: u16) -> Option<ArgSlot<'_>> {
        let index = usize::from(index);
        if self.has_this {
            if index == 0 {
                Some(ArgSlot::This)
            } else {
                self.params.get(index - 1).map(ArgSlot::Param)
            }
        } else {
            self.params.get(index).map(ArgSlot::Param)
        }
    }

    /// Builds the byte-offset to instruction-index map.
    ///
    /// Branch operands address instructions by body byte offset; the CFG
    /// builder resolves them through this map.
    #[must_use]
    pub fn offset_map(&self) -> FxHashMap<u32, usize> {
        self.instructions
            .iter()
            .enumerate()
            .map(|(index, instruction)| (instruction.offset, index))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::il::decode_stream;

    #[test]
    fn argument_resolution_with_this() {
        let body = MethodBody::new(
            Vec::new(),
            Vec::new(),
            vec![ParamSig::plain(CilType::I8)],
            true,
        );
        assert!(matches!(body.argument(0), Some(ArgSlot::This)));
        assert!(matches!(body.argument(1), Some(ArgSlot::Param(p)) if p.ty == CilType::I8));
        assert!(body.argument(2).is_none());
    }

    #[test]
    fn argument_resolution_static() {
        let body = MethodBody::new(
            Vec::new(),
            Vec::new(),
            vec![ParamSig::plain(CilType::I4)],
            false,
        );
        assert!(matches!(body.argument(0), Some(ArgSlot::Param(_))));
        assert!(body.argument(1).is_none());
    }

    #[test]
    fn offset_map_round_trips() {
        let code = [0x00, 0x20, 0x05, 0x00, 0x00, 0x00, 0x2A]; // nop, ldc.i4 5, ret
        let body = MethodBody::new(decode_stream(&code).unwrap(), Vec::new(), Vec::new(), false);
        let map = body.offset_map();
        assert_eq!(map[&0], 0);
        assert_eq!(map[&1], 1);
        assert_eq!(map[&6], 2);
    }
}
