//! Property-based tests: random method bodies drawn from a supported
//! instruction alphabet must uphold the structural CFG invariants and the
//! analyzer's mode ordering.

use proptest::prelude::*;

use ilopt::analysis::{ControlFlowGraph, DefiniteAssignment, Mode};
use ilopt::il::{decode_stream, CilType, MethodBody};

/// One generated instruction, before layout.
#[derive(Debug, Clone, Copy)]
enum Op {
    Nop,
    LdcI4,
    LdcI8,
    Ldloc(u8),
    Stloc(u8),
    Ldloca(u8),
    Pop,
    Add,
    /// Conditional branch to the instruction at this position in the
    /// generated sequence (resolved to a byte offset at layout time).
    Brtrue(usize),
}

impl Op {
    fn size(self) -> u32 {
        match self {
            Op::Nop | Op::Pop | Op::Add => 1,
            Op::LdcI4 => 2, // ldc.i4.s
            Op::LdcI8 => 9,
            Op::Ldloc(_) | Op::Stloc(_) | Op::Ldloca(_) | Op::Brtrue(_) => 2,
        }
    }
}

/// Lays the generated sequence out as real bytecode, appending a final
/// `ret` so execution cannot run off the end.
fn assemble(ops: &[Op], local_count: u8) -> Vec<u8> {
    // Branch targets are generated as sequence positions; clamp them into
    // range (the final ret is a valid target too).
    let mut offsets = Vec::with_capacity(ops.len() + 1);
    let mut position = 0u32;
    for op in ops {
        offsets.push(position);
        position += op.size();
    }
    offsets.push(position); // the ret

    let mut code = Vec::new();
    for (index, op) in ops.iter().enumerate() {
        match *op {
            Op::Nop => code.push(0x00),
            Op::LdcI4 => code.extend_from_slice(&[0x1F, 0x07]),
            Op::LdcI8 => {
                code.push(0x21);
                code.extend_from_slice(&1i64.to_le_bytes());
            }
            Op::Ldloc(local) => code.extend_from_slice(&[0x11, local % local_count.max(1)]),
            Op::Stloc(local) => code.extend_from_slice(&[0x13, local % local_count.max(1)]),
            Op::Ldloca(local) => code.extend_from_slice(&[0x12, local % local_count.max(1)]),
            Op::Pop => code.push(0x26),
            Op::Add => code.push(0x58),
            Op::Brtrue(target) => {
                let target = target % offsets.len();
                let next = offsets[index] + 2;
                let displacement = offsets[target] as i64 - i64::from(next);
                // A displacement outside the short form degrades to two
                // nops, keeping the layout intact.
                match i8::try_from(displacement) {
                    Ok(displacement) => {
                        code.extend_from_slice(&[0x2D, displacement.to_le_bytes()[0]]);
                    }
                    Err(_) => code.extend_from_slice(&[0x00, 0x00]),
                }
            }
        }
    }
    code.push(0x2A); // ret
    code
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        Just(Op::Nop),
        Just(Op::LdcI4),
        Just(Op::LdcI8),
        (0u8..4).prop_map(Op::Ldloc),
        (0u8..4).prop_map(Op::Stloc),
        (0u8..4).prop_map(Op::Ldloca),
        Just(Op::Pop),
        Just(Op::Add),
        (0usize..32).prop_map(Op::Brtrue),
    ]
}

fn local_types(count: u8) -> Vec<CilType> {
    (0..count)
        .map(|index| match index % 4 {
            0 => CilType::I4,
            1 => CilType::I8,
            2 => CilType::Class,
            _ => CilType::ValueType { underlying: None },
        })
        .collect()
}

fn generated_body(ops: &[Op], local_count: u8) -> MethodBody {
    let code = assemble(ops, local_count);
    MethodBody::new(
        decode_stream(&code).expect("generated bytecode must decode"),
        local_types(local_count),
        Vec::new(),
        false,
    )
}

fn updated(body: &MethodBody, mode: Mode) -> bool {
    let Ok(cfg) = ControlFlowGraph::build(body) else {
        return false;
    };
    DefiniteAssignment::new(body, &cfg, mode)
        .prove()
        .unwrap_or(false)
}

proptest! {
    /// Every instruction of a generated body lands in exactly one block,
    /// and every edge is recorded on both endpoints.
    #[test]
    fn cfg_bijection_and_edge_symmetry(
        ops in prop::collection::vec(op_strategy(), 0..24),
        local_count in 1u8..4,
    ) {
        let body = generated_body(&ops, local_count);
        let cfg = ControlFlowGraph::build(&body).expect("fall-through keeps every body buildable");

        let mut owners = vec![0usize; body.instructions.len()];
        for id in cfg.block_ids() {
            let block = cfg.block(id);
            prop_assert!(!block.is_empty());
            for index in block.range() {
                owners[index] += 1;
            }
            for &child in &block.children {
                prop_assert!(cfg.block(child).parents.contains(&id));
            }
            for &parent in &block.parents {
                prop_assert!(cfg.block(parent).children.contains(&id));
            }
        }
        for count in owners {
            prop_assert_eq!(count, 1);
        }
    }

    /// Inbound edges only ever target block entries: no two blocks overlap
    /// and every child link lands on a first instruction.
    #[test]
    fn cfg_entry_uniqueness(
        ops in prop::collection::vec(op_strategy(), 0..24),
        local_count in 1u8..4,
    ) {
        let body = generated_body(&ops, local_count);
        let cfg = ControlFlowGraph::build(&body).unwrap();
        for id in cfg.block_ids() {
            for &child in &cfg.block(id).children {
                let entry = cfg.block(child).first_index();
                // The child's entry is the only instruction of it that any
                // edge may target, and entries identify blocks uniquely.
                prop_assert_eq!(
                    cfg.block_ids().filter(|&other| cfg.block(other).first_index() == entry).count(),
                    1
                );
            }
        }
    }

    /// The analyzer is deterministic and respects the mode ordering
    /// none <= out <= csharp, none <= stackalloc <= csharp.
    #[test]
    fn analyzer_mode_monotonicity(
        ops in prop::collection::vec(op_strategy(), 0..24),
        local_count in 1u8..4,
    ) {
        let body = generated_body(&ops, local_count);

        let none = updated(&body, Mode::None);
        let out = updated(&body, Mode::Out);
        let stackalloc = updated(&body, Mode::Stackalloc);
        let csharp = updated(&body, Mode::CSharp);

        prop_assert!(!none || out);
        prop_assert!(!none || stackalloc);
        prop_assert!(!out || csharp);
        prop_assert!(!stackalloc || csharp);

        // Determinism: a second run agrees with the first.
        prop_assert_eq!(updated(&body, Mode::None), none);
        prop_assert_eq!(updated(&body, Mode::CSharp), csharp);
    }
}
