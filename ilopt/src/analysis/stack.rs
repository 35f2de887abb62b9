//! Abstract evaluation-stack simulation: finding the consumer of a
//! `ldloca`-pushed managed pointer.
//!
//! The simulator is not a type system. It tracks a last-in-first-out
//! sequence of stack slot *widths* (4 or 8 bytes), which is enough to pair
//! pops with pushes and to identify the tracked pointer slot by position.
//! The walk starts immediately after a `ldloca` with a single 4-byte entry
//! (the just-pushed pointer, sitting at the bottom of the tracked window)
//! and advances strictly to the next instruction — control flow ends the
//! walk with "no consumer along this straight-line path".
//!
//! The tracked slot is consumed by the first instruction whose pops reach
//! the bottom of the window. The reported stack index is the number of
//! operand slots the instruction expects *below* the pointer: 0 means the
//! pointer is the deepest operand (an `initobj` target, a constructor
//! receiver), matching the classification rules of the definite-assignment
//! analyzer.

use crate::analysis::operands;
use crate::il::{opcodes, ArgSlot, Family, Instruction, MethodBody, SlotWidth};
use crate::{Error, Result};

/// The instruction that consumes a `ldloca`-pushed pointer, and where the
/// pointer sits among its operands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Consumer {
    /// Index of the consuming instruction in the method body.
    pub index: usize,
    /// Depth from the top of the abstract stack at which the pointer is
    /// consumed; 0 means it is the instruction's deepest operand.
    pub stack_index: usize,
}

/// One slot an instruction pops, top first.
#[derive(Debug, Clone, Copy)]
enum Pop {
    /// Any width is acceptable.
    Any,
    /// The slot must have exactly this width.
    Sized(SlotWidth),
}

/// What a non-consuming transition does to the stack.
struct Effect {
    /// Slots popped, top of stack first.
    pops: Vec<Pop>,
    /// Widths pushed after the pops, bottom first.
    pushes: Vec<SlotWidth>,
}

impl Effect {
    fn new(pops: Vec<Pop>, pushes: Vec<SlotWidth>) -> Self {
        Effect { pops, pushes }
    }

    fn none() -> Self {
        Effect::new(Vec::new(), Vec::new())
    }
}

/// Walks forward from `start` (the instruction right after a `ldloca`) and
/// finds the instruction consuming the pushed pointer, if any.
///
/// Returns `None` when a control transfer is reached before anything pops
/// the pointer, or when the walk runs past the last instruction.
///
/// # Errors
///
/// - [`Error::UnsupportedFamily`] for families the simulator does not model.
/// - [`Error::StackUnderflow`] / [`Error::StackMismatch`] when the stream's
///   stack discipline is inconsistent with the declared types.
/// - [`Error::UnsizedType`] when a referenced type has no slot width.
pub fn find_consumer(body: &MethodBody, start: usize) -> Result<Option<Consumer>> {
    let mut stack: Vec<SlotWidth> = vec![SlotWidth::Four];

    for index in start..body.instructions.len() {
        if stack.is_empty() {
            // The pointer and everything above it has been consumed.
            return Ok(None);
        }
        let instruction = &body.instructions[index];

        let effect = match instruction.family {
            Family::Nop | Family::Break | Family::Volatile | Family::Constrained => Effect::none(),

            Family::Ldarg => {
                let width = argument_width(instruction, body)?;
                Effect::new(vec![], vec![width])
            }
            Family::Ldloc => {
                let width = operands::local_type(instruction, body)?.slot_width()?;
                Effect::new(vec![], vec![width])
            }
            Family::Stloc => {
                let width = operands::local_type(instruction, body)?.slot_width()?;
                Effect::new(vec![Pop::Sized(width)], vec![])
            }
            Family::Starg => {
                let width = argument_width(instruction, body)?;
                Effect::new(vec![Pop::Sized(width)], vec![])
            }

            Family::Ldarga
            | Family::Ldloca
            | Family::Ldnull
            | Family::Ldstr
            | Family::Ldsflda
            | Family::Ldtoken
            | Family::Arglist
            | Family::Sizeof => Effect::new(vec![], vec![SlotWidth::Four]),

            Family::Ldc => Effect::new(vec![], vec![ldc_width(instruction.opcode)]),

            Family::Dup => {
                let top = *stack.last().ok_or(Error::StackUnderflow(instruction.offset))?;
                Effect::new(vec![], vec![top])
            }
            Family::Pop => Effect::new(vec![Pop::Any], vec![]),

            Family::Call | Family::Callvirt | Family::Newobj => {
                let sig = operands::method_sig(instruction)?;
                let argument_count = sig.argument_count();
                if argument_count >= stack.len() {
                    return Ok(Some(Consumer {
                        index,
                        stack_index: argument_count - stack.len(),
                    }));
                }
                let mut pops = Vec::with_capacity(argument_count);
                for param in sig.params.iter().rev() {
                    pops.push(Pop::Sized(param.ty.slot_width()?));
                }
                if sig.has_this && !sig.explicit_this {
                    pops.push(Pop::Sized(SlotWidth::Four));
                }
                let pushes = match sig.return_type {
                    crate::il::CilType::Void => vec![],
                    ref ty => vec![ty.slot_width()?],
                };
                Effect::new(pops, pushes)
            }

            Family::Ldind => Effect::new(
                vec![Pop::Sized(SlotWidth::Four)],
                vec![indirect_width(instruction.opcode)],
            ),
            Family::Stind => Effect::new(
                vec![Pop::Sized(indirect_width(instruction.opcode)), Pop::Sized(SlotWidth::Four)],
                vec![],
            ),

            // Calli shares the binary-arithmetic rule: pop two, push the
            // wider. Kept as shipped even though call-site conventions need
            // not match operand widths.
            Family::Add
            | Family::Sub
            | Family::Mul
            | Family::Div
            | Family::Rem
            | Family::And
            | Family::Or
            | Family::Xor
            | Family::Shl
            | Family::Shr
            | Family::Calli => {
                if 2 >= stack.len() {
                    return Ok(Some(Consumer {
                        index,
                        stack_index: 2 - stack.len(),
                    }));
                }
                let first = pop_any(&mut stack, instruction)?;
                let second = pop_any(&mut stack, instruction)?;
                stack.push(first.max(second));
                continue;
            }

            Family::Neg | Family::Not => Effect::none(),

            Family::Conv => Effect::new(vec![Pop::Any], vec![conversion_width(instruction.opcode)]),

            Family::Castclass | Family::Isinst => Effect::new(
                vec![Pop::Sized(SlotWidth::Four)],
                vec![SlotWidth::Four],
            ),
            Family::Unbox | Family::Box => Effect::new(vec![Pop::Any], vec![SlotWidth::Four]),

            Family::Ldfld => Effect::new(
                vec![Pop::Sized(SlotWidth::Four)],
                vec![operands::field_type(instruction)?.slot_width()?],
            ),
            Family::Ldflda => Effect::new(
                vec![Pop::Sized(SlotWidth::Four)],
                vec![SlotWidth::Four],
            ),
            Family::Stfld => {
                let width = operands::field_type(instruction)?.slot_width()?;
                Effect::new(vec![Pop::Sized(width), Pop::Sized(SlotWidth::Four)], vec![])
            }
            Family::Ldsfld => Effect::new(
                vec![],
                vec![operands::field_type(instruction)?.slot_width()?],
            ),
            Family::Stsfld => {
                let width = operands::field_type(instruction)?.slot_width()?;
                Effect::new(vec![Pop::Sized(width)], vec![])
            }

            Family::Newarr | Family::Ldlen => Effect::new(
                vec![Pop::Sized(SlotWidth::Four)],
                vec![SlotWidth::Four],
            ),
            Family::Ldelema => Effect::new(
                vec![Pop::Sized(SlotWidth::Four), Pop::Sized(SlotWidth::Four)],
                vec![SlotWidth::Four],
            ),
            Family::Ldelem => Effect::new(
                vec![Pop::Sized(SlotWidth::Four), Pop::Sized(SlotWidth::Four)],
                vec![element_width(instruction)?],
            ),
            Family::Stelem => Effect::new(
                vec![
                    Pop::Sized(element_width(instruction)?),
                    Pop::Sized(SlotWidth::Four),
                    Pop::Sized(SlotWidth::Four),
                ],
                vec![],
            ),

            Family::Ceq | Family::Cgt | Family::Clt => {
                Effect::new(vec![Pop::Any, Pop::Any], vec![SlotWidth::Four])
            }

            Family::Initobj => Effect::new(vec![Pop::Sized(SlotWidth::Four)], vec![]),

            // A control transfer: the pointer was never consumed along this
            // straight-line path.
            Family::Jmp
            | Family::Ret
            | Family::Br
            | Family::Brfalse
            | Family::Brtrue
            | Family::Beq
            | Family::Bge
            | Family::Bgt
            | Family::Ble
            | Family::Blt
            | Family::Bne
            | Family::Switch
            | Family::Throw => return Ok(None),

            Family::Cpobj
            | Family::Ldobj
            | Family::Stobj
            | Family::Refanyval
            | Family::Ckfinite
            | Family::Mkrefany
            | Family::Endfinally
            | Family::Leave
            | Family::Ldftn
            | Family::Ldvirtftn
            | Family::Localloc
            | Family::Endfilter
            | Family::Cpblk
            | Family::Initblk
            | Family::Tail
            | Family::Unaligned
            | Family::No
            | Family::Rethrow
            | Family::Refanytype
            | Family::Readonly => {
                return Err(Error::UnsupportedFamily(instruction.family));
            }
        };

        if effect.pops.len() >= stack.len() {
            return Ok(Some(Consumer {
                index,
                stack_index: effect.pops.len() - stack.len(),
            }));
        }
        for pop in effect.pops {
            match pop {
                Pop::Any => {
                    pop_any(&mut stack, instruction)?;
                }
                Pop::Sized(expected) => pop_sized(&mut stack, expected, instruction)?,
            }
        }
        stack.extend(effect.pushes);
    }

    Ok(None)
}

fn pop_any(stack: &mut Vec<SlotWidth>, instruction: &Instruction) -> Result<SlotWidth> {
    stack.pop().ok_or(Error::StackUnderflow(instruction.offset))
}

fn pop_sized(
    stack: &mut Vec<SlotWidth>,
    expected: SlotWidth,
    instruction: &Instruction,
) -> Result<()> {
    let found = pop_any(stack, instruction)?;
    if found != expected {
        return Err(Error::StackMismatch {
            offset: instruction.offset,
            expected: expected.bytes(),
            found: found.bytes(),
        });
    }
    Ok(())
}

fn argument_width(instruction: &Instruction, body: &MethodBody) -> Result<SlotWidth> {
    match operands::argument_of(instruction, body)? {
        ArgSlot::This => Ok(SlotWidth::Four),
        ArgSlot::Param(param) => param.ty.slot_width(),
    }
}

/// Width pushed by a `ldc.*` form.
fn ldc_width(opcode: u8) -> SlotWidth {
    match opcode {
        opcodes::LDC_I8 | opcodes::LDC_R8 => SlotWidth::Eight,
        _ => SlotWidth::Four,
    }
}

/// Width moved by a `ldind.*`/`stind.*` form.
fn indirect_width(opcode: u8) -> SlotWidth {
    match opcode {
        opcodes::LDIND_I8 | opcodes::LDIND_R8 | opcodes::STIND_I8 | opcodes::STIND_R8 => {
            SlotWidth::Eight
        }
        _ => SlotWidth::Four,
    }
}

/// Width pushed by a `conv.*` form.
fn conversion_width(opcode: u8) -> SlotWidth {
    match opcode {
        // conv.i8, conv.u8, conv.r8, conv.r.un, conv.ovf.i8[.un], conv.ovf.u8[.un]
        0x6A | 0x6C | 0x6E | 0x76 | 0x85 | 0x89 | 0xB9 | 0xBA => SlotWidth::Eight,
        _ => SlotWidth::Four,
    }
}

/// Element width of a `ldelem`/`stelem` form: from the operand type for the
/// generic forms, from the opcode for the encoded ones.
fn element_width(instruction: &Instruction) -> Result<SlotWidth> {
    match operands::element_type(instruction)? {
        Some(ty) => ty.slot_width(),
        None => Ok(match instruction.opcode {
            opcodes::LDELEM_I8 | opcodes::LDELEM_R8 | opcodes::STELEM_I8 | opcodes::STELEM_R8 => {
                SlotWidth::Eight
            }
            _ => SlotWidth::Four,
        }),
    }
}
