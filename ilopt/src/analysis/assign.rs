//! Definite-assignment analysis over the control-flow graph.
//!
//! Decides whether every local of a method is provably written before its
//! first read, which licenses clearing the `init` flag of `.locals`. The
//! interesting part is classifying `ldloca`: an address taken for an
//! `initobj`, a constructor call, or an `out` argument is an assignment,
//! anything else is treated as a read. The stack simulator
//! ([`crate::analysis::stack`]) locates the consuming instruction for that
//! classification.
//!
//! The shipped decision is intentionally local: a variable is proven only
//! through the root block's accesses or, failing that, through the accesses
//! of the single block referencing it. Multi-block proofs are conservatively
//! rejected.

use rustc_hash::FxHashMap;

use crate::analysis::cfg::{BlockId, ControlFlowGraph};
use crate::analysis::{operands, stack};
use crate::il::{Family, MethodBody};
use crate::Result;

/// Which `ldloca` consumers count as assignments, and whether `localloc`
/// bodies stay eligible.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    /// Only direct writes (`stloc`, `initobj`, constructor calls) count.
    #[default]
    None,
    /// Additionally trust `out` parameters to be assigned by the callee.
    Out,
    /// Additionally tolerate `localloc` in the body.
    Stackalloc,
    /// `Out` and `Stackalloc` combined: the C# compiler's guarantees.
    CSharp,
    /// Strip unconditionally, skipping analysis. An explicit user override.
    All,
}

impl Mode {
    /// Whether `out`-parameter passing counts as an assignment.
    #[must_use]
    pub fn trusts_out_params(self) -> bool {
        matches!(self, Mode::Out | Mode::CSharp | Mode::All)
    }

    /// Whether `localloc`-bearing bodies remain eligible.
    #[must_use]
    pub fn tolerates_localloc(self) -> bool {
        matches!(self, Mode::Stackalloc | Mode::CSharp | Mode::All)
    }
}

/// Per-(block, local) access record, kept in a side table of the analyzer
/// rather than on the block itself.
#[derive(Debug, Default, Clone)]
pub struct VariableAccessData {
    /// Indices of the block's accesses to the local, in stream order.
    pub instructions: Vec<usize>,
    /// Whether the block's first access is a write.
    pub assigned_first: bool,
    /// Whether any access in the block is a write.
    pub assigned_after: bool,
    /// Reserved for an inter-block proof; never set by the shipped
    /// analysis.
    pub assigned_before: bool,
}

/// The definite-assignment analyzer for one method body.
pub struct DefiniteAssignment<'a> {
    body: &'a MethodBody,
    cfg: &'a ControlFlowGraph,
    mode: Mode,
    accesses: FxHashMap<(BlockId, u16), VariableAccessData>,
    /// Blocks referencing each local, in traversal order, duplicate-free.
    referencing: FxHashMap<u16, Vec<BlockId>>,
    contains_localloc: bool,
}

impl<'a> DefiniteAssignment<'a> {
    /// Creates an analyzer over a body and its CFG.
    #[must_use]
    pub fn new(body: &'a MethodBody, cfg: &'a ControlFlowGraph, mode: Mode) -> Self {
        DefiniteAssignment {
            body,
            cfg,
            mode,
            accesses: FxHashMap::default(),
            referencing: FxHashMap::default(),
            contains_localloc: false,
        }
    }

    /// Decides whether every declared local is definitely assigned before
    /// its first use.
    ///
    /// # Errors
    ///
    /// Propagates simulator and accessor failures; the caller reports the
    /// method as failed.
    pub fn prove(mut self) -> Result<bool> {
        for block in self.cfg.depth_first() {
            self.scan_block(block)?;
        }

        if self.contains_localloc && !self.mode.tolerates_localloc() {
            return Ok(false);
        }

        let root = self.cfg.root();
        for local in 0..self.body.locals.len() {
            let local = local as u16;
            let Some(blocks) = self.referencing.get(&local) else {
                // Never referenced; zero-initialization is unobservable.
                continue;
            };
            let data = if blocks.contains(&root) {
                self.accesses.get(&(root, local))
            } else if let [only] = blocks.as_slice() {
                self.accesses.get(&(*only, local))
            } else {
                // Referenced across blocks without touching the root: the
                // inter-block proof is not implemented.
                None
            };
            if !data.is_some_and(|data| data.assigned_first) {
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn scan_block(&mut self, block: BlockId) -> Result<()> {
        for index in self.cfg.block(block).range() {
            let instruction = &self.body.instructions[index];
            match instruction.family {
                Family::Stloc => {
                    let local = operands::local_index(instruction)?;
                    self.record(block, local, index, true);
                }
                Family::Ldloc => {
                    let local = operands::local_index(instruction)?;
                    self.record(block, local, index, false);
                }
                Family::Ldloca => {
                    let local = operands::local_index(instruction)?;
                    let first_access = !self.accesses.contains_key(&(block, local));
                    let write = if first_access {
                        self.address_is_assigned(index)?
                    } else {
                        false
                    };
                    self.record(block, local, index, write);
                }
                Family::Localloc => {
                    self.contains_localloc = true;
                }
                _ => {}
            }
        }
        Ok(())
    }

    /// Classifies a `ldloca` at `index`: does the consumer of the pushed
    /// address assign through it?
    fn address_is_assigned(&self, index: usize) -> Result<bool> {
        let Some(consumer) = stack::find_consumer(self.body, index + 1)? else {
            return Ok(false);
        };
        let instruction = &self.body.instructions[consumer.index];
        match instruction.family {
            Family::Initobj => Ok(consumer.stack_index == 0),
            Family::Call | Family::Callvirt | Family::Newobj => {
                let sig = operands::method_sig(instruction)?;
                if consumer.stack_index == 0 && sig.is_ctor {
                    return Ok(true);
                }
                if !self.mode.trusts_out_params() {
                    return Ok(false);
                }
                // Map the stack position onto the parameter list: the
                // receiver, when present, is the deepest slot.
                let receiver = usize::from(sig.has_this && !sig.explicit_this);
                let Some(param_index) = consumer.stack_index.checked_sub(receiver) else {
                    return Ok(false);
                };
                Ok(sig
                    .params
                    .get(param_index)
                    .is_some_and(|param| param.is_out))
            }
            _ => Ok(false),
        }
    }

    fn record(&mut self, block: BlockId, local: u16, index: usize, write: bool) {
        let data = self.accesses.entry((block, local)).or_default();
        if data.instructions.is_empty() {
            data.assigned_first = write;
            let blocks = self.referencing.entry(local).or_default();
            if !blocks.contains(&block) {
                blocks.push(block);
            }
        }
        data.assigned_after |= write;
        data.instructions.push(index);
    }
}
