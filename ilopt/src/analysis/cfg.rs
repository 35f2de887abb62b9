//! Control-flow graph construction over a method body's instruction stream.
//!
//! Blocks live in an arena with stable integer ids; parent/child edges are
//! id sets kept on both endpoints. Construction is a worklist loop — method
//! bodies can be deep, so neither construction, splitting, nor the
//! traversals recurse.
//!
//! # Construction
//!
//! The builder grows blocks forward from their entry instruction. A branch
//! target falls into one of three cases, tried in order:
//!
//! 1. the target is already some block's entry — link to that block;
//! 2. the target sits in the middle of an existing block — split that block
//!    at the target, the new tail block inheriting the original's
//!    successors;
//! 3. the target is unseen — open a fresh single-instruction block and
//!    queue it for growth.
//!
//! The resulting graph is rooted at the method's first instruction, may be
//! cyclic, and holds every reachable instruction in exactly one block.

use rustc_hash::FxHashMap;

use crate::il::{Family, FlowKind, Instruction, MethodBody};
use crate::{Error, Result};

/// Stable identifier of a basic block within its graph's arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockId(usize);

impl BlockId {
    /// The arena index.
    #[must_use]
    pub fn index(self) -> usize {
        self.0
    }
}

/// A basic block: a contiguous, non-empty run of instructions with edges to
/// its successors and predecessors.
#[derive(Debug, Clone)]
pub struct BasicBlock {
    /// Index of the block's first instruction (its unique entry).
    first: usize,
    /// One past the index of the block's last instruction.
    end: usize,
    /// Successor blocks, in insertion order, duplicate-free.
    pub children: Vec<BlockId>,
    /// Predecessor blocks, in insertion order, duplicate-free.
    pub parents: Vec<BlockId>,
}

impl BasicBlock {
    fn new(first: usize) -> Self {
        BasicBlock {
            first,
            end: first + 1,
            children: Vec::new(),
            parents: Vec::new(),
        }
    }

    /// Index of the entry instruction.
    #[must_use]
    pub fn first_index(&self) -> usize {
        self.first
    }

    /// Index of the last instruction.
    #[must_use]
    pub fn last_index(&self) -> usize {
        self.end - 1
    }

    /// The instruction index range `[first, end)` this block owns.
    #[must_use]
    pub fn range(&self) -> std::ops::Range<usize> {
        self.first..self.end
    }

    /// Number of instructions in the block.
    #[must_use]
    pub fn len(&self) -> usize {
        self.end - self.first
    }

    /// Blocks are never empty once construction finishes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.end == self.first
    }
}

/// A rooted, possibly cyclic graph of basic blocks over one method body.
#[derive(Debug)]
pub struct ControlFlowGraph {
    blocks: Vec<BasicBlock>,
    root: BlockId,
}

impl ControlFlowGraph {
    /// Builds the CFG for a method body.
    ///
    /// # Errors
    ///
    /// - [`Error::Malformed`] when the body is empty, execution can run off
    ///   its end, or a branch lands inside an instruction's encoding.
    /// - [`Error::UnsupportedFlow`] for `Phi` and for any `Meta` opcode
    ///   other than `volatile.`.
    pub fn build(body: &MethodBody) -> Result<Self> {
        Builder::new(body)?.run()
    }

    /// The root block, containing the method's first instruction.
    #[must_use]
    pub fn root(&self) -> BlockId {
        self.root
    }

    /// Number of blocks in the graph.
    #[must_use]
    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    /// The block with the given id.
    #[must_use]
    pub fn block(&self, id: BlockId) -> &BasicBlock {
        &self.blocks[id.0]
    }

    /// All block ids in arena order.
    pub fn block_ids(&self) -> impl Iterator<Item = BlockId> {
        (0..self.blocks.len()).map(BlockId)
    }

    /// Blocks in depth-first order from the root.
    ///
    /// A worklist stack with insertion-ordered child iteration; every block
    /// appears exactly once.
    #[must_use]
    pub fn depth_first(&self) -> Vec<BlockId> {
        let mut order = Vec::with_capacity(self.blocks.len());
        let mut visited = vec![false; self.blocks.len()];
        let mut stack = vec![self.root];
        visited[self.root.0] = true;
        while let Some(id) = stack.pop() {
            order.push(id);
            for &child in &self.blocks[id.0].children {
                if !visited[child.0] {
                    visited[child.0] = true;
                    stack.push(child);
                }
            }
        }
        order
    }

    /// Blocks in breadth-first order from the root.
    #[must_use]
    pub fn breadth_first(&self) -> Vec<BlockId> {
        let mut order = Vec::with_capacity(self.blocks.len());
        let mut visited = vec![false; self.blocks.len()];
        let mut queue = std::collections::VecDeque::from([self.root]);
        visited[self.root.0] = true;
        while let Some(id) = queue.pop_front() {
            order.push(id);
            for &child in &self.blocks[id.0].children {
                if !visited[child.0] {
                    visited[child.0] = true;
                    queue.push_back(child);
                }
            }
        }
        order
    }
}

struct Builder<'a> {
    body: &'a MethodBody,
    offsets: FxHashMap<u32, usize>,
    blocks: Vec<BasicBlock>,
    /// Owning block per instruction index, if any block claimed it yet.
    owner: Vec<Option<usize>>,
    /// Block whose entry a given instruction index is, if any.
    entry: Vec<Option<usize>>,
    /// Blocks whose tail still needs to be grown.
    pending: Vec<usize>,
}

impl<'a> Builder<'a> {
    fn new(body: &'a MethodBody) -> Result<Self> {
        if body.instructions.is_empty() {
            return Err(Error::Malformed("method body has no instructions".into()));
        }
        let count = body.instructions.len();
        let mut builder = Builder {
            body,
            offsets: body.offset_map(),
            blocks: Vec::new(),
            owner: vec![None; count],
            entry: vec![None; count],
            pending: Vec::new(),
        };
        builder.open_block(0);
        Ok(builder)
    }

    /// Creates a single-instruction block at `index`, registers it in both
    /// maps, and queues it for growth.
    fn open_block(&mut self, index: usize) -> usize {
        let id = self.blocks.len();
        self.blocks.push(BasicBlock::new(index));
        self.owner[index] = Some(id);
        self.entry[index] = Some(id);
        self.pending.push(id);
        id
    }

    fn run(mut self) -> Result<ControlFlowGraph> {
        while let Some(block) = self.pending.pop() {
            self.grow(block)?;
        }
        Ok(ControlFlowGraph {
            blocks: self.blocks,
            root: BlockId(0),
        })
    }

    /// Grows `block` by advancing its tail instruction until the block is
    /// terminated by control flow or runs into another block's entry.
    fn grow(&mut self, block: usize) -> Result<()> {
        loop {
            let tail = self.blocks[block].last_index();
            let instruction = &self.body.instructions[tail];
            match instruction.flow {
                FlowKind::Next | FlowKind::Break | FlowKind::Call => {
                    if !self.append_next(block, tail)? {
                        return Ok(());
                    }
                }
                FlowKind::Meta => {
                    if instruction.family != Family::Volatile {
                        return Err(Error::UnsupportedFlow(instruction.mnemonic));
                    }
                    if !self.append_next(block, tail)? {
                        return Ok(());
                    }
                }
                FlowKind::Branch => {
                    let target = self.target_index(instruction)?;
                    let mut source = block;
                    self.process_branch_target(target, &mut source);
                    return Ok(());
                }
                FlowKind::CondBranch => {
                    let mut source = block;
                    if instruction.family == Family::Switch {
                        for offset in instruction.branch_targets() {
                            let target = self.index_of(offset, instruction)?;
                            self.process_branch_target(target, &mut source);
                        }
                    } else {
                        let target = self.target_index(instruction)?;
                        self.process_branch_target(target, &mut source);
                    }
                    let fallthrough = self.next_index(tail)?;
                    self.process_branch_target(fallthrough, &mut source);
                    return Ok(());
                }
                FlowKind::Return | FlowKind::Throw => return Ok(()),
                FlowKind::Phi => return Err(Error::UnsupportedFlow(instruction.mnemonic)),
            }
        }
    }

    /// Appends the instruction after `tail` to `block`, or links to the
    /// block it already begins. Returns whether growth continues.
    fn append_next(&mut self, block: usize, tail: usize) -> Result<bool> {
        let next = self.next_index(tail)?;
        if let Some(existing) = self.entry[next] {
            Self::link(&mut self.blocks, block, existing);
            return Ok(false);
        }
        debug_assert!(self.owner[next].is_none());
        self.owner[next] = Some(block);
        self.blocks[block].end = next + 1;
        Ok(true)
    }

    /// The instruction index after `tail`, failing when execution would run
    /// off the end of the body.
    fn next_index(&self, tail: usize) -> Result<usize> {
        let next = tail + 1;
        if next >= self.body.instructions.len() {
            return Err(Error::Malformed(format!(
                "execution runs off the end of the method body after offset 0x{:04X}",
                self.body.instructions[tail].offset
            )));
        }
        Ok(next)
    }

    /// Resolves the single branch target of `instruction` to an
    /// instruction index.
    fn target_index(&self, instruction: &Instruction) -> Result<usize> {
        let targets = instruction.branch_targets();
        match targets.first() {
            Some(&offset) => self.index_of(offset, instruction),
            None => Err(Error::Malformed(format!(
                "branch at offset 0x{:04X} has no target operand",
                instruction.offset
            ))),
        }
    }

    fn index_of(&self, offset: u32, instruction: &Instruction) -> Result<usize> {
        self.offsets.get(&offset).copied().ok_or_else(|| {
            Error::Malformed(format!(
                "branch at offset 0x{:04X} targets 0x{offset:04X}, which is not an instruction boundary",
                instruction.offset
            ))
        })
    }

    /// Attaches the block holding `target` as a successor of `*source`,
    /// creating or splitting blocks as needed.
    ///
    /// Splitting may move `*source`'s own tail (and with it the in-flight
    /// branch instruction) into the new block; `*source` is re-homed so
    /// every edge leaves the block that actually contains the branch.
    fn process_branch_target(&mut self, target: usize, source: &mut usize) {
        let resolved = if let Some(existing) = self.entry[target] {
            existing
        } else if let Some(owning) = self.owner[target] {
            let split = self.split(owning, target);
            if owning == *source {
                // The growing block's tail (including the in-flight branch)
                // moved into the split-off block.
                *source = split;
            }
            split
        } else {
            self.open_block(target)
        };
        Self::link(&mut self.blocks, *source, resolved);
    }

    /// Splits `block` at `target`: the prefix keeps the original id, the
    /// suffix becomes a new block inheriting the original's successors, and
    /// the pair is linked by a fall-through edge.
    fn split(&mut self, block: usize, target: usize) -> usize {
        let id = self.blocks.len();
        let end = self.blocks[block].end;
        let mut tail = BasicBlock::new(target);
        tail.end = end;
        tail.children = std::mem::take(&mut self.blocks[block].children);
        self.blocks[block].end = target;
        self.blocks.push(tail);

        for index in target..end {
            self.owner[index] = Some(id);
        }
        self.entry[target] = Some(id);

        // Re-point the transferred successors' parent sets at the tail.
        let children = self.blocks[id].children.clone();
        for child in children {
            for parent in &mut self.blocks[child.0].parents {
                if parent.0 == block {
                    *parent = BlockId(id);
                }
            }
        }
        Self::link(&mut self.blocks, block, id);
        id
    }

    /// Adds a `parent -> child` edge, keeping both sets duplicate-free.
    fn link(blocks: &mut [BasicBlock], parent: usize, child: usize) {
        if !blocks[parent].children.contains(&BlockId(child)) {
            blocks[parent].children.push(BlockId(child));
        }
        if !blocks[child].parents.contains(&BlockId(parent)) {
            blocks[child].parents.push(BlockId(parent));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::il::decode_stream;

    fn cfg_of(code: &[u8]) -> ControlFlowGraph {
        let body = MethodBody::new(decode_stream(code).unwrap(), Vec::new(), Vec::new(), false);
        ControlFlowGraph::build(&body).unwrap()
    }

    /// Every instruction owned by exactly one block, every block's first
    /// instruction the sole inbound-edge target, edges bidirectional.
    fn assert_invariants(cfg: &ControlFlowGraph, instruction_count: usize) {
        let mut owners = vec![0usize; instruction_count];
        for id in cfg.block_ids() {
            let block = cfg.block(id);
            assert!(!block.is_empty(), "block {id:?} is empty");
            for index in block.range() {
                owners[index] += 1;
            }
            for &child in &block.children {
                assert!(
                    cfg.block(child).parents.contains(&id),
                    "edge {id:?} -> {child:?} missing its reverse"
                );
            }
            for &parent in &block.parents {
                assert!(
                    cfg.block(parent).children.contains(&id),
                    "edge {parent:?} -> {id:?} missing its forward"
                );
            }
        }
        for (index, count) in owners.iter().enumerate() {
            assert_eq!(*count, 1, "instruction {index} owned by {count} blocks");
        }
    }

    #[test]
    fn straight_line_is_one_block() {
        let cfg = cfg_of(&[0x00, 0x16, 0x0A, 0x06, 0x2A]); // nop ldc.i4.0 stloc.0 ldloc.0 ret
        assert_eq!(cfg.block_count(), 1);
        assert_eq!(cfg.block(cfg.root()).len(), 5);
        assert_invariants(&cfg, 5);
    }

    #[test]
    fn conditional_branch_splits_flow() {
        // 0: brtrue.s -> 3; 2: ret; 3: ret
        let cfg = cfg_of(&[0x2D, 0x01, 0x2A, 0x2A]);
        assert_eq!(cfg.block_count(), 3);
        let root = cfg.block(cfg.root());
        assert_eq!(root.children.len(), 2);
        assert_invariants(&cfg, 3);
    }

    #[test]
    fn backward_branch_into_block_middle_splits_it() {
        // 0: nop; 1: nop; 2: brtrue.s -> 1
        // The growing root is split at instruction 1; the tail block holds
        // the branch and loops back to itself.
        let cfg = cfg_of(&[0x00, 0x00, 0x2D, 0xFD, 0x2A]);
        assert_invariants(&cfg, 4);
        assert_eq!(cfg.block_count(), 3);

        let root = cfg.block(cfg.root());
        assert_eq!(root.range(), 0..1);
        assert_eq!(root.children.len(), 1);

        let tail = cfg.block(root.children[0]);
        assert_eq!(tail.first_index(), 1);
        // Loop edge: the split tail branches back to its own entry.
        assert!(tail.children.contains(&root.children[0]));
    }

    #[test]
    fn forward_branch_reuses_existing_entry() {
        // 0: br.s -> 3; 2: ret; 3: br.s -> 2
        let cfg = cfg_of(&[0x2B, 0x01, 0x2A, 0x2B, 0xFD]);
        assert_invariants(&cfg, 3);
        assert_eq!(cfg.block_count(), 3);
    }

    #[test]
    fn switch_links_every_case_and_the_fallthrough() {
        // switch(2: -> 14, -> 15); 13: ret; 14: ret; 15: ret
        let cfg = cfg_of(&[
            0x45, 0x02, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x02, 0x00, 0x00, 0x00, 0x2A,
            0x2A, 0x2A,
        ]);
        assert_invariants(&cfg, 4);
        assert_eq!(cfg.block_count(), 4);
        assert_eq!(cfg.block(cfg.root()).children.len(), 3);
    }

    #[test]
    fn self_loop_is_permitted() {
        let cfg = cfg_of(&[0x2D, 0xFE, 0x2A]); // 0: brtrue.s -> 0; 2: ret
        assert_invariants(&cfg, 2);
        let root = cfg.root();
        assert!(cfg.block(root).children.contains(&root));
        assert!(cfg.block(root).parents.contains(&root));
    }

    #[test]
    fn traversals_visit_each_block_once_starting_at_the_root() {
        let cfg = cfg_of(&[0x2D, 0x01, 0x2A, 0x2B, 0xFD, 0x2A]);
        let dfs = cfg.depth_first();
        let bfs = cfg.breadth_first();
        assert_eq!(dfs[0], cfg.root());
        assert_eq!(bfs[0], cfg.root());
        assert_eq!(dfs.len(), cfg.block_count());
        assert_eq!(bfs.len(), cfg.block_count());
        let mut sorted = dfs.clone();
        sorted.sort();
        sorted.dedup();
        assert_eq!(sorted.len(), dfs.len());
    }

    #[test]
    fn meta_other_than_volatile_is_unsupported() {
        // constrained. <token>; callvirt <token>; ret
        let code = [
            0xFE, 0x16, 0x01, 0x00, 0x00, 0x02, 0x6F, 0x01, 0x00, 0x00, 0x0A, 0x2A,
        ];
        let body = MethodBody::new(decode_stream(&code).unwrap(), Vec::new(), Vec::new(), false);
        assert!(matches!(
            ControlFlowGraph::build(&body),
            Err(Error::UnsupportedFlow("constrained."))
        ));
    }

    #[test]
    fn volatile_prefix_is_linear() {
        // volatile.; ldsfld <token>; pop; ret
        let code = [0xFE, 0x13, 0x7E, 0x01, 0x00, 0x00, 0x04, 0x26, 0x2A];
        let cfg = cfg_of(&code);
        assert_eq!(cfg.block_count(), 1);
        assert_invariants(&cfg, 4);
    }

    #[test]
    fn running_off_the_end_is_malformed() {
        let body = MethodBody::new(
            decode_stream(&[0x00, 0x00]).unwrap(),
            Vec::new(),
            Vec::new(),
            false,
        );
        assert!(matches!(
            ControlFlowGraph::build(&body),
            Err(Error::Malformed(_))
        ));
    }

    #[test]
    fn branch_into_an_instruction_encoding_is_malformed() {
        // 0: br.s -> 3 lands inside the ldc.i4 at offset 2
        let code = [0x2B, 0x01, 0x20, 0x00, 0x00, 0x00, 0x00, 0x2A];
        let body = MethodBody::new(decode_stream(&code).unwrap(), Vec::new(), Vec::new(), false);
        assert!(matches!(
            ControlFlowGraph::build(&body),
            Err(Error::Malformed(_))
        ));
    }

    #[test]
    fn empty_body_is_malformed() {
        let body = MethodBody::new(Vec::new(), Vec::new(), Vec::new(), false);
        assert!(ControlFlowGraph::build(&body).is_err());
    }
}
