//! Per-method static analyses.
//!
//! Three layers, each feeding the next:
//!
//! 1. [`cfg`] builds a basic-block graph from a method body's linear
//!    instruction stream, using an explicit worklist (method bodies can be
//!    arbitrarily deep, so nothing here recurses).
//! 2. [`stack`] is the abstract evaluation-stack simulator: starting right
//!    after a `ldloca`, it walks forward tracking slot widths to find which
//!    instruction consumes the pushed managed pointer, and at which stack
//!    position.
//! 3. [`assign`] is the definite-assignment analyzer: it scans every block's
//!    accesses per local, classifies `ldloca` uses through the simulator,
//!    and decides whether the `init` flag of `.locals` can be stripped.
//!
//! [`operands`] holds the small accessor layer that resolves short and
//! indexed instruction forms (`ldloc.0`, `ldarg.s`, …) to explicit local,
//! argument, field, and type references.

pub mod assign;
pub mod cfg;
pub mod operands;
pub mod stack;

pub use assign::{DefiniteAssignment, Mode, VariableAccessData};
pub use cfg::{BasicBlock, BlockId, ControlFlowGraph};
pub use stack::{find_consumer, Consumer};
