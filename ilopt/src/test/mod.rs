//! Shared builders for unit tests.

mod factories;

pub(crate) use factories::{ctor_sig, static_sig, Asm};
