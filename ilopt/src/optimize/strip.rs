//! The strip-locals-init optimization.

use crate::analysis::{ControlFlowGraph, DefiniteAssignment, Mode};
use crate::metadata::MethodDef;
use crate::optimize::{MethodOutcome, Optimization};
use crate::Result;

/// Clears the `init` flag of `.locals` when every local is definitely
/// assigned before its first use.
///
/// The runtime zero-initializes the local variable area of a method whose
/// body sets the flag; when the definite-assignment proof goes through,
/// that work is pure overhead. The only mutation ever made is clearing the
/// flag: instructions, signatures, and every other byte of the method stay
/// untouched.
pub struct StripLocalsInit {
    mode: Mode,
}

impl StripLocalsInit {
    /// Creates the optimization with the given proof mode.
    #[must_use]
    pub fn new(mode: Mode) -> Self {
        StripLocalsInit { mode }
    }
}

impl Optimization for StripLocalsInit {
    fn name(&self) -> &'static str {
        "StripLocalsInit"
    }

    fn apply(&self, method: &mut MethodDef) -> Result<MethodOutcome> {
        let Some(body) = method.body.as_mut() else {
            return Ok(MethodOutcome::Skipped);
        };
        if !body.init_locals {
            return Ok(MethodOutcome::Skipped);
        }
        if self.mode == Mode::All {
            body.init_locals = false;
            return Ok(MethodOutcome::Updated);
        }

        let cfg = ControlFlowGraph::build(body)?;
        if DefiniteAssignment::new(body, &cfg, self.mode).prove()? {
            body.init_locals = false;
            Ok(MethodOutcome::Updated)
        } else {
            Ok(MethodOutcome::Failed)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::il::CilType;
    use crate::test::Asm;

    fn method_with(body: crate::il::MethodBody) -> MethodDef {
        MethodDef {
            name: "M".into(),
            body: Some(body),
            fat_header: true,
            ..MethodDef::default()
        }
    }

    #[test]
    fn bodyless_method_is_skipped() {
        let strip = StripLocalsInit::new(Mode::None);
        let mut method = MethodDef {
            name: "Abstract".into(),
            ..MethodDef::default()
        };
        assert_eq!(strip.apply(&mut method).unwrap(), MethodOutcome::Skipped);
    }

    #[test]
    fn clear_flag_is_skipped() {
        let strip = StripLocalsInit::new(Mode::None);
        let mut method = method_with(Asm::new().ret().body(Vec::new()));
        method.body.as_mut().unwrap().init_locals = false;
        assert_eq!(strip.apply(&mut method).unwrap(), MethodOutcome::Skipped);
    }

    #[test]
    fn all_mode_updates_without_analysis() {
        let strip = StripLocalsInit::new(Mode::All);
        // A body the analysis would reject: read before write.
        let mut method = method_with(Asm::new().ldloc(0).pop().ret().body(vec![CilType::I4]));
        assert_eq!(strip.apply(&mut method).unwrap(), MethodOutcome::Updated);
        assert!(!method.body.unwrap().init_locals);
    }

    #[test]
    fn proven_body_is_updated_and_unproven_fails() {
        let strip = StripLocalsInit::new(Mode::None);

        let mut proven = method_with(
            Asm::new()
                .ldc_i4(0)
                .stloc(0)
                .ldloc(0)
                .pop()
                .ret()
                .body(vec![CilType::I4]),
        );
        assert_eq!(strip.apply(&mut proven).unwrap(), MethodOutcome::Updated);
        assert!(!proven.body.unwrap().init_locals);

        let mut unproven = method_with(Asm::new().ldloc(0).pop().ret().body(vec![CilType::I4]));
        assert_eq!(strip.apply(&mut unproven).unwrap(), MethodOutcome::Failed);
        assert!(unproven.body.unwrap().init_locals);
    }

    #[test]
    fn no_locals_with_flag_set_is_updated() {
        let strip = StripLocalsInit::new(Mode::None);
        let mut method = method_with(Asm::new().ret().body(Vec::new()));
        assert_eq!(strip.apply(&mut method).unwrap(), MethodOutcome::Updated);
    }
}
