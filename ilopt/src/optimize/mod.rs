//! The optimization driver: applies per-method optimizations across a
//! module and aggregates the outcomes.
//!
//! Every optimization sees one method at a time and returns a tri-state
//! [`MethodOutcome`]. An optimization that fails with an error for a method
//! is counted as [`MethodOutcome::Failed`] for that method only; the driver
//! carries on with the rest of the module.

mod strip;

use std::fmt;

use log::{debug, warn};
use regex::Regex;

use crate::metadata::{MethodDef, Module};
use crate::Result;

pub use crate::analysis::Mode;
pub use strip::StripLocalsInit;

/// Per-method verdict of one optimization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MethodOutcome {
    /// The optimization changed the method.
    Updated,
    /// The method was ineligible (no body, flag already clear, filtered).
    Skipped,
    /// The method was eligible but the required proof did not go through.
    Failed,
}

/// Aggregated outcome counts for one optimization over one module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptimizationStats {
    /// Display name of the optimization.
    pub name: &'static str,
    /// Methods changed.
    pub updated: usize,
    /// Ineligible methods.
    pub skipped: usize,
    /// Eligible methods the proof failed for.
    pub failed: usize,
}

impl OptimizationStats {
    fn new(name: &'static str) -> Self {
        OptimizationStats {
            name,
            updated: 0,
            skipped: 0,
            failed: 0,
        }
    }

    fn count(&mut self, outcome: MethodOutcome) {
        match outcome {
            MethodOutcome::Updated => self.updated += 1,
            MethodOutcome::Skipped => self.skipped += 1,
            MethodOutcome::Failed => self.failed += 1,
        }
    }
}

impl fmt::Display for OptimizationStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: Updated {} Methods, Skipped {} Methods, Failed {} Methods",
            self.name, self.updated, self.skipped, self.failed
        )
    }
}

/// A per-method optimization.
pub trait Optimization {
    /// Display name used in reports.
    fn name(&self) -> &'static str;

    /// Applies the optimization to one method.
    ///
    /// # Errors
    ///
    /// Any error is treated by the driver as a failure of this method
    /// alone.
    fn apply(&self, method: &mut MethodDef) -> Result<MethodOutcome>;
}

/// Processed-entity counts and per-optimization statistics for one module.
#[derive(Debug)]
pub struct RunReport {
    /// Modules processed (always 1 per run today).
    pub modules: usize,
    /// Type definitions visited.
    pub types: usize,
    /// Event rows in the module.
    pub events: usize,
    /// Property rows in the module.
    pub properties: usize,
    /// Methods visited.
    pub methods: usize,
    /// One entry per registered optimization.
    pub optimizations: Vec<OptimizationStats>,
}

/// Applies a set of optimizations to modules, method by method.
#[derive(Default)]
pub struct Optimizer {
    optimizations: Vec<Box<dyn Optimization>>,
    filter: Option<Regex>,
}

impl Optimizer {
    /// An optimizer with no optimizations registered.
    #[must_use]
    pub fn new() -> Self {
        Optimizer::default()
    }

    /// Restricts optimization to methods whose `Namespace.Type::Method`
    /// name matches `filter`. Non-matching methods are counted as skipped.
    #[must_use]
    pub fn with_filter(mut self, filter: Regex) -> Self {
        self.filter = Some(filter);
        self
    }

    /// Registers an optimization; they run in registration order.
    pub fn add(&mut self, optimization: Box<dyn Optimization>) {
        self.optimizations.push(optimization);
    }

    /// Runs every registered optimization over every method of `module`.
    ///
    /// # Errors
    ///
    /// Per-method analysis failures are absorbed into the statistics; only
    /// driver-level failures propagate.
    pub fn run(&self, module: &mut Module) -> Result<RunReport> {
        let order = module.type_order();
        let mut report = RunReport {
            modules: 1,
            types: order.len(),
            events: module.event_count,
            properties: module.property_count,
            methods: module.method_count(),
            optimizations: Vec::with_capacity(self.optimizations.len()),
        };

        for optimization in &self.optimizations {
            let mut stats = OptimizationStats::new(optimization.name());
            for &type_index in &order {
                let type_name = module.types[type_index].full_name();
                for method in &mut module.types[type_index].methods {
                    let full_name = format!("{type_name}::{}", method.name);
                    if let Some(filter) = &self.filter {
                        if !filter.is_match(&full_name) {
                            stats.count(MethodOutcome::Skipped);
                            continue;
                        }
                    }
                    if method.load_failed {
                        stats.count(MethodOutcome::Failed);
                        continue;
                    }
                    match optimization.apply(method) {
                        Ok(outcome) => stats.count(outcome),
                        Err(error) if error.is_method_local() => {
                            debug!("{full_name}: {error}");
                            stats.count(MethodOutcome::Failed);
                        }
                        Err(error) => {
                            warn!("{full_name}: {error}");
                            stats.count(MethodOutcome::Failed);
                        }
                    }
                }
            }
            report.optimizations.push(stats);
        }
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stats_render_the_report_line() {
        let stats = OptimizationStats {
            name: "StripLocalsInit",
            updated: 3,
            skipped: 2,
            failed: 1,
        };
        assert_eq!(
            stats.to_string(),
            "StripLocalsInit: Updated 3 Methods, Skipped 2 Methods, Failed 1 Methods"
        );
    }
}
