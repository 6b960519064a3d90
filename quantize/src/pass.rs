//! The quantize pass: applies the registered patterns to a module until fixpoint.

use quanta_ir::{Diagnostic, GreedyRewriteConfig, Module, PatternSet, RewriteStats, apply_patterns_greedily};

use crate::options::QuantizePassOptions;
use crate::registry::build_patterns;
use crate::spec::QuantPassSpec;

/// Message attached to the module when the driver runs out of iterations.
pub const CONVERGENCE_WARNING: &str = "failed to converge pattern at quantize pass";

/// Result of one pass invocation.
#[derive(Debug, Clone, PartialEq, Eq, derive_more::Display)]
#[display("{} rewrites in {} iterations ({})", stats.rewrites, stats.iterations, stats.convergence)]
pub struct PassOutcome {
    pub stats: RewriteStats,
    /// Whether the convergence warning was emitted on the module.
    pub warned: bool,
}

impl PassOutcome {
    pub fn converged(&self) -> bool {
        self.stats.converged()
    }
}

/// Quantization rewrite pass.
///
/// Construction is cheap; the pattern set is built once and reused for every
/// module the pass runs on. Runs on distinct modules are independent.
#[derive(Debug, Clone)]
pub struct QuantizePass {
    spec: QuantPassSpec,
    patterns: PatternSet<QuantPassSpec>,
    config: GreedyRewriteConfig,
}

impl QuantizePass {
    pub const NAME: &'static str = "quantize";

    pub fn new(options: &QuantizePassOptions) -> Self {
        let spec = options.pass_spec();
        let patterns = build_patterns(&spec.specs);
        Self { spec, patterns, config: options.rewrite_config() }
    }

    pub fn spec(&self) -> &QuantPassSpec {
        &self.spec
    }

    pub fn patterns(&self) -> &PatternSet<QuantPassSpec> {
        &self.patterns
    }

    /// Rewrite `module` in place.
    ///
    /// Never fails: declined matches are silent, and running out of iterations
    /// attaches a single warning to the module while keeping its last state.
    pub fn run(&self, module: &mut Module) -> PassOutcome {
        let _span = tracing::debug_span!("quantize_pass", module = module.name()).entered();

        let stats = apply_patterns_greedily(module, &self.patterns, &self.spec, &self.config);
        let warned = !stats.converged();
        if warned {
            tracing::warn!(iterations = stats.iterations, rewrites = stats.rewrites, "{CONVERGENCE_WARNING}");
            module.emit(Diagnostic::warning(CONVERGENCE_WARNING));
        }
        tracing::debug!(rewrites = stats.rewrites, applied = ?stats.applied, "quantize pass finished");
        PassOutcome { stats, warned }
    }
}

impl Default for QuantizePass {
    fn default() -> Self {
        Self::new(&QuantizePassOptions::default())
    }
}
