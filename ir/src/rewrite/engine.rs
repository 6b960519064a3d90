//! Greedy fixed-point rewrite driver.
//!
//! # Algorithm
//!
//! Each iteration snapshots the live operations of the module in pre-order into
//! a FIFO worklist and offers every one that is still live to the
//! [`PatternSet`]. The first rule that rewrites a candidate wins. Erased
//! operations are skipped when their turn comes. Existing operations touched by
//! a rewrite (new operands, retyped values, producers that may have become
//! dead) are queued again, at most once per iteration; operations created
//! during the sweep become candidates of the next iteration. Every sweep is
//! therefore bounded even for rules that never reach a fixed point.
//!
//! The driver stops with [`Convergence::Converged`] after an iteration that
//! changes nothing, and with [`Convergence::Exhausted`] when the last permitted
//! iteration still changed the module (or the rewrite cap was hit). Exhaustion
//! is not an error: the module keeps whatever state the last rewrite left.
//!
//! Candidates are arena handles, so erasing an operation never invalidates the
//! sweep.

use std::collections::{BTreeMap, HashSet, VecDeque};

use bon::bon;

use crate::{Module, OpId};
use crate::pattern::PatternSet;

/// Bounds for [`apply_patterns_greedily`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GreedyRewriteConfig {
    /// Maximum number of full sweeps over the module.
    pub max_iterations: usize,
    /// Optional cap on the total number of applied rewrites.
    pub max_rewrites: Option<usize>,
}

impl GreedyRewriteConfig {
    pub const DEFAULT_MAX_ITERATIONS: usize = 10;
}

impl Default for GreedyRewriteConfig {
    fn default() -> Self {
        Self { max_iterations: Self::DEFAULT_MAX_ITERATIONS, max_rewrites: None }
    }
}

#[bon]
impl GreedyRewriteConfig {
    /// A zero iteration bound is raised to one sweep.
    #[builder]
    pub fn new(#[builder(default = 10)] max_iterations: usize, max_rewrites: Option<usize>) -> Self {
        Self { max_iterations: max_iterations.max(1), max_rewrites }
    }
}

/// Terminal state of the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum Convergence {
    /// An iteration completed without any rewrite.
    Converged,
    /// The iteration or rewrite bound was reached while rewrites were still applying.
    Exhausted,
}

/// What the driver did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewriteStats {
    pub iterations: usize,
    pub rewrites: usize,
    pub convergence: Convergence,
    /// Number of applications per pattern name.
    pub applied: BTreeMap<&'static str, usize>,
}

impl RewriteStats {
    pub fn converged(&self) -> bool {
        self.convergence == Convergence::Converged
    }

    pub fn applied(&self, pattern: &str) -> usize {
        self.applied.get(pattern).copied().unwrap_or(0)
    }
}

/// Apply `patterns` to `module` until nothing matches or the bounds in `config` are hit.
///
/// `ctx` is shared read-only by every rule.
pub fn apply_patterns_greedily<C>(
    module: &mut Module,
    patterns: &PatternSet<C>,
    ctx: &C,
    config: &GreedyRewriteConfig,
) -> RewriteStats {
    let _span = tracing::debug_span!("greedy_rewrite", module = module.name(), patterns = patterns.len()).entered();

    let mut stats = RewriteStats {
        iterations: 0,
        rewrites: 0,
        convergence: Convergence::Converged,
        applied: BTreeMap::new(),
    };

    loop {
        stats.iterations += 1;
        let mut worklist: VecDeque<OpId> = module.walk().into();
        let mut queued: HashSet<OpId> = worklist.iter().copied().collect();
        let mut requeued: HashSet<OpId> = HashSet::new();
        tracing::trace!(iteration = stats.iterations, candidates = worklist.len(), "sweep");

        let mut changed = false;
        while let Some(op) = worklist.pop_front() {
            queued.remove(&op);
            if !module.is_live(op) {
                continue;
            }
            if let Some(cap) = config.max_rewrites
                && stats.rewrites >= cap
            {
                tracing::debug!(cap, "rewrite cap reached");
                stats.convergence = Convergence::Exhausted;
                return stats;
            }
            if let Some(applied) = patterns.apply(module, op, ctx) {
                changed = true;
                stats.rewrites += 1;
                *stats.applied.entry(applied.pattern).or_default() += 1;
                tracing::trace!(
                    created = applied.changes.created.len(),
                    erased = applied.changes.erased.len(),
                    "rewrite committed"
                );
                for touched in applied.changes.touched() {
                    if module.is_live(touched) && !queued.contains(&touched) && requeued.insert(touched) {
                        queued.insert(touched);
                        worklist.push_back(touched);
                    }
                }
            }
        }

        if !changed {
            stats.convergence = Convergence::Converged;
            break;
        }
        if stats.iterations >= config.max_iterations {
            stats.convergence = Convergence::Exhausted;
            break;
        }
    }

    tracing::debug!(
        iterations = stats.iterations,
        rewrites = stats.rewrites,
        convergence = %stats.convergence,
        "greedy rewrite finished"
    );
    stats
}
