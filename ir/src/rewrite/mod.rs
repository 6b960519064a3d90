//! Greedy rewrite driver with fixed-point iteration.
//!
//! This module applies a [`PatternSet`](crate::pattern::PatternSet) to a
//! [`Module`](crate::Module) until no rule matches anymore.

pub mod engine;

pub use engine::{Convergence, GreedyRewriteConfig, RewriteStats, apply_patterns_greedily};
