//! Pattern matching infrastructure for module rewrites.
//!
//! A [`PatternSet`] is an ordered list of named rules. Each rule is a closure
//! that inspects a candidate root operation and either declines
//! ([`RewriteResult::NoMatch`]) or mutates the module through a [`Rewriter`]
//! and reports [`RewriteResult::Rewritten`]. The first rule that rewrites wins.

pub mod helpers;
pub mod matcher;
pub mod rewriter;

pub use helpers::{defining_dequantize, dense_constant, marker_input, single_quantize_user};
pub use matcher::{Applied, PatternClosure, PatternSet, Rule};
pub use rewriter::{Changes, Rewriter};

/// Result of applying a pattern to a candidate root.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RewriteResult {
    /// Precondition failed or the rewrite declined; the module is untouched.
    NoMatch,
    /// The module was rewritten.
    Rewritten,
}

impl RewriteResult {
    pub fn is_rewritten(self) -> bool {
        matches!(self, Self::Rewritten)
    }
}

impl From<bool> for RewriteResult {
    fn from(rewritten: bool) -> Self {
        if rewritten { Self::Rewritten } else { Self::NoMatch }
    }
}
