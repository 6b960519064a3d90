//! Ordered rule list with root-kind filtering.
//!
//! Rules are tried strictly in registration order, which is the priority order.
//! A rule registered with root kinds is only offered operations of those kinds;
//! a wildcard rule (no root kinds) is offered every operation.
//!
//! ```ignore
//! let mut set = PatternSet::<Spec>::new();
//! set.add("fold_add_zero", &[OpKind::Add], |rw, op, _spec| {
//!     let Some(zero) = dense_constant(rw.module(), rw.module().op(op)?.operands()[1]) else {
//!         return Ok(RewriteResult::NoMatch);
//!     };
//!     // ...
//!     Ok(RewriteResult::Rewritten)
//! });
//! ```

use std::sync::Arc;

use smallvec::SmallVec;

use crate::error::Result;
use crate::op::OpKind;
use crate::{Module, OpId};

use super::{Changes, RewriteResult, Rewriter};

/// Closure type for pattern matching + rewriting.
///
/// Receives the rewriter, the candidate root and the read-only context shared
/// by every rule. An `Err` is a decline unless the rule already mutated the module.
pub type PatternClosure<C> = Arc<dyn Fn(&mut Rewriter<'_>, OpId, &C) -> Result<RewriteResult> + Send + Sync>;

/// A named rule.
pub struct Rule<C> {
    name: &'static str,
    roots: SmallVec<[OpKind; 2]>,
    closure: PatternClosure<C>,
}

impl<C> Rule<C> {
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Root kinds this rule is offered; empty means every kind.
    pub fn roots(&self) -> &[OpKind] {
        &self.roots
    }

    pub fn accepts(&self, kind: OpKind) -> bool {
        self.roots.is_empty() || self.roots.contains(&kind)
    }
}

impl<C> Clone for Rule<C> {
    fn clone(&self) -> Self {
        Self { name: self.name, roots: self.roots.clone(), closure: Arc::clone(&self.closure) }
    }
}

impl<C> std::fmt::Debug for Rule<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Rule").field("name", &self.name).field("roots", &self.roots).finish_non_exhaustive()
    }
}

/// Outcome of a successful dispatch.
#[derive(Debug, Clone)]
pub struct Applied {
    pub pattern: &'static str,
    pub changes: Changes,
}

/// Ordered set of rules sharing a context type `C`.
pub struct PatternSet<C> {
    rules: Vec<Rule<C>>,
}

impl<C> PatternSet<C> {
    pub fn new() -> Self {
        Self { rules: Vec::new() }
    }

    /// Add a rule offered only operations whose kind is in `roots`.
    ///
    /// An empty `roots` slice registers a wildcard rule.
    pub fn add<F>(&mut self, name: &'static str, roots: &[OpKind], closure: F)
    where
        F: Fn(&mut Rewriter<'_>, OpId, &C) -> Result<RewriteResult> + Send + Sync + 'static,
    {
        self.rules.push(Rule { name, roots: roots.iter().copied().collect(), closure: Arc::new(closure) });
    }

    /// Add a rule offered every operation.
    pub fn add_wildcard<F>(&mut self, name: &'static str, closure: F)
    where
        F: Fn(&mut Rewriter<'_>, OpId, &C) -> Result<RewriteResult> + Send + Sync + 'static,
    {
        self.add(name, &[], closure);
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn rules(&self) -> &[Rule<C>] {
        &self.rules
    }

    /// Rule names in priority order.
    pub fn names(&self) -> Vec<&'static str> {
        self.rules.iter().map(Rule::name).collect()
    }

    /// Offer `op` to every applicable rule in order and stop at the first rewrite.
    ///
    /// Declined attempts leave the module untouched. A rule that fails after
    /// mutating the module is still reported as applied, since its partial
    /// changes stay in place.
    pub fn apply(&self, module: &mut Module, op: OpId, ctx: &C) -> Option<Applied> {
        let kind = module.kind(op)?;

        for rule in self.rules.iter().filter(|r| r.accepts(kind)) {
            let mut rewriter = Rewriter::new(module);
            let result = (rule.closure)(&mut rewriter, op, ctx);
            let changed = rewriter.has_changes();

            match result {
                Ok(RewriteResult::Rewritten) => {
                    tracing::debug!(pattern = rule.name, %op, %kind, "pattern applied");
                    return Some(Applied { pattern: rule.name, changes: rewriter.into_changes() });
                }
                Ok(RewriteResult::NoMatch) if changed => {
                    tracing::warn!(pattern = rule.name, %op, "pattern mutated the module but reported no match");
                    return Some(Applied { pattern: rule.name, changes: rewriter.into_changes() });
                }
                Ok(RewriteResult::NoMatch) => {
                    tracing::trace!(pattern = rule.name, %op, "no match");
                }
                Err(error) if changed => {
                    tracing::error!(pattern = rule.name, %op, %error, "pattern failed after partial rewrite");
                    return Some(Applied { pattern: rule.name, changes: rewriter.into_changes() });
                }
                Err(error) => {
                    tracing::trace!(pattern = rule.name, %op, %error, "declined");
                }
            }
        }

        None
    }
}

impl<C> Default for PatternSet<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C> Clone for PatternSet<C> {
    fn clone(&self) -> Self {
        Self { rules: self.rules.clone() }
    }
}

impl<C> std::fmt::Debug for PatternSet<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.rules.iter().map(Rule::name)).finish()
    }
}

impl<C> std::ops::Add for PatternSet<C> {
    type Output = Self;

    /// Concatenate two sets; rules from `rhs` get lower priority.
    fn add(mut self, rhs: Self) -> Self::Output {
        self.rules.extend(rhs.rules);
        self
    }
}

impl<C> Extend<Rule<C>> for PatternSet<C> {
    fn extend<I: IntoIterator<Item = Rule<C>>>(&mut self, iter: I) {
        self.rules.extend(iter);
    }
}
