//! Mutation front-end handed to pattern closures.
//!
//! Every mutation goes through [`Rewriter`], which records the operations it
//! creates, modifies and erases. The driver uses that record to refill its
//! worklist, and to tell a declined attempt from a partial rewrite.

use std::collections::BTreeSet;

use quanta_dtype::TensorType;

use crate::error::Result;
use crate::op::{OpKind, OperationState};
use crate::types::Attribute;
use crate::{InsertPoint, Module, OpId, ValueId};

/// Operations touched by one or more rewrites.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Changes {
    pub created: BTreeSet<OpId>,
    pub modified: BTreeSet<OpId>,
    pub erased: BTreeSet<OpId>,
}

impl Changes {
    pub fn is_empty(&self) -> bool {
        self.created.is_empty() && self.modified.is_empty() && self.erased.is_empty()
    }

    /// Pre-existing operations the rewrite touched. Operations created by the
    /// rewrite are left out even if a later step modified them.
    pub fn touched(&self) -> impl Iterator<Item = OpId> + '_ {
        self.modified.difference(&self.created).copied()
    }
}

pub struct Rewriter<'m> {
    module: &'m mut Module,
    changes: Changes,
}

impl<'m> Rewriter<'m> {
    pub fn new(module: &'m mut Module) -> Self {
        Self { module, changes: Changes::default() }
    }

    /// Read-only view of the module.
    pub fn module(&self) -> &Module {
        self.module
    }

    pub fn has_changes(&self) -> bool {
        !self.changes.is_empty()
    }

    pub fn changes(&self) -> &Changes {
        &self.changes
    }

    pub fn into_changes(self) -> Changes {
        self.changes
    }

    pub fn create_op(&mut self, at: InsertPoint, state: OperationState) -> Result<OpId> {
        let op = self.module.create_op(at, state)?;
        self.changes.created.insert(op);
        Ok(op)
    }

    /// Create a single-result op before `anchor` and return its result.
    pub fn create_before(&mut self, anchor: OpId, state: OperationState) -> Result<ValueId> {
        let op = self.create_op(InsertPoint::Before(anchor), state)?;
        Ok(self.module.op(op)?.results()[0])
    }

    pub fn replace_all_uses(&mut self, from: ValueId, to: ValueId) -> Result<()> {
        self.touch_users(from);
        self.module.replace_all_uses(from, to)
    }

    pub fn replace_all_uses_except(&mut self, from: ValueId, to: ValueId, except: OpId) -> Result<()> {
        let users: Vec<OpId> = self.module.users(from).into_iter().filter(|&u| u != except).collect();
        self.changes.modified.extend(users);
        self.module.replace_all_uses_except(from, to, except)
    }

    /// Redirect every result of `op` to `replacements` (same arity) and erase it.
    pub fn replace_op(&mut self, op: OpId, replacements: &[ValueId]) -> Result<()> {
        let results = self.module.op(op)?.results().to_vec();
        for (&from, &to) in results.iter().zip(replacements) {
            self.replace_all_uses(from, to)?;
        }
        self.erase_op(op)
    }

    pub fn erase_op(&mut self, op: OpId) -> Result<()> {
        let operands = self.module.op(op)?.operands().to_vec();
        self.module.erase_op(op)?;
        self.changes.created.remove(&op);
        self.changes.modified.remove(&op);
        self.changes.erased.insert(op);
        // Producers may have become dead.
        for value in operands {
            if let Some(def) = self.module.defining_op(value) {
                self.changes.modified.insert(def);
            }
        }
        Ok(())
    }

    /// Erase `op` when it is pure and none of its results is read. Returns whether it was erased.
    pub fn erase_if_dead(&mut self, op: OpId) -> Result<bool> {
        let Ok(operation) = self.module.op(op) else {
            return Ok(false);
        };
        let dead = operation.kind().is_pure() && operation.results().iter().all(|&r| self.module.is_unused(r));
        if dead {
            self.erase_op(op)?;
        }
        Ok(dead)
    }

    pub fn set_value_type(&mut self, value: ValueId, ty: TensorType) -> Result<()> {
        self.touch_users(value);
        if let Some(def) = self.module.defining_op(value) {
            self.changes.modified.insert(def);
        }
        self.module.set_value_type(value, ty)
    }

    pub fn set_operand(&mut self, op: OpId, index: usize, value: ValueId) -> Result<()> {
        self.module.set_operand(op, index, value)?;
        self.changes.modified.insert(op);
        Ok(())
    }

    pub fn set_attr(&mut self, op: OpId, name: impl Into<String>, value: impl Into<Attribute>) -> Result<()> {
        self.module.set_attr(op, name, value)?;
        self.changes.modified.insert(op);
        Ok(())
    }

    /// Move the regions of `from` onto `to`.
    pub fn take_regions(&mut self, from: OpId, to: OpId) -> Result<()> {
        self.module.take_regions(from, to)?;
        self.changes.modified.insert(from);
        self.changes.modified.insert(to);
        Ok(())
    }

    /// Convenience for rules that match on kind only.
    pub fn kind(&self, op: OpId) -> Option<OpKind> {
        self.module.kind(op)
    }

    fn touch_users(&mut self, value: ValueId) {
        let users = self.module.users(value);
        self.changes.modified.extend(users);
    }
}
