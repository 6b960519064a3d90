//! Diagnostics attached to a module by passes.

use crate::OpId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum Severity {
    Remark,
    Warning,
    Error,
}

/// A message a pass reports on the module, optionally anchored at an operation.
#[derive(Debug, Clone, PartialEq, Eq, derive_more::Display)]
#[display("{severity}: {message}")]
pub struct Diagnostic {
    pub severity: Severity,
    pub message: String,
    pub op: Option<OpId>,
}

impl Diagnostic {
    pub fn warning(message: impl Into<String>) -> Self {
        Self { severity: Severity::Warning, message: message.into(), op: None }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self { severity: Severity::Error, message: message.into(), op: None }
    }

    pub fn at(mut self, op: OpId) -> Self {
        self.op = Some(op);
        self
    }
}
