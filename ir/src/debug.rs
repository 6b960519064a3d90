//! Textual form of a module, close to MLIR's generic syntax.
//!
//! ```text
//! module @m {
//!   func @main(%0: tensor<4xf32>) {
//!     %1 = quant.qcast(%0) : (tensor<4xf32>) -> tensor<4x!quant.uniform<i8:f32, 0.5:0>>
//!     func.return(%1) : (tensor<4x!quant.uniform<i8:f32, 0.5:0>>) -> ()
//!   }
//! }
//! ```

use std::fmt::{self, Write as _};

use itertools::Itertools;

use crate::{Module, OpId, RegionId, ValueId};

impl fmt::Display for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "module @{} {{", self.name())?;
        for function in self.functions() {
            write!(f, "  func @{}", function.name)?;
            self.fmt_region(f, function.body, 1)?;
            writeln!(f)?;
        }
        for diagnostic in self.diagnostics() {
            writeln!(f, "  // {diagnostic}")?;
        }
        write!(f, "}}")
    }
}

impl Module {
    /// Render a single operation (nested regions included) on its own.
    pub fn display_op(&self, op: OpId) -> String {
        let mut out = String::new();
        // Writing into a String cannot fail.
        let _ = self.write_op(&mut out, op, 0);
        out
    }

    fn fmt_region(&self, f: &mut fmt::Formatter<'_>, region: RegionId, depth: usize) -> fmt::Result {
        let mut out = String::new();
        self.write_region(&mut out, region, depth)?;
        f.write_str(&out)
    }

    fn write_region(&self, out: &mut String, region: RegionId, depth: usize) -> fmt::Result {
        let Ok(body) = self.region(region) else {
            return write!(out, "<unknown {region}>");
        };
        let args = body.args().iter().map(|&arg| self.typed(arg)).join(", ");
        writeln!(out, "({args}) {{")?;
        for &op in body.ops() {
            self.write_op(out, op, depth + 1)?;
            writeln!(out)?;
        }
        write!(out, "{}}}", indent(depth))
    }

    fn write_op(&self, out: &mut String, op: OpId, depth: usize) -> fmt::Result {
        write!(out, "{}", indent(depth))?;
        let Ok(operation) = self.op(op) else {
            return write!(out, "<erased {op}>");
        };
        if !operation.results().is_empty() {
            write!(out, "{} = ", operation.results().iter().join(", "))?;
        }
        write!(out, "{}({})", operation.kind(), operation.operands().iter().join(", "))?;
        if !operation.attrs().is_empty() {
            let attrs = operation.attrs().iter().map(|(name, value)| format!("{name} = {value}")).join(", ");
            write!(out, " {{{attrs}}}")?;
        }
        for &region in operation.regions() {
            write!(out, " ")?;
            self.write_region(out, region, depth)?;
        }
        let operand_types = operation.operands().iter().map(|&v| self.type_name(v)).join(", ");
        let result_types = match operation.results() {
            [single] => self.type_name(*single),
            many => format!("({})", many.iter().map(|&v| self.type_name(v)).join(", ")),
        };
        write!(out, " : ({operand_types}) -> {result_types}")
    }

    fn typed(&self, value: ValueId) -> String {
        format!("{value}: {}", self.type_name(value))
    }

    fn type_name(&self, value: ValueId) -> String {
        self.value_type(value).map(ToString::to_string).unwrap_or_else(|_| "<unknown>".to_string())
    }
}

fn indent(depth: usize) -> String {
    "  ".repeat(depth)
}
