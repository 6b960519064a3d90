//! Which operations may run on quantized values, and how.

use quanta_ir::{ATTR_ENTRY_FUNCTION, ATTR_QUANT_TRAIT, Attribute, Module, OpId, OpKind};

/// Value of the `quant_trait` attribute marking a call whose body can be fully quantized.
pub const FULLY_QUANTIZABLE: &str = "fully_quantizable";

/// Entry-function fragment of contraction calls that take a bias as their third operand.
pub const WITH_BIAS_FRAGMENT: &str = "_with_bias";

/// How an operation participates in quantization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum QuantSemantics {
    /// Takes quantized operands and produces results with their own parameters.
    Compute,
    /// Moves data without changing values; operands and result share parameters.
    SameScale,
    /// Carries a reducer region that must be retyped along with the op.
    Region,
    NotQuantizable,
}

pub fn semantics_of(module: &Module, op: OpId) -> QuantSemantics {
    let Ok(operation) = module.op(op) else {
        return QuantSemantics::NotQuantizable;
    };
    match operation.kind() {
        OpKind::Add
        | OpKind::Subtract
        | OpKind::Multiply
        | OpKind::Maximum
        | OpKind::Minimum
        | OpKind::DotGeneral
        | OpKind::Convolution => QuantSemantics::Compute,
        OpKind::Call if operation.attr(ATTR_QUANT_TRAIT).and_then(Attribute::as_str) == Some(FULLY_QUANTIZABLE) => {
            QuantSemantics::Compute
        }
        OpKind::Reshape
        | OpKind::Transpose
        | OpKind::Broadcast
        | OpKind::Slice
        | OpKind::Concatenate
        | OpKind::Pad
        | OpKind::Gather
        | OpKind::Select => QuantSemantics::SameScale,
        OpKind::ReduceWindow => QuantSemantics::Region,
        _ => QuantSemantics::NotQuantizable,
    }
}

pub fn is_quantizable(module: &Module, op: OpId) -> bool {
    semantics_of(module, op) != QuantSemantics::NotQuantizable
}

/// Any operand or result already carries a quantized element type.
pub fn is_already_quantized(module: &Module, op: OpId) -> bool {
    let Ok(operation) = module.op(op) else {
        return false;
    };
    operation
        .operands()
        .iter()
        .chain(operation.results())
        .any(|&v| module.value_type(v).is_ok_and(|ty| ty.is_quantized()))
}

/// Entry-function name of a call.
pub fn entry_function_name(module: &Module, op: OpId) -> Option<&str> {
    let operation = module.op(op).ok()?;
    if operation.kind() != OpKind::Call {
        return None;
    }
    operation.attr(ATTR_ENTRY_FUNCTION)?.as_str()
}

/// Operand `index` of `op` is the bias of a `_with_bias` contraction call.
pub fn is_bias_operand(module: &Module, op: OpId, index: usize) -> bool {
    index == 2 && entry_function_name(module, op).is_some_and(|entry| entry.contains(WITH_BIAS_FRAGMENT))
}
