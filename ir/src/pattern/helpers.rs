//! Helper functions for pattern matching around marker casts.

use quanta_dtype::TensorType;

use crate::op::OpKind;
use crate::types::{ATTR_VALUE, DenseElements};
use crate::{Module, OpId, ValueId};

/// The `quant.dcast` producing `value`, if any.
#[inline]
pub fn defining_dequantize(module: &Module, value: ValueId) -> Option<OpId> {
    module.defining_op_of_kind(value, OpKind::DequantizeCast)
}

/// The only reader of `value` when it is a `quant.qcast` and reads it exactly once.
#[inline]
pub fn single_quantize_user(module: &Module, value: ValueId) -> Option<OpId> {
    let [only] = module.uses(value) else {
        return None;
    };
    (module.kind(only.op) == Some(OpKind::QuantizeCast)).then_some(only.op)
}

/// Input value and its type for a marker op.
pub fn marker_input(module: &Module, marker: OpId) -> Option<(ValueId, &TensorType)> {
    let operation = module.op(marker).ok()?;
    if !operation.kind().is_marker() {
        return None;
    }
    let input = operation.operand(0)?;
    Some((input, module.value_type(input).ok()?))
}

/// Dense payload of the constant producing `value`.
pub fn dense_constant(module: &Module, value: ValueId) -> Option<&DenseElements> {
    let op = module.defining_op_of_kind(value, OpKind::Constant)?;
    module.op(op).ok()?.attr(ATTR_VALUE)?.as_dense()
}
