mod marker;
mod pass;
mod singular;

use quanta_dtype::{ScalarDType, TensorType, UniformQuantizedType};
use quanta_ir::{Module, OpId, OpKind};

use crate::{PassOutcome, QuantizePass, QuantizePassOptions};

pub(super) fn f32_t(shape: &[usize]) -> TensorType {
    TensorType::new(shape, ScalarDType::Float32)
}

pub(super) fn qi8(scale: f64, zero_point: i64) -> UniformQuantizedType {
    UniformQuantizedType::per_tensor(ScalarDType::Int8, ScalarDType::Float32, scale, zero_point).unwrap()
}

pub(super) fn qi32(scale: f64) -> UniformQuantizedType {
    UniformQuantizedType::per_tensor(ScalarDType::Int32, ScalarDType::Float32, scale, 0).unwrap()
}

pub(super) fn qi8_per_axis(axis: usize, scales: &[f64]) -> UniformQuantizedType {
    UniformQuantizedType::per_axis(ScalarDType::Int8, ScalarDType::Float32, axis, scales.to_vec(), vec![0; scales.len()])
        .unwrap()
}

pub(super) fn run(module: &mut Module, options: &QuantizePassOptions) -> PassOutcome {
    QuantizePass::new(options).run(module)
}

pub(super) fn run_default(module: &mut Module) -> PassOutcome {
    run(module, &QuantizePassOptions::default())
}

pub(super) fn markers(module: &Module) -> usize {
    module.count(OpKind::QuantizeCast) + module.count(OpKind::DequantizeCast)
}

/// The only live op of `kind`.
pub(super) fn single(module: &Module, kind: OpKind) -> OpId {
    let ops: Vec<OpId> = module.walk().into_iter().filter(|&op| module.kind(op) == Some(kind)).collect();
    assert_eq!(ops.len(), 1, "expected one {kind} in\n{module}");
    ops[0]
}

pub(super) fn operand_types(module: &Module, op: OpId) -> Vec<TensorType> {
    module.op(op).unwrap().operands().iter().map(|&v| module.value_type(v).unwrap().clone()).collect()
}

pub(super) fn result_type(module: &Module, op: OpId) -> TensorType {
    let result = module.op(op).unwrap().results()[0];
    module.value_type(result).unwrap().clone()
}
