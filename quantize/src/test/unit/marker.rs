//! Marker pattern variants: standard, reversed and weight-only.

use quanta_dtype::{ScalarDType, TensorType, UniformQuantizedType};
use quanta_ir::{ATTR_QUANT_TRAIT, Attribute, FuncBuilder, Module, OpKind, verify_markers};
use test_case::test_case;

use super::*;
use crate::{FULLY_QUANTIZABLE, is_quantizable};

/// `arg -> qcast -> dcast`, the usual activation boundary.
fn marked_arg(b: &mut FuncBuilder<'_>, index: usize, qtype: UniformQuantizedType) -> quanta_ir::ValueId {
    let arg = b.arg(index);
    let q = b.qcast(arg, qtype).unwrap();
    b.dcast(q).unwrap()
}

#[test]
fn test_chain_is_quantized_in_one_sweep() {
    let ty = f32_t(&[4]);
    let mut module = Module::new("chain");
    let mut b = FuncBuilder::function(&mut module, "main", &[ty.clone()]);
    let x = marked_arg(&mut b, 0, qi8(0.5, 0));
    let sum = b.op(OpKind::Add, &[x, x], ty.clone()).unwrap();
    let q = b.qcast(sum, qi8(1.0, 0)).unwrap();
    let dq = b.dcast(q).unwrap();
    let product = b.op(OpKind::Multiply, &[dq, dq], ty).unwrap();
    let out = b.qcast(product, qi8(2.0, -1)).unwrap();
    b.ret(&[out]).unwrap();
    verify_markers(&module, is_quantizable).unwrap();

    let outcome = run_default(&mut module);
    assert!(outcome.converged());
    assert_eq!(outcome.stats.iterations, 2);
    assert_eq!(outcome.stats.applied("quantize_standard"), 2);

    // Only the boundary with the float argument survives.
    assert_eq!(module.count(OpKind::QuantizeCast), 1);
    assert_eq!(module.count(OpKind::DequantizeCast), 0);

    let add = single(&module, OpKind::Add);
    let mul = single(&module, OpKind::Multiply);
    assert_eq!(result_type(&module, add), f32_t(&[4]).with_element(qi8(1.0, 0)));
    assert_eq!(operand_types(&module, mul)[0], f32_t(&[4]).with_element(qi8(1.0, 0)));
    assert_eq!(result_type(&module, mul), f32_t(&[4]).with_element(qi8(2.0, -1)));
}

#[test]
fn test_shared_dequantize_is_erased_after_last_user() {
    let ty = f32_t(&[4]);
    let mut module = Module::new("shared");
    let mut b = FuncBuilder::function(&mut module, "main", &[ty.clone()]);
    let x = marked_arg(&mut b, 0, qi8(0.5, 0));
    let lhs = b.op(OpKind::Add, &[x, x], ty.clone()).unwrap();
    let lhs = b.qcast(lhs, qi8(1.0, 0)).unwrap();
    let rhs = b.op(OpKind::Maximum, &[x, x], ty).unwrap();
    let rhs = b.qcast(rhs, qi8(0.5, 0)).unwrap();
    b.ret(&[lhs, rhs]).unwrap();

    let outcome = run_default(&mut module);
    assert!(outcome.converged());
    assert_eq!(outcome.stats.applied("quantize_standard"), 1);
    assert_eq!(module.count(OpKind::DequantizeCast), 0);
    assert_eq!(module.count(OpKind::QuantizeCast), 1);
    assert!(module.walk().iter().all(|&op| module.kind(op) != Some(OpKind::Add) || !result_type(&module, op).is_float()));
}

#[test_case(true ; "float operand without marker")]
#[test_case(false ; "float result without marker")]
fn test_partial_boundary_declines(missing_operand_marker: bool) {
    let ty = f32_t(&[4]);
    let mut module = Module::new("partial");
    let mut b = FuncBuilder::function(&mut module, "main", &[ty.clone(), ty.clone()]);
    let x = marked_arg(&mut b, 0, qi8(0.5, 0));
    let y = if missing_operand_marker { b.arg(1) } else { marked_arg(&mut b, 1, qi8(0.5, 0)) };
    let sum = b.op(OpKind::Add, &[x, y], ty).unwrap();
    let out = if missing_operand_marker { b.qcast(sum, qi8(0.5, 0)).unwrap() } else { sum };
    b.ret(&[out]).unwrap();
    let before = module.to_string();

    let outcome = run_default(&mut module);
    assert!(outcome.converged());
    assert_eq!(outcome.stats.rewrites, 0);
    assert_eq!(module.to_string(), before);
}

#[test]
fn test_result_read_twice_declines() {
    let ty = f32_t(&[4]);
    let mut module = Module::new("fanout");
    let mut b = FuncBuilder::function(&mut module, "main", &[ty.clone()]);
    let x = marked_arg(&mut b, 0, qi8(0.5, 0));
    let sum = b.op(OpKind::Add, &[x, x], ty).unwrap();
    let q1 = b.qcast(sum, qi8(0.5, 0)).unwrap();
    let q2 = b.qcast(sum, qi8(0.25, 0)).unwrap();
    b.ret(&[q1, q2]).unwrap();

    let outcome = run_default(&mut module);
    assert_eq!(outcome.stats.rewrites, 0);
    assert!(result_type(&module, single(&module, OpKind::Add)).is_float());
}

#[test]
fn test_unrelated_markers_are_kept() {
    let ty = f32_t(&[4]);
    let mut module = Module::new("boundary");
    let mut b = FuncBuilder::function(&mut module, "main", &[ty.clone()]);
    let x = marked_arg(&mut b, 0, qi8(0.5, 0));
    // A plain call is not quantizable, so the markers around it must stay.
    let y = b.call("composite_softmax_fn_1", &[x], ty, [], None).unwrap();
    let out = b.qcast(y, qi8(0.5, 0)).unwrap();
    b.ret(&[out]).unwrap();

    let outcome = run_default(&mut module);
    assert_eq!(outcome.stats.rewrites, 0);
    assert_eq!(markers(&module), 3);
}

#[test_case(ScalarDType::Int16, ScalarDType::Int8 ; "i16 operand")]
#[test_case(ScalarDType::Int32, ScalarDType::Int8 ; "i32 operand")]
#[test_case(ScalarDType::Int8, ScalarDType::Int32 ; "i32 result")]
#[test_case(ScalarDType::Int32, ScalarDType::Int32 ; "i32 on both sides")]
fn test_storage_must_match_inference_type(operand: ScalarDType, result: ScalarDType) {
    let quantized = |storage| UniformQuantizedType::per_tensor(storage, ScalarDType::Float32, 0.5, 0).unwrap();
    let ty = f32_t(&[4]);
    let mut module = Module::new("mixed");
    let mut b = FuncBuilder::function(&mut module, "main", &[ty.clone()]);
    let x = marked_arg(&mut b, 0, quantized(operand));
    let sum = b.op(OpKind::Add, &[x, x], ty).unwrap();
    let out = b.qcast(sum, quantized(result)).unwrap();
    b.ret(&[out]).unwrap();

    // qint8 inference: only i8 storage is accepted outside a bias operand.
    assert_eq!(run_default(&mut module).stats.rewrites, 0);
    assert_eq!(markers(&module), 3);
    assert!(result_type(&module, single(&module, OpKind::Add)).is_float());
}

#[test_case(0, 1, 1 ; "axis inside the rank")]
#[test_case(3, 0, 3 ; "axis outside the rank")]
fn test_per_axis_marker_needs_a_valid_axis(axis: usize, rewrites: usize, remaining: usize) {
    let ty = f32_t(&[4]);
    let mut module = Module::new("per_axis");
    let mut b = FuncBuilder::function(&mut module, "main", &[ty.clone()]);
    let x = marked_arg(&mut b, 0, qi8_per_axis(axis, &[0.5; 4]));
    let sum = b.op(OpKind::Add, &[x, x], ty).unwrap();
    let out = b.qcast(sum, qi8(1.0, 0)).unwrap();
    b.ret(&[out]).unwrap();

    let options = QuantizePassOptions::builder().enable_per_channel_quantized_weight(true).build();
    let outcome = run(&mut module, &options);
    assert!(outcome.converged());
    assert_eq!(outcome.stats.rewrites, rewrites);
    assert_eq!(markers(&module), remaining);
}

#[test]
fn test_reversed_variant_starts_from_quantize() {
    // Integer indices in, quantized values out: nothing to dequantize, so only
    // the qcast-rooted variant can see this op.
    let indices = TensorType::new(&[4], ScalarDType::Int32);
    let ty = f32_t(&[4, 8]);
    let mut module = Module::new("lookup");
    let mut b = FuncBuilder::function(&mut module, "main", &[indices]);
    let idx = b.arg(0);
    let rows = b
        .call("composite_lookup_fn_1", &[idx], ty.clone(), [(ATTR_QUANT_TRAIT, Attribute::from(FULLY_QUANTIZABLE))], None)
        .unwrap();
    let out = b.qcast(rows, qi8(0.1, 3)).unwrap();
    b.ret(&[out]).unwrap();

    let outcome = run_default(&mut module);
    assert!(outcome.converged());
    assert_eq!(outcome.stats.applied("quantize_reversed"), 1);
    assert_eq!(markers(&module), 0);
    let call = single(&module, OpKind::Call);
    assert_eq!(result_type(&module, call), ty.with_element(qi8(0.1, 3)));
}

/// `dot_general(act, weight)` with a per-axis weight along the output channels.
fn per_channel_dot() -> Module {
    let act = f32_t(&[1, 4]);
    let weight_ty = f32_t(&[4, 2]);
    let out = f32_t(&[1, 2]);
    let mut module = Module::new("per_channel");
    let mut b = FuncBuilder::function(&mut module, "main", &[act]);
    let x = marked_arg(&mut b, 0, qi8(0.5, 0));
    let w = b.constant(weight_ty, quanta_ir::DenseElements::Float(vec![0.25; 8])).unwrap();
    let w = b.qcast(w, qi8_per_axis(1, &[0.25, 0.125])).unwrap();
    let w = b.dcast(w).unwrap();
    let y = b.op(OpKind::DotGeneral, &[x, w], out).unwrap();
    let y = b.qcast(y, qi8(1.0, 0)).unwrap();
    b.ret(&[y]).unwrap();
    module
}

#[test]
fn test_per_channel_weights_need_per_channel_enabled() {
    let mut module = per_channel_dot();
    let outcome = run_default(&mut module);
    assert_eq!(outcome.stats.rewrites, 0);
    assert_eq!(markers(&module), 5);
}

#[test]
fn test_per_channel_weights_are_propagated() {
    let mut module = per_channel_dot();
    let options = QuantizePassOptions::builder().enable_per_channel_quantized_weight(true).build();
    let outcome = run(&mut module, &options);

    assert!(outcome.converged());
    assert_eq!(outcome.stats.applied("fold_quantized_constant"), 1);
    assert_eq!(outcome.stats.applied("quantize_standard"), 1);
    assert_eq!(markers(&module), 1);

    let dot = single(&module, OpKind::DotGeneral);
    let operands = operand_types(&module, dot);
    assert_eq!(operands[0], f32_t(&[1, 4]).with_element(qi8(0.5, 0)));
    assert_eq!(operands[1], f32_t(&[4, 2]).with_element(qi8_per_axis(1, &[0.25, 0.125])));
    assert_eq!(result_type(&module, dot), f32_t(&[1, 2]).with_element(qi8(1.0, 0)));
}

#[test]
fn test_weight_only_needs_a_hybrid_entry() {
    let ty = f32_t(&[4]);
    let mut module = Module::new("weight_only");
    let mut b = FuncBuilder::function(&mut module, "main", &[ty.clone(), ty.clone()]);
    let x = marked_arg(&mut b, 0, qi8(0.5, 0));
    let y = b.arg(1);
    let sum = b.op(OpKind::Add, &[x, y], ty).unwrap();
    b.ret(&[sum]).unwrap();

    let options = QuantizePassOptions::builder().enable_weight_only(true).build();
    let outcome = run(&mut module, &options);
    assert_eq!(outcome.stats.rewrites, 0);
    assert!(result_type(&module, single(&module, OpKind::Add)).is_float());
}
