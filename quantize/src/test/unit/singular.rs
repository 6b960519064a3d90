//! Constant folding and same-scale data movement.

use quanta_dtype::{ScalarDType, TensorType};
use quanta_ir::{ATTR_VALUE, Attribute, DenseElements, FuncBuilder, Module, OpKind};
use test_case::test_case;

use super::*;

fn constant_payload(module: &Module) -> Vec<DenseElements> {
    module
        .walk()
        .into_iter()
        .filter(|&op| module.kind(op) == Some(OpKind::Constant))
        .filter_map(|op| module.op(op).unwrap().attr(ATTR_VALUE).and_then(Attribute::as_dense).cloned())
        .collect()
}

#[test]
fn test_fold_rounds_and_clamps_to_storage() {
    let ty = f32_t(&[3]);
    let mut module = Module::new("fold");
    let mut b = FuncBuilder::function(&mut module, "main", &[]);
    let c = b.constant(ty.clone(), DenseElements::Float(vec![0.3, -1.0, 100.0])).unwrap();
    let q = b.qcast(c, qi8(0.1, 2)).unwrap();
    let dq = b.dcast(q).unwrap();
    b.ret(&[dq]).unwrap();

    let outcome = run_default(&mut module);
    assert!(outcome.converged());
    assert_eq!(outcome.stats.applied("fold_quantized_constant"), 1);
    assert_eq!(module.count(OpKind::QuantizeCast), 0);
    assert_eq!(module.count(OpKind::DequantizeCast), 1);
    assert_eq!(constant_payload(&module), vec![DenseElements::Int(vec![5, -8, 127])]);
    assert_eq!(result_type(&module, single(&module, OpKind::Constant)), ty.with_element(qi8(0.1, 2)));
}

#[test]
fn test_fold_keeps_constant_with_other_readers() {
    let ty = f32_t(&[2]);
    let mut module = Module::new("shared_constant");
    let mut b = FuncBuilder::function(&mut module, "main", &[ty.clone()]);
    let c = b.constant(ty.clone(), DenseElements::Float(vec![1.0, 2.0])).unwrap();
    let q = b.qcast(c, qi8(0.5, 0)).unwrap();
    let x = b.arg(0);
    let float_use = b.op(OpKind::Add, &[x, c], ty).unwrap();
    b.ret(&[q, float_use]).unwrap();

    run_default(&mut module);
    assert_eq!(module.count(OpKind::Constant), 2);
    // The folded constant is inserted right after the float one.
    assert_eq!(
        constant_payload(&module),
        vec![DenseElements::Float(vec![1.0, 2.0]), DenseElements::Int(vec![2, 4])]
    );
}

#[test]
fn test_integer_constant_is_not_folded() {
    let ty = TensorType::new(&[2], ScalarDType::Int32);
    let mut module = Module::new("int_constant");
    let mut b = FuncBuilder::function(&mut module, "main", &[]);
    let c = b.constant(ty, DenseElements::Int(vec![1, 2])).unwrap();
    let q = b.qcast(c, qi8(0.5, 0)).unwrap();
    b.ret(&[q]).unwrap();

    assert_eq!(run_default(&mut module).stats.rewrites, 0);
}

/// `arg -> qcast(in) -> dcast -> kind -> qcast(out) -> return`.
fn same_scale(kind: OpKind, out_scale: f64) -> Module {
    let mut module = Module::new("same_scale");
    let mut b = FuncBuilder::function(&mut module, "main", &[f32_t(&[4])]);
    let x = b.arg(0);
    let q = b.qcast(x, qi8(0.5, 1)).unwrap();
    let dq = b.dcast(q).unwrap();
    let y = b.op(kind, &[dq], f32_t(&[2, 2])).unwrap();
    let out = b.qcast(y, qi8(out_scale, 1)).unwrap();
    b.ret(&[out]).unwrap();
    module
}

#[test_case(OpKind::Reshape ; "reshape")]
#[test_case(OpKind::Transpose ; "transpose")]
#[test_case(OpKind::Slice ; "slice")]
fn test_same_scale_op_runs_on_quantized_values(kind: OpKind) {
    let mut module = same_scale(kind, 0.5);
    let outcome = run_default(&mut module);

    assert!(outcome.converged());
    assert_eq!(outcome.stats.applied("quantize_same_scale"), 1);
    assert_eq!(markers(&module), 1);
    let op = single(&module, kind);
    assert_eq!(operand_types(&module, op), vec![f32_t(&[4]).with_element(qi8(0.5, 1))]);
    assert_eq!(result_type(&module, op), f32_t(&[2, 2]).with_element(qi8(0.5, 1)));
}

#[test]
fn test_same_scale_needs_identical_parameters() {
    let mut module = same_scale(OpKind::Reshape, 0.25);
    let before = module.to_string();
    assert_eq!(run_default(&mut module).stats.rewrites, 0);
    assert_eq!(module.to_string(), before);
}

#[test]
fn test_select_predicate_passes_through() {
    let ty = f32_t(&[4]);
    let pred_ty = TensorType::new(&[4], ScalarDType::Bool);
    let mut module = Module::new("select");
    let mut b = FuncBuilder::function(&mut module, "main", &[pred_ty.clone(), ty.clone(), ty.clone()]);
    let pred = b.arg(0);
    let mut branches = Vec::new();
    for index in 1..=2 {
        let arg = b.arg(index);
        let q = b.qcast(arg, qi8(0.5, 0)).unwrap();
        branches.push(b.dcast(q).unwrap());
    }
    let picked = b.op(OpKind::Select, &[pred, branches[0], branches[1]], ty.clone()).unwrap();
    let out = b.qcast(picked, qi8(0.5, 0)).unwrap();
    b.ret(&[out]).unwrap();

    let outcome = run_default(&mut module);
    assert_eq!(outcome.stats.applied("quantize_same_scale"), 1);
    let select = single(&module, OpKind::Select);
    let quantized = ty.with_element(qi8(0.5, 0));
    assert_eq!(operand_types(&module, select), vec![pred_ty, quantized.clone(), quantized.clone()]);
    assert_eq!(result_type(&module, select), quantized);
    assert_eq!(module.count(OpKind::DequantizeCast), 0);
}
