//! End-to-end pass behaviour: convergence reporting, idempotence and gating.

use quanta_ir::{ATTR_VALUE, Attribute, Convergence, DenseElements, FuncBuilder, Module, OpKind, Severity};
use test_case::test_case;

use super::*;
use crate::{CONVERGENCE_WARNING, InferenceType};

/// `constant -> qcast -> dcast -> add(dq, dq) -> qcast -> return`, scale 0.5 everywhere.
fn marked_add() -> Module {
    let ty = f32_t(&[2]);
    let mut module = Module::new("marked_add");
    let mut b = FuncBuilder::function(&mut module, "main", &[]);
    let c = b.constant(ty.clone(), DenseElements::Float(vec![1.0, 2.0])).unwrap();
    let q = b.qcast(c, qi8(0.5, 0)).unwrap();
    let dq = b.dcast(q).unwrap();
    let sum = b.op(OpKind::Add, &[dq, dq], ty).unwrap();
    let out = b.qcast(sum, qi8(0.5, 0)).unwrap();
    b.ret(&[out]).unwrap();
    module
}

#[test]
fn test_single_add_is_fully_quantized() {
    let mut module = marked_add();
    let outcome = run_default(&mut module);

    assert!(outcome.converged());
    assert!(!outcome.warned);
    assert_eq!(outcome.stats.iterations, 2);
    assert_eq!(outcome.stats.rewrites, 2);
    assert_eq!(outcome.stats.applied("fold_quantized_constant"), 1);
    assert_eq!(outcome.stats.applied("quantize_standard"), 1);
    assert_eq!(markers(&module), 0, "{module}");

    let add = single(&module, OpKind::Add);
    let expected = f32_t(&[2]).with_element(qi8(0.5, 0));
    assert_eq!(operand_types(&module, add), vec![expected.clone(), expected.clone()]);
    assert_eq!(result_type(&module, add), expected);

    let constant = single(&module, OpKind::Constant);
    let value = module.op(constant).unwrap().attr(ATTR_VALUE).and_then(Attribute::as_dense);
    assert_eq!(value, Some(&DenseElements::Int(vec![2, 4])));
    assert!(module.diagnostics().is_empty());
}

#[test]
fn test_second_run_is_a_no_op() {
    let mut module = marked_add();
    let pass = QuantizePass::default();
    pass.run(&mut module);
    let before = module.to_string();

    let again = pass.run(&mut module);
    assert!(again.converged());
    assert_eq!(again.stats.rewrites, 0);
    assert_eq!(again.stats.iterations, 1);
    assert_eq!(module.to_string(), before);
}

#[test]
fn test_exhaustion_warns_exactly_once() {
    let mut module = marked_add();
    let options = QuantizePassOptions::builder().max_iterations(1).build();
    let outcome = run(&mut module, &options);

    assert!(outcome.warned);
    assert_eq!(outcome.stats.convergence, Convergence::Exhausted);
    assert_eq!(outcome.stats.iterations, 1);
    let [diagnostic] = module.diagnostics() else {
        panic!("expected one diagnostic, got {:?}", module.diagnostics());
    };
    assert_eq!(diagnostic.severity, Severity::Warning);
    assert_eq!(diagnostic.message, CONVERGENCE_WARNING);

    // The module keeps its last rewritten state and a later quiet run adds nothing.
    assert_eq!(markers(&module), 0);
    let quiet = run(&mut module, &options);
    assert!(quiet.converged());
    assert!(!quiet.warned);
    assert_eq!(module.diagnostics().len(), 1);
}

#[test_case(InferenceType::Float32 ; "float inference")]
#[test_case(InferenceType::QUInt8 ; "storage differs from inference type")]
#[test_case(InferenceType::QInt16 ; "wider inference type")]
fn test_incompatible_inference_type_leaves_module_untouched(inference_type: InferenceType) {
    let mut module = marked_add();
    let before = module.to_string();
    let outcome = run(&mut module, &QuantizePassOptions::builder().inference_type(inference_type).build());

    assert!(outcome.converged());
    assert_eq!(outcome.stats.rewrites, 0);
    assert_eq!(module.to_string(), before);
}

#[test]
fn test_pass_is_reusable_across_modules() {
    let pass = QuantizePass::new(&QuantizePassOptions::default());
    let mut first = marked_add();
    let mut second = marked_add();

    let a = pass.run(&mut first);
    let b = pass.run(&mut second);
    assert_eq!(a, b);
    assert_eq!(first.to_string(), second.to_string());
    assert_eq!(a.to_string(), "2 rewrites in 2 iterations (converged)");
}

#[test]
fn test_unmarked_graph_is_untouched() {
    let ty = f32_t(&[4]);
    let mut module = Module::new("plain");
    let mut b = FuncBuilder::function(&mut module, "main", &[ty.clone(), ty.clone()]);
    let (x, y) = (b.arg(0), b.arg(1));
    let sum = b.op(OpKind::Add, &[x, y], ty.clone()).unwrap();
    let product = b.op(OpKind::Multiply, &[sum, y], ty).unwrap();
    b.ret(&[product]).unwrap();
    let before = module.to_string();

    let outcome = run_default(&mut module);
    assert!(outcome.converged());
    assert_eq!(outcome.stats.rewrites, 0);
    assert_eq!(module.to_string(), before);
}
