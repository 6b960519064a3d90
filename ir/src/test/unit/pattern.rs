//! Pattern set dispatch and rewriter bookkeeping.

use quanta_dtype::{ScalarDType, TensorType};

use crate::error::Error;
use crate::op::OperationState;
use crate::pattern::Rewriter;
use crate::{FuncBuilder, InsertPoint, Module, OpId, OpKind, PatternSet, RewriteResult, ValueId};

fn f32_4() -> TensorType {
    TensorType::new(&[4], ScalarDType::Float32)
}

/// `main(%x) { %s = add(%x, %x); return %s }`, returning the add.
fn add_graph() -> (Module, OpId, ValueId) {
    let mut module = Module::new("m");
    let mut b = FuncBuilder::function(&mut module, "main", &[f32_4()]);
    let x = b.arg(0);
    let sum = b.op(OpKind::Add, &[x, x], f32_4()).unwrap();
    b.ret(&[sum]).unwrap();
    let add = module.defining_op(sum).unwrap();
    (module, add, x)
}

/// Replace the root with a multiply of the same operands.
fn to_multiply(rw: &mut Rewriter<'_>, op: OpId) -> crate::Result<RewriteResult> {
    let operation = rw.module().op(op)?;
    let state = OperationState::new(OpKind::Multiply).operands(operation.operands().iter().copied()).result(f32_4());
    let product = rw.create_before(op, state)?;
    rw.replace_op(op, &[product])?;
    Ok(RewriteResult::Rewritten)
}

#[test]
fn test_first_rewrite_wins() {
    let (mut module, add, _) = add_graph();
    let mut set = PatternSet::<()>::new();
    set.add("decline", &[OpKind::Add], |_, _, _| Ok(RewriteResult::NoMatch));
    set.add("multiply", &[OpKind::Add], |rw, op, _| to_multiply(rw, op));
    set.add("never_reached", &[OpKind::Add], |_, _, _| panic!("lower priority rule must not run"));

    let applied = set.apply(&mut module, add, &()).unwrap();
    assert_eq!(applied.pattern, "multiply");
    assert_eq!(applied.changes.created.len(), 1);
    assert!(applied.changes.erased.contains(&add));
    assert_eq!(module.count(OpKind::Multiply), 1);
    assert_eq!(module.count(OpKind::Add), 0);
}

#[test]
fn test_root_filter() {
    let (mut module, add, _) = add_graph();
    let mut set = PatternSet::<()>::new();
    set.add("only_multiply", &[OpKind::Multiply], |_, _, _| panic!("offered the wrong root kind"));

    assert!(set.apply(&mut module, add, &()).is_none());
}

#[test]
fn test_error_before_changes_is_a_decline() {
    let (mut module, add, _) = add_graph();
    let mut set = PatternSet::<()>::new();
    set.add_wildcard("fails", |_, op, _| Err(Error::DeadOperation { op }));
    set.add("multiply", &[OpKind::Add], |rw, op, _| to_multiply(rw, op));

    assert_eq!(set.apply(&mut module, add, &()).map(|a| a.pattern), Some("multiply"));
}

#[test]
fn test_error_after_changes_counts_as_applied() {
    let (mut module, add, _) = add_graph();
    let mut set = PatternSet::<()>::new();
    set.add("partial", &[OpKind::Add], |rw, op, _| {
        rw.set_attr(op, "touched", true)?;
        Err(Error::DeadOperation { op })
    });

    let applied = set.apply(&mut module, add, &()).unwrap();
    assert_eq!(applied.pattern, "partial");
    assert!(applied.changes.modified.contains(&add));
    assert!(module.op(add).unwrap().attr("touched").is_some());
}

#[test]
fn test_context_is_passed_through() {
    let (mut module, add, _) = add_graph();
    let mut set = PatternSet::<bool>::new();
    set.add("gated", &[OpKind::Add], |rw, op, enabled| if *enabled { to_multiply(rw, op) } else { Ok(RewriteResult::NoMatch) });

    assert!(set.apply(&mut module, add, &false).is_none());
    assert!(set.apply(&mut module, add, &true).is_some());
}

#[test]
fn test_rewriter_records_touched_ops() {
    let (mut module, add, x) = add_graph();
    let ret = module.walk()[1];
    let mut rw = Rewriter::new(&mut module);
    assert!(!rw.has_changes());

    let neg = rw
        .create_op(InsertPoint::Before(ret), OperationState::new(OpKind::Subtract).operands([x, x]).result(f32_4()))
        .unwrap();
    let diff = rw.module().op(neg).unwrap().results()[0];
    let sum = rw.module().op(add).unwrap().results()[0];
    rw.replace_all_uses(sum, diff).unwrap();
    assert!(rw.erase_if_dead(add).unwrap());
    // Terminators are never dead.
    assert!(!rw.erase_if_dead(ret).unwrap());

    let changes = rw.into_changes();
    assert!(changes.created.contains(&neg));
    assert!(changes.modified.contains(&ret));
    assert!(changes.erased.contains(&add));
    assert_eq!(module.op(ret).unwrap().operands(), &[diff]);
}
