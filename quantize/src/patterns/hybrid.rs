//! Lowering of weight-only (hybrid) quantized calls.
//!
//! After the weight-only marker variant has handed a call its quantized
//! weights, the call body still expects float arguments. Each such argument
//! takes the quantized operand type and is dequantized once at the top of the
//! body, so the rest of the body keeps computing in float.

use quanta_dtype::TensorType;
use quanta_ir::pattern::Rewriter;
use quanta_ir::{InsertPoint, Module, OpId, OpKind, OperationState, PatternSet, RegionId, RewriteResult, ValueId};
use smallvec::SmallVec;

use super::decline;
use crate::quantizable::{QuantSemantics, entry_function_name, semantics_of};
use crate::spec::QuantPassSpec;

pub fn populate_hybrid_patterns(set: &mut PatternSet<QuantPassSpec>) {
    set.add("lower_hybrid_call", &[OpKind::Call], lower_hybrid_call);
}

fn lower_hybrid_call(rw: &mut Rewriter<'_>, call: OpId, spec: &QuantPassSpec) -> quanta_ir::Result<RewriteResult> {
    let Some((body, retyped)) = plan(rw.module(), call, spec) else {
        return Ok(RewriteResult::NoMatch);
    };

    for (arg, quantized, float) in retyped {
        rw.set_value_type(arg, quantized)?;
        let state = OperationState::new(OpKind::UniformDequantize).operands([arg]).result(float);
        let dq = rw.create_op(InsertPoint::Start(body), state)?;
        let dequantized = rw.module().op(dq)?.results()[0];
        rw.replace_all_uses_except(arg, dequantized, dq)?;
    }
    tracing::debug!(%call, "lowered hybrid call body");
    Ok(RewriteResult::Rewritten)
}

/// `(argument, quantized type, float type)` for every body argument to rewrite.
type Retyped = SmallVec<[(ValueId, TensorType, TensorType); 2]>;

fn plan(module: &Module, call: OpId, spec: &QuantPassSpec) -> Option<(RegionId, Retyped)> {
    if !spec.specs.enable_weight_only || semantics_of(module, call) != QuantSemantics::Compute {
        return None;
    }
    if !entry_function_name(module, call).is_some_and(|entry| spec.specs.is_hybrid_entry(entry)) {
        return None;
    }
    let operation = module.op(call).ok()?;
    let [body] = operation.regions() else {
        return decline(call, "hybrid call without a body");
    };
    // Fully quantized calls belong to the fused lowering.
    if !operation.results().iter().any(|&r| module.value_type(r).is_ok_and(TensorType::is_float)) {
        return None;
    }

    let args = module.region(*body).ok()?.args();
    if args.len() != operation.operands().len() {
        return decline(call, "body arity differs from the call");
    }
    let retyped: Retyped = operation
        .operands()
        .iter()
        .zip(args)
        .filter_map(|(&operand, &arg)| {
            let operand_ty = module.value_type(operand).ok()?;
            let arg_ty = module.value_type(arg).ok()?;
            (operand_ty.is_quantized() && arg_ty.is_float()).then(|| (arg, operand_ty.clone(), arg_ty.clone()))
        })
        .collect();
    if retyped.is_empty() {
        return None;
    }
    Some((*body, retyped))
}
