//! Single-op patterns: quantized constant folding and same-scale data movement.

use quanta_dtype::quantize_slice;
use quanta_ir::pattern::{Rewriter, defining_dequantize, dense_constant, marker_input, single_quantize_user};
use quanta_ir::{ATTR_VALUE, DenseElements, InsertPoint, Module, OpId, OpKind, OperationState, PatternSet, RewriteResult};

use super::{Replacement, ResultPlan, decline};
use crate::quantizable::{QuantSemantics, is_already_quantized, semantics_of};
use crate::spec::QuantPassSpec;

const SAME_SCALE_KINDS: [OpKind; 8] = [
    OpKind::Reshape,
    OpKind::Transpose,
    OpKind::Broadcast,
    OpKind::Slice,
    OpKind::Concatenate,
    OpKind::Pad,
    OpKind::Gather,
    OpKind::Select,
];

pub fn populate_singular_patterns(set: &mut PatternSet<QuantPassSpec>) {
    set.add("fold_quantized_constant", &[OpKind::QuantizeCast], fold_quantized_constant);
    set.add("quantize_same_scale", &SAME_SCALE_KINDS, quantize_same_scale);
}

/// `quant.qcast(hlo.constant(float))` becomes a constant holding the integer storage values.
fn fold_quantized_constant(rw: &mut Rewriter<'_>, q: OpId, spec: &QuantPassSpec) -> quanta_ir::Result<RewriteResult> {
    let module = rw.module();
    let operation = module.op(q)?;
    let (Some(input), Some(output)) = (operation.operand(0), operation.result(0)) else {
        return Ok(RewriteResult::NoMatch);
    };
    let Some(constant) = module.defining_op_of_kind(input, OpKind::Constant) else {
        return Ok(RewriteResult::NoMatch);
    };
    let Some(values) = dense_constant(module, input).and_then(DenseElements::as_float) else {
        return Ok(RewriteResult::NoMatch);
    };
    let out_ty = module.value_type(output)?.clone();
    let Some(qtype) = out_ty.quantized() else {
        return Ok(RewriteResult::NoMatch);
    };
    // Bias constants are folded to `i32` storage as well.
    if !spec.specs.accepts_bias(qtype, &out_ty.shape) {
        tracing::trace!(op = %q, "constant quantized type not accepted");
        return Ok(RewriteResult::NoMatch);
    }
    let storage = match quantize_slice(values, &out_ty.shape, qtype) {
        Ok(storage) => storage,
        Err(error) => {
            tracing::trace!(op = %q, %error, "constant does not fit its quantized type");
            return Ok(RewriteResult::NoMatch);
        }
    };

    let state = OperationState::new(OpKind::Constant).attr(ATTR_VALUE, DenseElements::Int(storage)).result(out_ty);
    let folded = rw.create_op(InsertPoint::Before(q), state)?;
    let folded_result = rw.module().op(folded)?.results()[0];
    rw.replace_all_uses(output, folded_result)?;
    rw.erase_op(q)?;
    rw.erase_if_dead(constant)?;
    tracing::debug!(%q, %folded, "folded quantized constant");
    Ok(RewriteResult::Rewritten)
}

/// Run data movement directly on quantized values when every marker around it agrees on the parameters.
fn quantize_same_scale(rw: &mut Rewriter<'_>, op: OpId, spec: &QuantPassSpec) -> quanta_ir::Result<RewriteResult> {
    let Some(replacement) = plan_same_scale(rw.module(), op, spec) else {
        return Ok(RewriteResult::NoMatch);
    };
    let new = replacement.apply(rw)?;
    tracing::debug!(old = %op, %new, "quantized same-scale op");
    Ok(RewriteResult::Rewritten)
}

fn plan_same_scale(module: &Module, op: OpId, spec: &QuantPassSpec) -> Option<Replacement> {
    if !spec.specs.inference_type.is_quantized() {
        return decline(op, "float inference type");
    }
    if semantics_of(module, op) != QuantSemantics::SameScale || is_already_quantized(module, op) {
        return None;
    }
    let operation = module.op(op).ok()?;
    let [result] = operation.results() else {
        return decline(op, "same-scale op must have one result");
    };

    let q = single_quantize_user(module, *result)?;
    let out_ty = module.value_type(module.op(q).ok()?.result(0)?).ok()?;
    let out_qtype = out_ty.quantized()?;
    if out_qtype.is_per_axis() || !spec.specs.accepts(out_qtype, &out_ty.shape) {
        return decline(op, "same-scale ops need accepted per-tensor parameters");
    }

    let mut replacement = Replacement::new(op);
    for &operand in operation.operands() {
        let ty = module.value_type(operand).ok()?;
        if !ty.is_float() {
            replacement.operands.push(operand);
            continue;
        }
        let dq = defining_dequantize(module, operand)?;
        let (input, input_ty) = marker_input(module, dq)?;
        let qtype = input_ty.quantized()?;
        if !qtype.same_params(out_qtype) {
            return decline(op, "operand and result parameters differ");
        }
        replacement.operands.push(input);
        replacement.dequantized.push(dq);
    }
    if replacement.dequantized.is_empty() {
        return decline(op, "no dequantized operand");
    }
    replacement.results.push(ResultPlan { ty: out_ty.clone(), quantize: Some(q) });
    Some(replacement)
}
