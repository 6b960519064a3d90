//! Ops carrying a reducer region.
//!
//! A `reduce_window` whose reducer only selects among its inputs (max/min)
//! commutes with quantization when input, init value and result share the same
//! parameters. The op is re-created on quantized values and its reducer body is
//! retyped to the scalar quantized type.

use quanta_dtype::UniformQuantizedType;
use quanta_ir::pattern::{Rewriter, defining_dequantize, marker_input, single_quantize_user};
use quanta_ir::{Module, OpId, OpKind, PatternSet, RegionId, RewriteResult};

use super::{Replacement, ResultPlan, decline};
use crate::quantizable::{QuantSemantics, is_already_quantized, semantics_of};
use crate::spec::QuantPassSpec;

pub fn populate_region_patterns(set: &mut PatternSet<QuantPassSpec>) {
    set.add("quantize_reduce_window", &[OpKind::ReduceWindow], quantize_region_op);
}

fn quantize_region_op(rw: &mut Rewriter<'_>, op: OpId, spec: &QuantPassSpec) -> quanta_ir::Result<RewriteResult> {
    let Some((replacement, qtype)) = plan(rw.module(), op, spec) else {
        return Ok(RewriteResult::NoMatch);
    };
    let new = replacement.apply(rw)?;

    let regions = rw.module().op(new)?.regions().to_vec();
    for region in regions {
        retype_body(rw, region, &qtype)?;
    }
    tracing::debug!(old = %op, %new, "quantized region op");
    Ok(RewriteResult::Rewritten)
}

fn plan(module: &Module, op: OpId, spec: &QuantPassSpec) -> Option<(Replacement, UniformQuantizedType)> {
    if !spec.specs.inference_type.is_quantized() {
        return decline(op, "float inference type");
    }
    if semantics_of(module, op) != QuantSemantics::Region || is_already_quantized(module, op) {
        return None;
    }
    let operation = module.op(op).ok()?;
    if !operation.regions().iter().all(|&r| is_selection_body(module, r)) || operation.regions().is_empty() {
        return decline(op, "reducer is not a pure max/min selection");
    }
    let [result] = operation.results() else {
        return decline(op, "region op must have one result");
    };

    let q = single_quantize_user(module, *result)?;
    let out_ty = module.value_type(module.op(q).ok()?.result(0)?).ok()?;
    let qtype = out_ty.quantized()?;
    if qtype.is_per_axis() || !spec.specs.accepts(qtype, &out_ty.shape) {
        return decline(op, "region ops need accepted per-tensor parameters");
    }

    let mut replacement = Replacement::new(op);
    for &operand in operation.operands() {
        let dq = defining_dequantize(module, operand)?;
        let (input, input_ty) = marker_input(module, dq)?;
        if !input_ty.quantized()?.same_params(qtype) {
            return decline(op, "operand and result parameters differ");
        }
        replacement.operands.push(input);
        replacement.dequantized.push(dq);
    }
    replacement.results.push(ResultPlan { ty: out_ty.clone(), quantize: Some(q) });
    Some((replacement, qtype.clone()))
}

/// Body made only of max/min ops followed by a terminator.
fn is_selection_body(module: &Module, region: RegionId) -> bool {
    let Ok(body) = module.region(region) else {
        return false;
    };
    let Some((&last, rest)) = body.ops().split_last() else {
        return false;
    };
    module.kind(last) == Some(OpKind::Return)
        && rest.iter().all(|&op| matches!(module.kind(op), Some(OpKind::Maximum | OpKind::Minimum)))
}

/// Retype the float block arguments and op results of `region` to `qtype`.
fn retype_body(rw: &mut Rewriter<'_>, region: RegionId, qtype: &UniformQuantizedType) -> quanta_ir::Result<()> {
    let body = rw.module().region(region)?;
    let mut values = body.args().to_vec();
    for &op in body.ops() {
        values.extend_from_slice(rw.module().op(op)?.results());
    }
    for value in values {
        let ty = rw.module().value_type(value)?;
        if ty.is_float() {
            let quantized = ty.with_element(qtype.clone());
            rw.set_value_type(value, quantized)?;
        }
    }
    Ok(())
}
