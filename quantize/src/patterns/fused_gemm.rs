//! Lowering of fully quantized contraction calls to integer arithmetic.
//!
//! Once the marker patterns have given a `dot_general`/`convolution` call
//! quantized operand and result types, its body still computes in float. This
//! pattern rewrites the body to:
//!
//! ```text
//! ^bb(%in: q_in, %w: q_w [, %bias: i32])
//!   %acc = contraction(%in, %w)   : i32, scale = s_in * s_w, zero point 0
//!   %acc = add(%acc, %bias)       (only for `_with_bias` bodies)
//!   %out = uniform_quantize(%acc) : q_out
//!   return %out
//! ```
//!
//! A per-axis weight yields a per-axis accumulator along the last result
//! dimension, and requires per-channel quantization to be enabled.

use quanta_dtype::{ScalarDType, TensorType, UniformQuantizedType};
use quanta_ir::pattern::Rewriter;
use quanta_ir::{InsertPoint, Module, OpId, OpKind, OperationState, PatternSet, RegionId, RewriteResult, ValueId};
use smallvec::SmallVec;

use super::decline;
use crate::quantizable::{QuantSemantics, entry_function_name, is_bias_operand, semantics_of};
use crate::spec::QuantPassSpec;

/// Entry-function fragments naming contraction calls.
pub const FUSED_ENTRY_FRAGMENTS: [&str; 2] = ["dot_general", "conv"];

pub fn populate_fused_gemm_patterns(set: &mut PatternSet<QuantPassSpec>) {
    set.add("lower_fused_gemm", &[OpKind::Call], lower_fused_gemm);
}

/// Matched body of a quantized contraction call.
#[derive(Debug)]
struct GemmPlan {
    args: SmallVec<[(ValueId, TensorType); 3]>,
    contraction: OpId,
    bias_add: Option<(OpId, ValueId)>,
    ret: OpId,
    accumulator: TensorType,
    output: TensorType,
}

fn lower_fused_gemm(rw: &mut Rewriter<'_>, call: OpId, spec: &QuantPassSpec) -> quanta_ir::Result<RewriteResult> {
    let Some(plan) = plan(rw.module(), call, spec) else {
        return Ok(RewriteResult::NoMatch);
    };

    for (arg, ty) in &plan.args {
        rw.set_value_type(*arg, ty.clone())?;
    }

    let mut acc = recreate(rw, plan.contraction, plan.accumulator.clone(), None)?;
    if let Some((add, bias)) = plan.bias_add {
        acc = recreate(rw, add, plan.accumulator.clone(), Some([acc, bias]))?;
    }

    let requantize = OperationState::new(OpKind::UniformQuantize).operands([acc]).result(plan.output);
    let out = rw.create_before(plan.ret, requantize)?;
    rw.set_operand(plan.ret, 0, out)?;

    tracing::debug!(%call, bias = plan.bias_add.is_some(), "lowered fused gemm body");
    Ok(RewriteResult::Rewritten)
}

/// Replace `op` by a same-kind op typed `ty`, optionally with new operands, and return its result.
fn recreate(
    rw: &mut Rewriter<'_>,
    op: OpId,
    ty: TensorType,
    operands: Option<[ValueId; 2]>,
) -> quanta_ir::Result<ValueId> {
    let old = rw.module().op(op)?;
    let operands: SmallVec<[ValueId; 4]> = match operands {
        Some(new) => new.into_iter().collect(),
        None => old.operands().iter().copied().collect(),
    };
    let state = OperationState::new(old.kind()).operands(operands).attrs(old.attrs().clone()).result(ty);
    let new = rw.create_op(InsertPoint::Before(op), state)?;
    let result = rw.module().op(new)?.results()[0];
    rw.replace_op(op, &[result])?;
    Ok(result)
}

fn plan(module: &Module, call: OpId, spec: &QuantPassSpec) -> Option<GemmPlan> {
    let specs = &spec.specs;
    if !specs.inference_type.is_quantized() || semantics_of(module, call) != QuantSemantics::Compute {
        return None;
    }
    let entry = entry_function_name(module, call)?;
    if !FUSED_ENTRY_FRAGMENTS.iter().any(|fragment| entry.contains(fragment)) {
        return None;
    }
    let operation = module.op(call).ok()?;
    let [body] = operation.regions() else {
        return decline(call, "contraction call without a body");
    };
    let [result] = operation.results() else {
        return None;
    };

    // Every operand and the result must already be quantized and accepted.
    let mut operand_types: SmallVec<[TensorType; 3]> = SmallVec::new();
    for (index, &operand) in operation.operands().iter().enumerate() {
        let ty = module.value_type(operand).ok()?;
        let accepted = if is_bias_operand(module, call, index) {
            ty.quantized().is_some_and(|q| specs.accepts_bias(q, &ty.shape))
        } else {
            ty.quantized().is_some_and(|q| specs.accepts(q, &ty.shape))
        };
        if !accepted {
            return decline(call, "operand is not an accepted quantized tensor");
        }
        operand_types.push(ty.clone());
    }
    let output = module.value_type(*result).ok()?.clone();
    if !output.quantized().is_some_and(|q| specs.accepts(q, &output.shape) && !q.is_per_axis()) {
        return decline(call, "result is not an accepted per-tensor quantized tensor");
    }

    let region = module.region(*body).ok()?;
    let args = region.args();
    if args.len() != operand_types.len() || !args.iter().any(|&a| module.value_type(a).is_ok_and(TensorType::is_float)) {
        return decline(call, "body already lowered");
    }
    let (contraction, bias_add, ret) = match_body(module, *body)?;

    let input = operand_types.first()?.quantized()?;
    let weight = operand_types.get(1)?.quantized()?;
    if input.is_per_axis() {
        return decline(call, "per-axis activation");
    }
    let bias_add = match bias_add {
        Some((add, bias_arg)) => {
            let index = args.iter().position(|&a| a == bias_arg)?;
            if operand_types[index].quantized()?.storage() != ScalarDType::Int32 {
                return decline(call, "bias must be stored as i32");
            }
            Some((add, bias_arg))
        }
        None => None,
    };

    let contraction_ty = module.value_type(module.op(contraction).ok()?.result(0)?).ok()?;
    let axis = contraction_ty.rank().checked_sub(1)?;
    let acc_qtype = UniformQuantizedType::product(input, weight, ScalarDType::Int32, axis).ok()?;
    if acc_qtype.validate_for_shape(&contraction_ty.shape).is_err() {
        return decline(call, "per-axis weight does not match the output channels");
    }

    Some(GemmPlan {
        args: args.iter().copied().zip(operand_types).collect(),
        contraction,
        bias_add,
        ret,
        accumulator: contraction_ty.with_element(acc_qtype),
        output,
    })
}

/// `[contraction(arg0, arg1), add(contraction, bias_arg)?, return]`.
fn match_body(module: &Module, body: RegionId) -> Option<(OpId, Option<(OpId, ValueId)>, OpId)> {
    let region = module.region(body).ok()?;
    let args = region.args();
    let (contraction, bias_add, ret) = match region.ops() {
        &[contraction, ret] => (contraction, None, ret),
        &[contraction, add, ret] => (contraction, Some(add), ret),
        _ => return None,
    };

    let c = module.op(contraction).ok()?;
    if !matches!(c.kind(), OpKind::DotGeneral | OpKind::Convolution) || c.operands() != args.get(..2)? {
        return None;
    }
    let acc = c.result(0)?;

    let (last, bias_add) = match bias_add {
        Some(add) => {
            let a = module.op(add).ok()?;
            if a.kind() != OpKind::Add {
                return None;
            }
            let bias = match a.operands() {
                &[lhs, rhs] if lhs == acc => rhs,
                &[lhs, rhs] if rhs == acc => lhs,
                _ => return None,
            };
            if !args.contains(&bias) {
                return None;
            }
            (a.result(0)?, Some((add, bias)))
        }
        None => (acc, None),
    };

    let r = module.op(ret).ok()?;
    (r.kind() == OpKind::Return && r.operands() == [last]).then_some((contraction, bias_add, ret))
}
