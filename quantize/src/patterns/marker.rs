//! Quantization of compute ops sitting between boundary markers.
//!
//! A float op whose operands come from `quant.dcast` markers and whose results
//! feed `quant.qcast` markers is re-created with the quantized types carried
//! by those markers, and the markers it absorbed are removed. Three variants
//! share the same match/rewrite logic and differ only in where matching starts
//! and whether float leftovers (hybrid quantization) are tolerated:
//!
//! | variant       | root        | hybrid                              |
//! |---------------|-------------|-------------------------------------|
//! | `standard`    | `quant.dcast` | never                             |
//! | `reversed`    | `quant.qcast` | never                             |
//! | `weight_only` | `quant.dcast` | calls with a hybrid entry function |

use quanta_ir::pattern::{Rewriter, defining_dequantize, marker_input, single_quantize_user};
use quanta_ir::{Module, OpId, OpKind, PatternSet, RewriteResult, ValueId};
use smallvec::SmallVec;

use super::{Replacement, ResultPlan, decline};
use crate::quantizable::{QuantSemantics, entry_function_name, is_already_quantized, is_bias_operand, semantics_of};
use crate::spec::{QuantPassSpec, QuantizationSpecs};

/// Marker kind a variant is rooted at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RootMarker {
    /// Candidates are the users of a `quant.dcast`.
    Dequantize,
    /// The candidate is the producer of a `quant.qcast` operand.
    Quantize,
}

impl RootMarker {
    pub const fn op_kind(self) -> OpKind {
        match self {
            Self::Dequantize => OpKind::DequantizeCast,
            Self::Quantize => OpKind::QuantizeCast,
        }
    }
}

/// Whether float operands/results without markers may stay float.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HybridPolicy {
    Never,
    /// Calls whose entry function name contains one of the configured fragments.
    EntryFunction,
}

impl HybridPolicy {
    pub fn allows(self, module: &Module, op: OpId, specs: &QuantizationSpecs) -> bool {
        match self {
            Self::Never => false,
            Self::EntryFunction => entry_function_name(module, op).is_some_and(|entry| specs.is_hybrid_entry(entry)),
        }
    }
}

/// One variant of the marker pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MarkerPattern {
    pub name: &'static str,
    pub root: RootMarker,
    pub hybrid: HybridPolicy,
}

impl MarkerPattern {
    pub const fn standard() -> Self {
        Self { name: "quantize_standard", root: RootMarker::Dequantize, hybrid: HybridPolicy::Never }
    }

    pub const fn reversed() -> Self {
        Self { name: "quantize_reversed", root: RootMarker::Quantize, hybrid: HybridPolicy::Never }
    }

    pub const fn weight_only() -> Self {
        Self { name: "quantize_weight_only", root: RootMarker::Dequantize, hybrid: HybridPolicy::EntryFunction }
    }

    /// Append this variant to `set`.
    pub fn register(self, set: &mut PatternSet<QuantPassSpec>) {
        set.add(self.name, &[self.root.op_kind()], move |rw, root, spec| quantize_with_markers(rw, root, &self, spec));
    }
}

/// Match and rewrite every candidate reachable from the marker `root`.
pub fn quantize_with_markers(
    rw: &mut Rewriter<'_>,
    root: OpId,
    pattern: &MarkerPattern,
    spec: &QuantPassSpec,
) -> quanta_ir::Result<RewriteResult> {
    let candidates = candidates(rw.module(), root, pattern.root);

    let mut rewritten = false;
    for candidate in candidates {
        if !rw.module().is_live(candidate) {
            continue;
        }
        let hybrid = pattern.hybrid.allows(rw.module(), candidate, &spec.specs);
        let Some(replacement) = plan(rw.module(), candidate, hybrid, &spec.specs) else {
            continue;
        };
        let new = replacement.apply(rw)?;
        tracing::debug!(pattern = pattern.name, old = %candidate, %new, hybrid, "quantized op");
        rewritten = true;
    }
    Ok(rewritten.into())
}

fn candidates(module: &Module, root: OpId, marker: RootMarker) -> SmallVec<[OpId; 4]> {
    let Ok(operation) = module.op(root) else {
        return SmallVec::new();
    };
    match marker {
        RootMarker::Dequantize => operation
            .results()
            .iter()
            .flat_map(|&r| module.users(r))
            .filter(|&user| module.kind(user).is_some_and(|k| !k.is_marker()))
            .collect(),
        RootMarker::Quantize => {
            let Some(producer) = operation.operand(0).and_then(|v| module.defining_op(v)) else {
                return SmallVec::new();
            };
            match module.kind(producer) {
                Some(OpKind::Constant) | Some(OpKind::QuantizeCast) | Some(OpKind::DequantizeCast) | None => {
                    SmallVec::new()
                }
                Some(_) => SmallVec::from_elem(producer, 1),
            }
        }
    }
}

/// Compute the quantized replacement of `op`, or `None` when it does not qualify.
fn plan(module: &Module, op: OpId, hybrid: bool, specs: &QuantizationSpecs) -> Option<Replacement> {
    if !specs.inference_type.is_quantized() {
        return decline(op, "float inference type");
    }
    if semantics_of(module, op) != QuantSemantics::Compute {
        return decline(op, "not a quantizable compute op");
    }
    if is_already_quantized(module, op) {
        return decline(op, "already quantized");
    }
    let operation = module.op(op).ok()?;
    if operation.kind().is_terminator() {
        return decline(op, "terminator");
    }

    let mut replacement = Replacement::new(op);
    for (index, &operand) in operation.operands().iter().enumerate() {
        let ty = module.value_type(operand).ok()?;
        if let Some(dq) = defining_dequantize(module, operand) {
            let (input, input_ty) = marker_input(module, dq)?;
            let qtype = input_ty.quantized()?;
            let accepted = if is_bias_operand(module, op, index) {
                specs.accepts_bias(qtype, &input_ty.shape)
            } else {
                specs.accepts(qtype, &input_ty.shape)
            };
            if !accepted {
                return decline(op, "operand quantized type not accepted");
            }
            replacement.operands.push(input);
            replacement.dequantized.push(dq);
        } else if !ty.is_float() || hybrid {
            replacement.operands.push(operand);
        } else {
            return decline(op, "float operand without dequantize marker");
        }
    }

    for &result in operation.results() {
        let ty = module.value_type(result).ok()?;
        if let Some(q) = single_quantize_user(module, result) {
            let out_ty = quantized_result(module, q)?;
            let qtype = out_ty.quantized()?;
            if !specs.accepts(qtype, &out_ty.shape) {
                return decline(op, "result quantized type not accepted");
            }
            replacement.results.push(ResultPlan { ty: out_ty.clone(), quantize: Some(q) });
        } else if !ty.is_float() || hybrid {
            replacement.results.push(ResultPlan { ty: ty.clone(), quantize: None });
        } else {
            return decline(op, "float result without a single quantize marker");
        }
    }

    if !replacement.absorbs_markers() {
        return decline(op, "no marker to absorb");
    }
    Some(replacement)
}

fn quantized_result(module: &Module, q: OpId) -> Option<&quanta_dtype::TensorType> {
    let result: ValueId = module.op(q).ok()?.result(0)?;
    module.value_type(result).ok()
}
