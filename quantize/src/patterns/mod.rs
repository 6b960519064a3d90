//! Quantization rewrite patterns.
//!
//! Every pattern is a rule of a [`PatternSet`](quanta_ir::PatternSet) over the
//! read-only [`QuantPassSpec`](crate::QuantPassSpec). Matching is pure: a
//! pattern first computes a plan from the module, and only mutates it once
//! the whole plan is known, so a decline never leaves partial changes behind.
//!
//! - [`marker`] - quantization of compute ops between boundary markers, in three variants
//! - [`singular`] - constant folding and same-scale data movement
//! - [`region`] - ops carrying a reducer region
//! - [`fused_gemm`] - lowering of fully quantized contraction calls to integer arithmetic
//! - [`hybrid`] - lowering of weight-only quantized calls

pub mod fused_gemm;
pub mod hybrid;
pub mod marker;
pub mod region;
pub mod singular;

use quanta_dtype::TensorType;
use quanta_ir::pattern::Rewriter;
use quanta_ir::{InsertPoint, Module, OpId, OperationState, ValueId};
use smallvec::SmallVec;

pub use marker::{HybridPolicy, MarkerPattern, RootMarker, quantize_with_markers};

/// Trace why a candidate was declined and return `None`.
pub(crate) fn decline<T>(op: OpId, reason: &'static str) -> Option<T> {
    tracing::trace!(%op, reason, "declined");
    None
}

/// Planned result of a replacement: its new type and the `quant.qcast` it absorbs.
#[derive(Debug, Clone)]
pub(crate) struct ResultPlan {
    pub ty: TensorType,
    pub quantize: Option<OpId>,
}

/// Re-creation of one operation with quantized operand and result types.
#[derive(Debug, Clone)]
pub(crate) struct Replacement {
    pub op: OpId,
    pub operands: SmallVec<[ValueId; 4]>,
    pub results: SmallVec<[ResultPlan; 1]>,
    /// `quant.dcast` ops whose inputs were taken as operands.
    pub dequantized: SmallVec<[OpId; 4]>,
}

impl Replacement {
    pub fn new(op: OpId) -> Self {
        Self { op, operands: SmallVec::new(), results: SmallVec::new(), dequantized: SmallVec::new() }
    }

    /// Whether the replacement changes anything at all.
    pub fn absorbs_markers(&self) -> bool {
        !self.dequantized.is_empty() || self.results.iter().any(|r| r.quantize.is_some())
    }

    /// Build the new op, move regions across, reroute uses and erase the absorbed markers.
    pub fn apply(self, rw: &mut Rewriter<'_>) -> quanta_ir::Result<OpId> {
        let module: &Module = rw.module();
        let old = module.op(self.op)?;
        let state = OperationState::new(old.kind())
            .operands(self.operands.iter().copied())
            .results(self.results.iter().map(|r| r.ty.clone()))
            .attrs(old.attrs().clone());
        let old_results = old.results().to_vec();

        let new = rw.create_op(InsertPoint::Before(self.op), state)?;
        rw.take_regions(self.op, new)?;
        let new_results = rw.module().op(new)?.results().to_vec();

        for ((plan, &old_result), &new_result) in self.results.iter().zip(&old_results).zip(&new_results) {
            match plan.quantize {
                Some(q) => {
                    let q_result = rw.module().op(q)?.results()[0];
                    rw.replace_all_uses(q_result, new_result)?;
                    rw.erase_op(q)?;
                }
                None => rw.replace_all_uses(old_result, new_result)?,
            }
        }
        rw.erase_op(self.op)?;
        for dq in self.dequantized {
            rw.erase_if_dead(dq)?;
        }
        Ok(new)
    }
}
