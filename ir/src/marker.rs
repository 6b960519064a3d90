//! Quantization boundary markers.
//!
//! A `quant.qcast` maps a float tensor to the same-shaped tensor of a uniform
//! quantized type; a `quant.dcast` maps it back to the expressed float type.
//! The pair carries the scale and zero point chosen by an earlier
//! calibration stage. Markers are well formed when:
//!
//! - each marker has one operand and one result of the same shape,
//! - the quantized side's expressed type is the float side's element type,
//! - the quantized type is valid for the tensor shape (per-axis axis in range,
//!   one scale per channel),
//! - every `quant.dcast` reads a `quant.qcast`, a quantization-eligible op or a
//!   block argument.

use quanta_dtype::{ElementType, TensorType, UniformQuantizedType};
use snafu::{ResultExt, ensure};

use crate::error::*;
use crate::op::OpKind;
use crate::{Module, OpId};

/// Direction of a boundary marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
pub enum MarkerKind {
    /// Float to quantized.
    Quantize,
    /// Quantized to float.
    Dequantize,
}

impl MarkerKind {
    pub const fn op_kind(self) -> OpKind {
        match self {
            Self::Quantize => OpKind::QuantizeCast,
            Self::Dequantize => OpKind::DequantizeCast,
        }
    }
}

/// Marker direction of `op`, `None` for anything that is not a marker.
pub fn marker_kind(module: &Module, op: OpId) -> Option<MarkerKind> {
    match module.kind(op)? {
        OpKind::QuantizeCast => Some(MarkerKind::Quantize),
        OpKind::DequantizeCast => Some(MarkerKind::Dequantize),
        _ => None,
    }
}

/// Quantized element type carried by a marker, on whichever side it sits.
pub fn marker_quantized_type(module: &Module, op: OpId) -> Option<&UniformQuantizedType> {
    let operation = module.op(op).ok()?;
    let value = match marker_kind(module, op)? {
        MarkerKind::Quantize => operation.result(0)?,
        MarkerKind::Dequantize => operation.operand(0)?,
    };
    module.value_type(value).ok()?.quantized()
}

/// Check every marker of `module` against the boundary contract.
///
/// `is_eligible` decides whether a non-marker operation may feed a `quant.dcast`.
pub fn verify_markers(module: &Module, is_eligible: impl Fn(&Module, OpId) -> bool) -> Result<()> {
    for op in module.walk() {
        let Some(kind) = marker_kind(module, op) else {
            continue;
        };
        let operation = module.op(op)?;
        let (input, output) = match (operation.operands(), operation.results()) {
            ([input], [output]) => (*input, *output),
            _ => return MarkerAritySnafu { op, kind: operation.kind() }.fail(),
        };
        let input_ty = module.value_type(input)?;
        let output_ty = module.value_type(output)?;

        let (float_ty, quant_ty) = match kind {
            MarkerKind::Quantize => (input_ty, output_ty),
            MarkerKind::Dequantize => (output_ty, input_ty),
        };
        check_boundary(op, operation.kind(), input_ty, output_ty, float_ty, quant_ty)?;

        if kind == MarkerKind::Dequantize
            && let Some(producer) = module.defining_op(input)
        {
            let producer_kind = module.op(producer)?.kind();
            ensure!(
                producer_kind == OpKind::QuantizeCast || is_eligible(module, producer),
                DanglingDequantizeSnafu { op, producer: producer_kind }
            );
        }
    }
    Ok(())
}

fn check_boundary(
    op: OpId,
    kind: OpKind,
    input: &TensorType,
    output: &TensorType,
    float_ty: &TensorType,
    quant_ty: &TensorType,
) -> Result<()> {
    let mismatch = || MarkerTypeMismatchSnafu { op, kind, input: input.clone(), output: output.clone() };

    let (ElementType::Scalar(float_elem), ElementType::Quantized(qtype)) = (&float_ty.element, &quant_ty.element) else {
        return mismatch().fail();
    };
    ensure!(float_elem.is_float() && float_ty.shape == quant_ty.shape, mismatch());
    ensure!(qtype.expressed() == *float_elem, mismatch());
    qtype.validate_for_shape(&quant_ty.shape).context(MarkerQuantizedTypeSnafu { op })?;
    Ok(())
}
