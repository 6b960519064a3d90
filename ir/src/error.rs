use quanta_dtype::TensorType;
use snafu::Snafu;

use crate::{OpId, OpKind, RegionId, ValueId};

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Clone, PartialEq, Snafu)]
#[snafu(visibility(pub))]
pub enum Error {
    /// Operation handle refers to an erased operation.
    #[snafu(display("operation {op} has been erased"))]
    DeadOperation { op: OpId },

    /// Value handle refers to a result of an erased operation.
    #[snafu(display("value {value} is defined by an erased operation"))]
    DeadValue { value: ValueId },

    /// Value handle was never allocated by this module.
    #[snafu(display("value {value} does not belong to this module"))]
    UnknownValue { value: ValueId },

    /// Region handle was never allocated by this module.
    #[snafu(display("region {region} does not belong to this module"))]
    UnknownRegion { region: RegionId },

    /// A region can be owned by a single operation or function only.
    #[snafu(display("region {region} is already attached to an operation"))]
    RegionAlreadyAttached { region: RegionId },

    /// Operations with live uses cannot be erased.
    #[snafu(display("cannot erase {op}: result {value} still has {uses} use(s)"))]
    ResultStillInUse { op: OpId, value: ValueId, uses: usize },

    /// Operand index is out of bounds for the operation.
    #[snafu(display("operand index {index} out of bounds for {op} with {count} operand(s)"))]
    OperandOutOfRange { op: OpId, index: usize, count: usize },

    /// Marker operation has the wrong arity.
    #[snafu(display("marker {op} ({kind}) must have exactly one operand and one result"))]
    MarkerArity { op: OpId, kind: OpKind },

    /// Marker input/output types do not describe a float/quantized boundary.
    #[snafu(display("marker {op} ({kind}) maps {input} to {output}, which is not a float/quantized boundary"))]
    MarkerTypeMismatch { op: OpId, kind: OpKind, input: TensorType, output: TensorType },

    /// Marker's quantized type is inconsistent with the tensor it annotates.
    #[snafu(display("marker {op} carries an invalid quantized type: {source}"))]
    MarkerQuantizedType { op: OpId, source: quanta_dtype::Error },

    /// Dequantize marker fed by an operation that cannot produce quantized values.
    #[snafu(display("dequantize marker {op} is fed by {producer}, which is neither a quantize marker nor quantizable"))]
    DanglingDequantize { op: OpId, producer: OpKind },
}
