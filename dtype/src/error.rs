use snafu::Snafu;

use crate::ScalarDType;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Clone, PartialEq, Snafu)]
#[snafu(visibility(pub))]
pub enum Error {
    /// Storage type of a quantized element must be an integer no wider than 32 bits.
    #[snafu(display("invalid quantized storage type {storage}: expected an integer of at most 32 bits"))]
    InvalidStorageType { storage: ScalarDType },

    /// Expressed type of a quantized element must be floating point.
    #[snafu(display("invalid quantized expressed type {expressed}: expected a float type"))]
    InvalidExpressedType { expressed: ScalarDType },

    /// Per-axis quantization needs at least one scale.
    #[snafu(display("quantized type has an empty scale list"))]
    EmptyScales,

    /// Scales must be strictly positive and finite.
    #[snafu(display("invalid scale {scale}: scales must be positive and finite"))]
    InvalidScale { scale: f64 },

    /// Per-axis zero-point count must match the scale count.
    #[snafu(display("zero-point count {zero_points} does not match scale count {scales}"))]
    ZeroPointCountMismatch { scales: usize, zero_points: usize },

    /// Zero-point must be representable in the storage type.
    #[snafu(display("zero-point {zero_point} is outside the storage range [{min}, {max}]"))]
    ZeroPointOutOfRange { zero_point: i64, min: i64, max: i64 },

    /// Quantization axis does not name a dimension of the tensor.
    #[snafu(display("quantization axis {axis} is invalid for a tensor of rank {rank}"))]
    AxisOutOfRange { axis: usize, rank: usize },

    /// Number of per-axis parameters differs from the size of the quantized dimension.
    #[snafu(display("axis {axis} has size {dim} but the quantized type carries {channels} scale(s)"))]
    ChannelCountMismatch { axis: usize, dim: usize, channels: usize },

    /// Product accumulators are only defined for a per-tensor left operand.
    #[snafu(display("product accumulator needs a per-tensor left operand, got {channels} channels"))]
    PerAxisProductLhs { channels: usize },

    /// Number of values differs from the number of tensor elements.
    #[snafu(display("expected {expected} values for the tensor, got {actual}"))]
    ElementCountMismatch { expected: usize, actual: usize },
}
