//! Element and tensor types for the quanta quantization compiler.
//!
//! # Module Organization
//!
//! - [`quant`] - Uniform quantized element types (per-tensor and per-axis) and the
//!   scalar quantize/dequantize arithmetic they imply
//! - [`error`] - Validation errors raised by the quantized type constructors

pub mod error;
pub mod quant;


use smallvec::SmallVec;

pub use error::{Error, Result};
pub use quant::{QuantParams, UniformQuantizedType, dequantize_value, quantize_slice, quantize_value};

/// Scalar data types (base numeric types).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[derive(strum::EnumCount, strum::EnumIter, strum::Display, strum::EnumString, strum::VariantArray)]
#[strum(serialize_all = "lowercase")]
pub enum ScalarDType {
    #[strum(serialize = "i1")]
    Bool,

    #[strum(serialize = "i8")]
    Int8,
    #[strum(serialize = "u8")]
    UInt8,
    #[strum(serialize = "i16")]
    Int16,
    #[strum(serialize = "u16")]
    UInt16,
    #[strum(serialize = "i32")]
    Int32,
    #[strum(serialize = "u32")]
    UInt32,
    #[strum(serialize = "i64")]
    Int64,
    #[strum(serialize = "u64")]
    UInt64,

    #[strum(serialize = "f16")]
    Float16,
    #[strum(serialize = "bf16")]
    BFloat16,
    #[strum(serialize = "f32")]
    Float32,
    #[strum(serialize = "f64")]
    Float64,
}

impl ScalarDType {
    pub const fn bytes(&self) -> usize {
        match self {
            Self::Bool => 1,
            Self::Int8 | Self::UInt8 => 1,
            Self::Int16 | Self::UInt16 => 2,
            Self::Int32 | Self::UInt32 => 4,
            Self::Int64 | Self::UInt64 => 8,
            Self::Float16 | Self::BFloat16 => 2,
            Self::Float32 => 4,
            Self::Float64 => 8,
        }
    }

    pub const fn bits(&self) -> usize {
        match self {
            Self::Bool => 1,
            _ => self.bytes() * 8,
        }
    }

    pub const fn is_bool(&self) -> bool {
        matches!(self, Self::Bool)
    }

    pub const fn is_signed(&self) -> bool {
        matches!(self, Self::Int8 | Self::Int16 | Self::Int32 | Self::Int64)
    }

    pub const fn is_unsigned(&self) -> bool {
        matches!(self, Self::UInt8 | Self::UInt16 | Self::UInt32 | Self::UInt64)
    }

    pub const fn is_int(&self) -> bool {
        self.is_signed() || self.is_unsigned()
    }

    pub const fn is_float(&self) -> bool {
        matches!(self, Self::Float16 | Self::BFloat16 | Self::Float32 | Self::Float64)
    }

    /// Inclusive integer range representable by this type.
    ///
    /// Returns `None` for non-integer types. `UInt64` saturates at `i64::MAX`.
    pub const fn storage_range(&self) -> Option<(i64, i64)> {
        match self {
            Self::Int8 => Some((i8::MIN as i64, i8::MAX as i64)),
            Self::UInt8 => Some((0, u8::MAX as i64)),
            Self::Int16 => Some((i16::MIN as i64, i16::MAX as i64)),
            Self::UInt16 => Some((0, u16::MAX as i64)),
            Self::Int32 => Some((i32::MIN as i64, i32::MAX as i64)),
            Self::UInt32 => Some((0, u32::MAX as i64)),
            Self::Int64 => Some((i64::MIN, i64::MAX)),
            Self::UInt64 => Some((0, i64::MAX)),
            _ => None,
        }
    }
}

/// Element type of a tensor: either a plain scalar or a uniform quantized type.
#[derive(Debug, Clone, PartialEq, derive_more::From)]
pub enum ElementType {
    Scalar(ScalarDType),
    Quantized(UniformQuantizedType),
}

impl ElementType {
    pub fn is_float(&self) -> bool {
        matches!(self, Self::Scalar(s) if s.is_float())
    }

    pub fn is_int(&self) -> bool {
        matches!(self, Self::Scalar(s) if s.is_int())
    }

    pub fn is_quantized(&self) -> bool {
        matches!(self, Self::Quantized(_))
    }

    pub fn as_quantized(&self) -> Option<&UniformQuantizedType> {
        match self {
            Self::Quantized(q) => Some(q),
            Self::Scalar(_) => None,
        }
    }

    /// Scalar type that holds values of this element at runtime.
    pub fn storage(&self) -> ScalarDType {
        match self {
            Self::Scalar(s) => *s,
            Self::Quantized(q) => q.storage(),
        }
    }
}

impl std::fmt::Display for ElementType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Scalar(s) => write!(f, "{s}"),
            Self::Quantized(q) => write!(f, "{q}"),
        }
    }
}

/// Ranked tensor type. A rank-0 shape denotes a scalar tensor.
#[derive(Debug, Clone, PartialEq)]
pub struct TensorType {
    pub shape: SmallVec<[usize; 4]>,
    pub element: ElementType,
}

impl TensorType {
    pub fn new(shape: &[usize], element: impl Into<ElementType>) -> Self {
        Self { shape: SmallVec::from_slice(shape), element: element.into() }
    }

    pub fn scalar(element: impl Into<ElementType>) -> Self {
        Self { shape: SmallVec::new(), element: element.into() }
    }

    pub fn rank(&self) -> usize {
        self.shape.len()
    }

    pub fn num_elements(&self) -> usize {
        self.shape.iter().product()
    }

    pub fn is_float(&self) -> bool {
        self.element.is_float()
    }

    pub fn is_quantized(&self) -> bool {
        self.element.is_quantized()
    }

    pub fn quantized(&self) -> Option<&UniformQuantizedType> {
        self.element.as_quantized()
    }

    /// Same shape, different element type.
    pub fn with_element(&self, element: impl Into<ElementType>) -> Self {
        Self { shape: self.shape.clone(), element: element.into() }
    }
}

impl std::fmt::Display for TensorType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "tensor<")?;
        for dim in &self.shape {
            write!(f, "{dim}x")?;
        }
        write!(f, "{}>", self.element)
    }
}
