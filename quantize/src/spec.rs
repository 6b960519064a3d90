//! Read-only quantization settings shared by every pattern.

use bon::bon;
use quanta_dtype::{ScalarDType, UniformQuantizedType};

/// Numeric type the quantized model is meant to run with.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[derive(strum::Display, strum::EnumString, strum::EnumIter, strum::IntoStaticStr)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum InferenceType {
    #[default]
    QInt8,
    QUInt8,
    QInt16,
    /// Float inference: nothing gets quantized.
    Float32,
}

impl InferenceType {
    /// Storage type quantized tensors must use, `None` for float inference.
    pub const fn storage(self) -> Option<ScalarDType> {
        match self {
            Self::QInt8 => Some(ScalarDType::Int8),
            Self::QUInt8 => Some(ScalarDType::UInt8),
            Self::QInt16 => Some(ScalarDType::Int16),
            Self::Float32 => None,
        }
    }

    pub const fn is_quantized(self) -> bool {
        self.storage().is_some()
    }
}

/// Numeric verification flags. Carried for downstream stages, not interpreted here.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NumericVerifySpec {
    pub verify_numeric: bool,
    pub whole_model_verify: bool,
}

/// Quantization settings consulted by the patterns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuantizationSpecs {
    pub inference_type: InferenceType,
    pub enable_per_channel_quantized_weight: bool,
    pub enable_weight_only: bool,
    /// Entry-function name fragments that make a call eligible for hybrid (weight-only) quantization.
    pub hybrid_entry_fragments: Vec<String>,
}

impl QuantizationSpecs {
    pub const DEFAULT_HYBRID_FRAGMENT: &'static str = "dot_general";
}

impl Default for QuantizationSpecs {
    fn default() -> Self {
        Self::builder().build()
    }
}

#[bon]
impl QuantizationSpecs {
    #[builder]
    pub fn new(
        #[builder(default)] inference_type: InferenceType,
        #[builder(default = false)] enable_per_channel_quantized_weight: bool,
        #[builder(default = false)] enable_weight_only: bool,
        #[builder(default = vec![QuantizationSpecs::DEFAULT_HYBRID_FRAGMENT.to_string()])] hybrid_entry_fragments: Vec<String>,
    ) -> Self {
        Self { inference_type, enable_per_channel_quantized_weight, enable_weight_only, hybrid_entry_fragments }
    }

    /// Whether values of type `qtype` shaped `shape` may take part in a quantized rewrite.
    ///
    /// The storage must match the inference type. Per-axis types need
    /// per-channel quantization enabled and must fit the shape.
    pub fn accepts(&self, qtype: &UniformQuantizedType, shape: &[usize]) -> bool {
        self.inference_type.storage() == Some(qtype.storage()) && self.fits(qtype, shape)
    }

    /// Like [`accepts`](Self::accepts), but also takes `i32` storage for a bias operand.
    pub fn accepts_bias(&self, qtype: &UniformQuantizedType, shape: &[usize]) -> bool {
        match self.inference_type.storage() {
            Some(storage) if qtype.storage() == storage || qtype.storage() == ScalarDType::Int32 => {
                self.fits(qtype, shape)
            }
            _ => false,
        }
    }

    fn fits(&self, qtype: &UniformQuantizedType, shape: &[usize]) -> bool {
        if qtype.is_per_axis() && !self.enable_per_channel_quantized_weight {
            return false;
        }
        qtype.validate_for_shape(shape).is_ok()
    }

    /// Whether `entry` names a function eligible for hybrid quantization.
    pub fn is_hybrid_entry(&self, entry: &str) -> bool {
        self.hybrid_entry_fragments.iter().any(|fragment| entry.contains(fragment.as_str()))
    }
}

/// Everything a pattern may read: quantization settings and verification flags.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QuantPassSpec {
    pub verify: NumericVerifySpec,
    pub specs: QuantizationSpecs,
}
