//! Pass options.
//!
//! Provides typed configuration for the quantize pass with a bon builder and
//! an environment-variable constructor.

use std::str::FromStr;

use bon::bon;
use quanta_ir::GreedyRewriteConfig;
use snafu::{OptionExt, ResultExt};

use crate::error::*;
use crate::spec::{InferenceType, NumericVerifySpec, QuantPassSpec, QuantizationSpecs};

/// User-facing options of [`QuantizePass`](crate::QuantizePass).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuantizePassOptions {
    pub enable_per_channel_quantized_weight: bool,
    pub enable_weight_only: bool,
    pub inference_type: InferenceType,
    pub verify_numeric: bool,
    pub whole_model_verify: bool,
    /// Iteration bound of the greedy driver.
    pub max_iterations: usize,
    pub hybrid_entry_fragments: Vec<String>,
}

impl Default for QuantizePassOptions {
    fn default() -> Self {
        Self::builder().build()
    }
}

#[bon]
impl QuantizePassOptions {
    #[builder]
    pub fn new(
        #[builder(default = false)] enable_per_channel_quantized_weight: bool,
        #[builder(default = false)] enable_weight_only: bool,
        #[builder(default)] inference_type: InferenceType,
        #[builder(default = false)] verify_numeric: bool,
        #[builder(default = false)] whole_model_verify: bool,
        #[builder(default = 10)] max_iterations: usize,
        #[builder(default = vec![QuantizationSpecs::DEFAULT_HYBRID_FRAGMENT.to_string()])] hybrid_entry_fragments: Vec<String>,
    ) -> Self {
        Self {
            enable_per_channel_quantized_weight,
            enable_weight_only,
            inference_type,
            verify_numeric,
            whole_model_verify,
            max_iterations,
            hybrid_entry_fragments,
        }
    }

    /// Create options from environment variables.
    ///
    /// # Environment Variables
    ///
    /// * `QUANTA_PER_CHANNEL` - Accept per-channel quantized weights (default: off)
    /// * `QUANTA_WEIGHT_ONLY` - Enable weight-only (hybrid) quantization (default: off)
    /// * `QUANTA_INFERENCE_TYPE` - `qint8`, `quint8`, `qint16` or `float32` (default: qint8)
    /// * `QUANTA_VERIFY_NUMERIC` - Forwarded numeric verification flag (default: off)
    /// * `QUANTA_WHOLE_MODEL_VERIFY` - Forwarded whole-model verification flag (default: off)
    /// * `QUANTA_MAX_ITERATIONS` - Greedy driver iteration bound (default: 10)
    ///
    /// Unset variables keep their defaults; malformed values are errors.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Like [`QuantizePassOptions::from_env`], reading variables through `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Self::default();
        let flag = |variable: &str, default: bool| lookup(variable).map_or(Ok(default), |v| parse_flag(variable, &v));

        let inference_type = match lookup("QUANTA_INFERENCE_TYPE") {
            Some(value) => InferenceType::from_str(value.trim())
                .context(InvalidInferenceTypeSnafu { variable: "QUANTA_INFERENCE_TYPE", value })?,
            None => defaults.inference_type,
        };
        let max_iterations = match lookup("QUANTA_MAX_ITERATIONS") {
            Some(value) => value
                .trim()
                .parse::<usize>()
                .ok()
                .filter(|&n| n > 0)
                .context(InvalidCountSnafu { variable: "QUANTA_MAX_ITERATIONS", value })?,
            None => defaults.max_iterations,
        };

        Ok(Self {
            enable_per_channel_quantized_weight: flag("QUANTA_PER_CHANNEL", defaults.enable_per_channel_quantized_weight)?,
            enable_weight_only: flag("QUANTA_WEIGHT_ONLY", defaults.enable_weight_only)?,
            inference_type,
            verify_numeric: flag("QUANTA_VERIFY_NUMERIC", defaults.verify_numeric)?,
            whole_model_verify: flag("QUANTA_WHOLE_MODEL_VERIFY", defaults.whole_model_verify)?,
            max_iterations,
            hybrid_entry_fragments: defaults.hybrid_entry_fragments,
        })
    }
}

impl QuantizePassOptions {
    /// The read-only spec handed to every pattern.
    pub fn pass_spec(&self) -> QuantPassSpec {
        QuantPassSpec {
            verify: NumericVerifySpec { verify_numeric: self.verify_numeric, whole_model_verify: self.whole_model_verify },
            specs: QuantizationSpecs::builder()
                .inference_type(self.inference_type)
                .enable_per_channel_quantized_weight(self.enable_per_channel_quantized_weight)
                .enable_weight_only(self.enable_weight_only)
                .hybrid_entry_fragments(self.hybrid_entry_fragments.clone())
                .build(),
        }
    }

    pub fn rewrite_config(&self) -> GreedyRewriteConfig {
        GreedyRewriteConfig::builder().max_iterations(self.max_iterations).build()
    }
}

fn parse_flag(variable: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "" | "0" | "false" | "no" | "off" => Ok(false),
        "1" | "true" | "yes" | "on" => Ok(true),
        _ => InvalidFlagSnafu { variable, value }.fail(),
    }
}
