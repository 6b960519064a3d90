//! Uniform quantized element types.
//!
//! A uniform quantized value `q` stored in an integer type approximates the real
//! value `(q - zero_point) * scale`. Parameters are either shared by the whole
//! tensor (per-tensor) or given per slice along one axis (per-axis, a.k.a.
//! per-channel).

use snafu::ensure;

use crate::ScalarDType;
use crate::error::*;

/// Scale/zero-point parameters of a uniform quantized type.
#[derive(Debug, Clone, PartialEq)]
pub enum QuantParams {
    PerTensor { scale: f64, zero_point: i64 },
    PerAxis { axis: usize, scales: Vec<f64>, zero_points: Vec<i64> },
}

/// Uniform quantized element type: integer storage approximating a float type.
#[derive(Debug, Clone, PartialEq)]
pub struct UniformQuantizedType {
    storage: ScalarDType,
    expressed: ScalarDType,
    params: QuantParams,
}

impl UniformQuantizedType {
    /// Create a per-tensor quantized type.
    pub fn per_tensor(storage: ScalarDType, expressed: ScalarDType, scale: f64, zero_point: i64) -> Result<Self> {
        let (min, max) = check_storage(storage, expressed)?;
        check_scale(scale)?;
        check_zero_point(zero_point, min, max)?;
        Ok(Self { storage, expressed, params: QuantParams::PerTensor { scale, zero_point } })
    }

    /// Create a per-axis quantized type with one scale/zero-point pair per slice along `axis`.
    pub fn per_axis(
        storage: ScalarDType,
        expressed: ScalarDType,
        axis: usize,
        scales: Vec<f64>,
        zero_points: Vec<i64>,
    ) -> Result<Self> {
        let (min, max) = check_storage(storage, expressed)?;
        ensure!(!scales.is_empty(), EmptyScalesSnafu);
        ensure!(
            scales.len() == zero_points.len(),
            ZeroPointCountMismatchSnafu { scales: scales.len(), zero_points: zero_points.len() }
        );
        for &scale in &scales {
            check_scale(scale)?;
        }
        for &zero_point in &zero_points {
            check_zero_point(zero_point, min, max)?;
        }
        Ok(Self { storage, expressed, params: QuantParams::PerAxis { axis, scales, zero_points } })
    }

    /// Accumulator type for a product of `lhs` (per-tensor) and `rhs` values.
    ///
    /// The zero-point is 0 and every scale is `lhs_scale * rhs_scale[i]`. A
    /// per-axis `rhs` yields a per-axis accumulator along `axis`.
    pub fn product(lhs: &Self, rhs: &Self, storage: ScalarDType, axis: usize) -> Result<Self> {
        let QuantParams::PerTensor { scale: lhs_scale, .. } = lhs.params else {
            return PerAxisProductLhsSnafu { channels: lhs.num_channels() }.fail();
        };
        match &rhs.params {
            QuantParams::PerTensor { scale, .. } => Self::per_tensor(storage, lhs.expressed, lhs_scale * scale, 0),
            QuantParams::PerAxis { scales, .. } => Self::per_axis(
                storage,
                lhs.expressed,
                axis,
                scales.iter().map(|s| lhs_scale * s).collect(),
                vec![0; scales.len()],
            ),
        }
    }

    pub fn storage(&self) -> ScalarDType {
        self.storage
    }

    pub fn expressed(&self) -> ScalarDType {
        self.expressed
    }

    pub fn params(&self) -> &QuantParams {
        &self.params
    }

    pub fn is_per_axis(&self) -> bool {
        matches!(self.params, QuantParams::PerAxis { .. })
    }

    /// `(scale, zero_point)` for per-tensor types.
    pub fn per_tensor_params(&self) -> Option<(f64, i64)> {
        match self.params {
            QuantParams::PerTensor { scale, zero_point } => Some((scale, zero_point)),
            QuantParams::PerAxis { .. } => None,
        }
    }

    pub fn axis(&self) -> Option<usize> {
        match self.params {
            QuantParams::PerAxis { axis, .. } => Some(axis),
            QuantParams::PerTensor { .. } => None,
        }
    }

    /// Number of scale/zero-point pairs (1 for per-tensor).
    pub fn num_channels(&self) -> usize {
        match &self.params {
            QuantParams::PerTensor { .. } => 1,
            QuantParams::PerAxis { scales, .. } => scales.len(),
        }
    }

    /// Scale and zero-point applying to `channel` (ignored for per-tensor).
    pub fn channel_params(&self, channel: usize) -> Option<(f64, i64)> {
        match &self.params {
            QuantParams::PerTensor { scale, zero_point } => Some((*scale, *zero_point)),
            QuantParams::PerAxis { scales, zero_points, .. } => Some((*scales.get(channel)?, *zero_points.get(channel)?)),
        }
    }

    /// Inclusive storage range.
    pub fn storage_range(&self) -> (i64, i64) {
        // Validated at construction.
        self.storage.storage_range().unwrap_or((i64::MIN, i64::MAX))
    }

    /// Same storage, expressed type and parameters.
    pub fn same_params(&self, other: &Self) -> bool {
        self == other
    }

    /// Check that this type can describe a tensor of the given shape.
    ///
    /// Per-axis types need `axis < rank` and one parameter pair per slice.
    pub fn validate_for_shape(&self, shape: &[usize]) -> Result<()> {
        if let QuantParams::PerAxis { axis, scales, .. } = &self.params {
            let dim = *shape.get(*axis).ok_or(Error::AxisOutOfRange { axis: *axis, rank: shape.len() })?;
            ensure!(dim == scales.len(), ChannelCountMismatchSnafu { axis: *axis, dim, channels: scales.len() });
        }
        Ok(())
    }
}

impl std::fmt::Display for UniformQuantizedType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.params {
            QuantParams::PerTensor { scale, zero_point } => {
                write!(f, "!quant.uniform<{}:{}, {scale}:{zero_point}>", self.storage, self.expressed)
            }
            QuantParams::PerAxis { axis, scales, zero_points } => {
                write!(f, "!quant.uniform<{}:{}:{axis}, {{", self.storage, self.expressed)?;
                for (i, (scale, zero_point)) in scales.iter().zip(zero_points).enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, "{scale}:{zero_point}")?;
                }
                write!(f, "}}>")
            }
        }
    }
}

fn check_storage(storage: ScalarDType, expressed: ScalarDType) -> Result<(i64, i64)> {
    ensure!(expressed.is_float(), InvalidExpressedTypeSnafu { expressed });
    match storage.storage_range() {
        Some(range) if storage.bits() <= 32 => Ok(range),
        _ => InvalidStorageTypeSnafu { storage }.fail(),
    }
}

fn check_scale(scale: f64) -> Result<()> {
    ensure!(scale.is_finite() && scale > 0.0, InvalidScaleSnafu { scale });
    Ok(())
}

fn check_zero_point(zero_point: i64, min: i64, max: i64) -> Result<()> {
    ensure!((min..=max).contains(&zero_point), ZeroPointOutOfRangeSnafu { zero_point, min, max });
    Ok(())
}

/// Quantize one real value: `clamp(round(value / scale) + zero_point, min, max)`.
pub fn quantize_value(value: f64, scale: f64, zero_point: i64, (min, max): (i64, i64)) -> i64 {
    let scaled = (value / scale).round();
    // NaN maps to the zero-point.
    let scaled = if scaled.is_nan() { 0.0 } else { scaled };
    let q = (scaled as i64).saturating_add(zero_point);
    q.clamp(min, max)
}

/// Real value approximated by the stored integer `q`.
pub fn dequantize_value(q: i64, scale: f64, zero_point: i64) -> f64 {
    (q - zero_point) as f64 * scale
}

/// Quantize a dense row-major tensor payload with the parameters of `ty`.
pub fn quantize_slice(values: &[f64], shape: &[usize], ty: &UniformQuantizedType) -> Result<Vec<i64>> {
    let expected: usize = shape.iter().product();
    ensure!(values.len() == expected, ElementCountMismatchSnafu { expected, actual: values.len() });
    ty.validate_for_shape(shape)?;

    let range = ty.storage_range();
    let quantized = match ty.params() {
        QuantParams::PerTensor { scale, zero_point } => {
            values.iter().map(|&v| quantize_value(v, *scale, *zero_point, range)).collect()
        }
        QuantParams::PerAxis { axis, scales, zero_points } => {
            let stride: usize = shape[*axis + 1..].iter().product();
            let dim = shape[*axis];
            values
                .iter()
                .enumerate()
                .map(|(i, &v)| {
                    let channel = (i / stride.max(1)) % dim;
                    quantize_value(v, scales[channel], zero_points[channel], range)
                })
                .collect()
        }
    };
    Ok(quantized)
}
