//! Operation kinds and operation records.
//!
//! An [`Operation`] lives in the [`Module`](crate::Module) arena and refers to its
//! operands, results and nested regions through handles. New operations are
//! described with an [`OperationState`] and materialized by
//! [`Module::create_op`](crate::Module::create_op).

use quanta_dtype::TensorType;
use smallvec::SmallVec;

use crate::types::{Attribute, Attributes};
use crate::{RegionId, ValueId};

/// Opcode of an operation.
///
/// The printed names follow the dialect-qualified convention (`quant.*` for the
/// boundary markers, `hlo.*` for tensor compute, `func.*` for calls).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[derive(strum::Display, strum::EnumString, strum::IntoStaticStr, strum::EnumIter)]
pub enum OpKind {
    // Boundary markers
    #[strum(serialize = "quant.qcast")]
    QuantizeCast,
    #[strum(serialize = "quant.dcast")]
    DequantizeCast,

    #[strum(serialize = "hlo.constant")]
    Constant,

    // Elementwise arithmetic
    #[strum(serialize = "hlo.add")]
    Add,
    #[strum(serialize = "hlo.subtract")]
    Subtract,
    #[strum(serialize = "hlo.multiply")]
    Multiply,
    #[strum(serialize = "hlo.maximum")]
    Maximum,
    #[strum(serialize = "hlo.minimum")]
    Minimum,

    // Contractions
    #[strum(serialize = "hlo.dot_general")]
    DotGeneral,
    #[strum(serialize = "hlo.convolution")]
    Convolution,

    // Data movement
    #[strum(serialize = "hlo.reshape")]
    Reshape,
    #[strum(serialize = "hlo.transpose")]
    Transpose,
    #[strum(serialize = "hlo.broadcast_in_dim")]
    Broadcast,
    #[strum(serialize = "hlo.slice")]
    Slice,
    #[strum(serialize = "hlo.concatenate")]
    Concatenate,
    #[strum(serialize = "hlo.pad")]
    Pad,
    #[strum(serialize = "hlo.gather")]
    Gather,
    #[strum(serialize = "hlo.select")]
    Select,

    /// Windowed reduction whose reducer is the op's single region.
    #[strum(serialize = "hlo.reduce_window")]
    ReduceWindow,

    // Integer-domain conversions
    #[strum(serialize = "hlo.uniform_quantize")]
    UniformQuantize,
    #[strum(serialize = "hlo.uniform_dequantize")]
    UniformDequantize,

    /// Call of an entry function; the callee body may be carried as a region.
    #[strum(serialize = "func.call")]
    Call,
    #[strum(serialize = "func.return")]
    Return,
}

impl OpKind {
    pub const fn is_terminator(&self) -> bool {
        matches!(self, Self::Return)
    }

    pub const fn is_marker(&self) -> bool {
        matches!(self, Self::QuantizeCast | Self::DequantizeCast)
    }

    /// Side-effect free: safe to erase once every result is unused.
    pub const fn is_pure(&self) -> bool {
        !matches!(self, Self::Return | Self::Call)
    }
}

/// An operation stored in the module arena.
#[derive(Debug, Clone)]
pub struct Operation {
    pub(crate) kind: OpKind,
    pub(crate) operands: SmallVec<[ValueId; 4]>,
    pub(crate) results: SmallVec<[ValueId; 1]>,
    pub(crate) attrs: Attributes,
    pub(crate) regions: SmallVec<[RegionId; 1]>,
    pub(crate) parent: RegionId,
}

impl Operation {
    pub fn kind(&self) -> OpKind {
        self.kind
    }

    pub fn operands(&self) -> &[ValueId] {
        &self.operands
    }

    pub fn operand(&self, index: usize) -> Option<ValueId> {
        self.operands.get(index).copied()
    }

    pub fn results(&self) -> &[ValueId] {
        &self.results
    }

    pub fn result(&self, index: usize) -> Option<ValueId> {
        self.results.get(index).copied()
    }

    pub fn attrs(&self) -> &Attributes {
        &self.attrs
    }

    pub fn attr(&self, name: &str) -> Option<&Attribute> {
        self.attrs.get(name)
    }

    pub fn regions(&self) -> &[RegionId] {
        &self.regions
    }

    /// Region that contains this operation.
    pub fn parent(&self) -> RegionId {
        self.parent
    }
}

/// Description of an operation to create.
#[derive(Debug, Clone)]
pub struct OperationState {
    pub kind: OpKind,
    pub operands: SmallVec<[ValueId; 4]>,
    pub result_types: SmallVec<[TensorType; 1]>,
    pub attrs: Attributes,
    pub regions: SmallVec<[RegionId; 1]>,
}

impl OperationState {
    pub fn new(kind: OpKind) -> Self {
        Self {
            kind,
            operands: SmallVec::new(),
            result_types: SmallVec::new(),
            attrs: Attributes::new(),
            regions: SmallVec::new(),
        }
    }

    pub fn operands(mut self, operands: impl IntoIterator<Item = ValueId>) -> Self {
        self.operands.extend(operands);
        self
    }

    pub fn result(mut self, ty: TensorType) -> Self {
        self.result_types.push(ty);
        self
    }

    pub fn results(mut self, types: impl IntoIterator<Item = TensorType>) -> Self {
        self.result_types.extend(types);
        self
    }

    pub fn attr(mut self, name: impl Into<String>, value: impl Into<Attribute>) -> Self {
        self.attrs.insert(name.into(), value.into());
        self
    }

    pub fn attrs(mut self, attrs: Attributes) -> Self {
        self.attrs.extend(attrs);
        self
    }

    pub fn region(mut self, region: RegionId) -> Self {
        self.regions.push(region);
        self
    }
}
