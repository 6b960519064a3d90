//! Convenience builder for populating a region.
//!
//! ```ignore
//! let mut module = Module::new("m");
//! let mut b = FuncBuilder::function(&mut module, "main", &[f32_2x2.clone()]);
//! let q = b.qcast(b.arg(0), qtype)?;
//! let dq = b.dcast(q)?;
//! let sum = b.op(OpKind::Add, &[dq, dq], f32_2x2)?;
//! b.ret(&[sum])?;
//! ```

use quanta_dtype::{ElementType, TensorType, UniformQuantizedType};

use crate::error::Result;
use crate::op::{OpKind, OperationState};
use crate::types::{ATTR_ENTRY_FUNCTION, ATTR_VALUE, Attribute, DenseElements};
use crate::{InsertPoint, Module, OpId, RegionId, ValueId};

/// Appends operations to the end of one region.
pub struct FuncBuilder<'m> {
    module: &'m mut Module,
    region: RegionId,
}

impl<'m> FuncBuilder<'m> {
    /// Start a new function in `module`.
    pub fn function(module: &'m mut Module, name: &str, arg_types: &[TensorType]) -> Self {
        let region = module.add_function(name, arg_types);
        Self { module, region }
    }

    /// Continue appending to an existing region.
    pub fn at_end(module: &'m mut Module, region: RegionId) -> Self {
        Self { module, region }
    }

    pub fn module(&mut self) -> &mut Module {
        self.module
    }

    pub fn region(&self) -> RegionId {
        self.region
    }

    /// Region argument `index`.
    ///
    /// # Panics
    ///
    /// Panics when the region has no such argument.
    pub fn arg(&self, index: usize) -> ValueId {
        self.module.region(self.region).map(|r| r.args()[index]).expect("region argument out of range")
    }

    pub fn value_type(&self, value: ValueId) -> Result<TensorType> {
        self.module.value_type(value).cloned()
    }

    /// Append an arbitrary operation.
    pub fn create(&mut self, state: OperationState) -> Result<OpId> {
        self.module.create_op(InsertPoint::End(self.region), state)
    }

    /// Append a single-result operation and return its result.
    pub fn op(&mut self, kind: OpKind, operands: &[ValueId], result: TensorType) -> Result<ValueId> {
        let op = self.create(OperationState::new(kind).operands(operands.iter().copied()).result(result))?;
        self.first_result(op)
    }

    pub fn constant(&mut self, ty: TensorType, value: DenseElements) -> Result<ValueId> {
        let op = self.create(OperationState::new(OpKind::Constant).attr(ATTR_VALUE, value).result(ty))?;
        self.first_result(op)
    }

    /// `quant.qcast` of a float value into `qtype`, keeping the shape.
    pub fn qcast(&mut self, value: ValueId, qtype: UniformQuantizedType) -> Result<ValueId> {
        let ty = self.module.value_type(value)?.with_element(qtype);
        self.op(OpKind::QuantizeCast, &[value], ty)
    }

    /// `quant.dcast` of a quantized value into its expressed float type.
    ///
    /// A non-quantized input is passed through as a same-typed cast.
    pub fn dcast(&mut self, value: ValueId) -> Result<ValueId> {
        let input = self.module.value_type(value)?;
        let ty = match &input.element {
            ElementType::Quantized(q) => input.with_element(q.expressed()),
            ElementType::Scalar(_) => input.clone(),
        };
        self.op(OpKind::DequantizeCast, &[value], ty)
    }

    /// `func.call` of `entry` with extra attributes and an optional inlined body.
    pub fn call(
        &mut self,
        entry: &str,
        operands: &[ValueId],
        result: TensorType,
        attrs: impl IntoIterator<Item = (&'static str, Attribute)>,
        body: Option<RegionId>,
    ) -> Result<ValueId> {
        let mut state =
            OperationState::new(OpKind::Call).operands(operands.iter().copied()).result(result).attr(ATTR_ENTRY_FUNCTION, entry);
        for (name, value) in attrs {
            state = state.attr(name, value);
        }
        if let Some(body) = body {
            state = state.region(body);
        }
        let op = self.create(state)?;
        self.first_result(op)
    }

    /// Build a detached region with the given arguments; attach it by passing it to an op.
    pub fn build_region(
        &mut self,
        arg_types: &[TensorType],
        build: impl FnOnce(&mut FuncBuilder<'_>) -> Result<()>,
    ) -> Result<RegionId> {
        let region = self.module.create_region(arg_types);
        let mut nested = FuncBuilder::at_end(self.module, region);
        build(&mut nested)?;
        Ok(region)
    }

    pub fn ret(&mut self, values: &[ValueId]) -> Result<OpId> {
        self.create(OperationState::new(OpKind::Return).operands(values.iter().copied()))
    }

    fn first_result(&self, op: OpId) -> Result<ValueId> {
        Ok(self.module.op(op)?.results()[0])
    }
}
