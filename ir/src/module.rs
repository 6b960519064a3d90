//! Module arena: functions, operations, values and regions.
//!
//! Every entity is addressed by a small copyable handle ([`OpId`], [`ValueId`],
//! [`RegionId`]) indexing into arenas owned by the [`Module`]. Erasing an
//! operation leaves a tombstone, so handles held by a worklist stay valid and can
//! be checked with [`Module::is_live`].
//!
//! Use lists are maintained eagerly: every operand slot is recorded on the value
//! it reads, which makes `users`, `has_one_use` and `replace_all_uses` cheap.

use quanta_dtype::TensorType;
use smallvec::SmallVec;
use snafu::{OptionExt, ensure};

use crate::diagnostic::Diagnostic;
use crate::error::*;
use crate::op::{OpKind, Operation, OperationState};
use crate::types::Attribute;

/// Handle of an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, derive_more::Display)]
#[display("op{_0}")]
pub struct OpId(u32);

/// Handle of an SSA value (operation result or region argument).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, derive_more::Display)]
#[display("%{_0}")]
pub struct ValueId(u32);

/// Handle of a region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, derive_more::Display)]
#[display("region{_0}")]
pub struct RegionId(u32);

impl OpId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl ValueId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl RegionId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Where a value comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueDef {
    Result { op: OpId, index: usize },
    Argument { region: RegionId, index: usize },
}

/// One operand slot reading a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Use {
    pub op: OpId,
    pub operand: usize,
}

#[derive(Debug, Clone)]
struct ValueData {
    ty: TensorType,
    def: ValueDef,
    uses: SmallVec<[Use; 2]>,
}

/// Ordered list of operations with typed entry arguments.
#[derive(Debug, Clone, Default)]
pub struct Region {
    args: SmallVec<[ValueId; 4]>,
    ops: Vec<OpId>,
    owner: Option<RegionOwner>,
}

impl Region {
    pub fn args(&self) -> &[ValueId] {
        &self.args
    }

    pub fn ops(&self) -> &[OpId] {
        &self.ops
    }

    /// Operation owning this region, `None` for function bodies and detached regions.
    pub fn parent_op(&self) -> Option<OpId> {
        match self.owner {
            Some(RegionOwner::Op(op)) => Some(op),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RegionOwner {
    Function,
    Op(OpId),
}

/// Named top-level function.
#[derive(Debug, Clone)]
pub struct Function {
    pub name: String,
    pub body: RegionId,
}

/// Where to insert a newly created operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertPoint {
    /// Append at the end of the region.
    End(RegionId),
    /// Insert right before an existing operation, in its region.
    Before(OpId),
    /// Insert at the start of the region.
    Start(RegionId),
}

/// Top-level container owning every operation, value and region of a program.
#[derive(Debug, Clone, Default)]
pub struct Module {
    name: String,
    ops: Vec<Option<Operation>>,
    values: Vec<ValueData>,
    regions: Vec<Region>,
    functions: Vec<Function>,
    diagnostics: Vec<Diagnostic>,
}

impl Module {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), ..Default::default() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    // =========================================================================
    // Functions and regions
    // =========================================================================

    /// Add a function with the given argument types and return its body region.
    pub fn add_function(&mut self, name: impl Into<String>, arg_types: &[TensorType]) -> RegionId {
        let body = self.create_region(arg_types);
        self.regions[body.index()].owner = Some(RegionOwner::Function);
        self.functions.push(Function { name: name.into(), body });
        body
    }

    pub fn functions(&self) -> &[Function] {
        &self.functions
    }

    pub fn function(&self, name: &str) -> Option<&Function> {
        self.functions.iter().find(|f| f.name == name)
    }

    /// Create a detached region; it becomes owned once passed to [`Module::create_op`].
    pub fn create_region(&mut self, arg_types: &[TensorType]) -> RegionId {
        let region = RegionId(self.regions.len() as u32);
        let args = arg_types
            .iter()
            .enumerate()
            .map(|(index, ty)| self.alloc_value(ty.clone(), ValueDef::Argument { region, index }))
            .collect();
        self.regions.push(Region { args, ops: Vec::new(), owner: None });
        region
    }

    pub fn region(&self, region: RegionId) -> Result<&Region> {
        self.regions.get(region.index()).context(UnknownRegionSnafu { region })
    }

    // =========================================================================
    // Operations
    // =========================================================================

    /// Materialize an operation at `at`.
    pub fn create_op(&mut self, at: InsertPoint, state: OperationState) -> Result<OpId> {
        let (parent, position) = self.resolve_insert_point(at)?;
        for &operand in &state.operands {
            self.check_value(operand)?;
        }
        for &region in &state.regions {
            let owner = self.region(region)?.owner;
            ensure!(owner.is_none(), RegionAlreadyAttachedSnafu { region });
        }

        let id = OpId(self.ops.len() as u32);
        let results = state
            .result_types
            .into_iter()
            .enumerate()
            .map(|(index, ty)| self.alloc_value(ty, ValueDef::Result { op: id, index }))
            .collect();
        for (operand, &value) in state.operands.iter().enumerate() {
            self.values[value.index()].uses.push(Use { op: id, operand });
        }
        for &region in &state.regions {
            self.regions[region.index()].owner = Some(RegionOwner::Op(id));
        }

        self.ops.push(Some(Operation {
            kind: state.kind,
            operands: state.operands,
            results,
            attrs: state.attrs,
            regions: state.regions,
            parent,
        }));
        self.regions[parent.index()].ops.insert(position, id);
        Ok(id)
    }

    pub fn is_live(&self, op: OpId) -> bool {
        matches!(self.ops.get(op.index()), Some(Some(_)))
    }

    pub fn op(&self, op: OpId) -> Result<&Operation> {
        self.ops.get(op.index()).and_then(Option::as_ref).context(DeadOperationSnafu { op })
    }

    pub fn kind(&self, op: OpId) -> Option<OpKind> {
        self.op(op).ok().map(Operation::kind)
    }

    pub fn set_attr(&mut self, op: OpId, name: impl Into<String>, value: impl Into<Attribute>) -> Result<()> {
        self.op_mut(op)?.attrs.insert(name.into(), value.into());
        Ok(())
    }

    /// Operation owning the region that contains `op`, if any.
    pub fn parent_op(&self, op: OpId) -> Result<Option<OpId>> {
        let parent = self.op(op)?.parent;
        Ok(self.region(parent)?.parent_op())
    }

    /// Rewire one operand slot of `op` to `value`.
    pub fn set_operand(&mut self, op: OpId, index: usize, value: ValueId) -> Result<()> {
        self.check_value(value)?;
        let operation = self.op(op)?;
        let count = operation.operands.len();
        let old = *operation.operands.get(index).context(OperandOutOfRangeSnafu { op, index, count })?;
        self.remove_use(old, Use { op, operand: index });
        self.values[value.index()].uses.push(Use { op, operand: index });
        self.op_mut(op)?.operands[index] = value;
        Ok(())
    }

    /// Erase `op` together with everything nested in its regions.
    ///
    /// Fails when a result of `op` is still read by an operation outside of it.
    pub fn erase_op(&mut self, op: OpId) -> Result<()> {
        let operation = self.op(op)?;
        for &value in &operation.results {
            let uses = self.values[value.index()].uses.len();
            ensure!(uses == 0, ResultStillInUseSnafu { op, value, uses });
        }
        let parent = operation.parent;
        self.regions[parent.index()].ops.retain(|&o| o != op);
        self.erase_unchecked(op);
        Ok(())
    }

    /// Move every region of `from` to `to`, appending after the regions `to` already owns.
    pub fn take_regions(&mut self, from: OpId, to: OpId) -> Result<()> {
        self.op(to)?;
        let regions = std::mem::take(&mut self.op_mut(from)?.regions);
        for &region in &regions {
            self.regions[region.index()].owner = Some(RegionOwner::Op(to));
        }
        self.op_mut(to)?.regions.extend(regions);
        Ok(())
    }

    // =========================================================================
    // Values
    // =========================================================================

    pub fn value_type(&self, value: ValueId) -> Result<&TensorType> {
        Ok(&self.value_data(value)?.ty)
    }

    /// Change the type of a value in place (used to retype region arguments).
    pub fn set_value_type(&mut self, value: ValueId, ty: TensorType) -> Result<()> {
        self.value_data(value)?;
        self.values[value.index()].ty = ty;
        Ok(())
    }

    pub fn value_def(&self, value: ValueId) -> Result<ValueDef> {
        Ok(self.value_data(value)?.def)
    }

    /// Operation producing `value`, `None` for region arguments.
    pub fn defining_op(&self, value: ValueId) -> Option<OpId> {
        match self.values.get(value.index())?.def {
            ValueDef::Result { op, .. } if self.is_live(op) => Some(op),
            _ => None,
        }
    }

    /// Operation producing `value` when it has the given kind.
    pub fn defining_op_of_kind(&self, value: ValueId, kind: OpKind) -> Option<OpId> {
        self.defining_op(value).filter(|&op| self.kind(op) == Some(kind))
    }

    pub fn uses(&self, value: ValueId) -> &[Use] {
        self.values.get(value.index()).map(|v| v.uses.as_slice()).unwrap_or_default()
    }

    /// Distinct operations reading `value`, in use order.
    pub fn users(&self, value: ValueId) -> Vec<OpId> {
        let mut users: Vec<OpId> = Vec::new();
        for u in self.uses(value) {
            if !users.contains(&u.op) {
                users.push(u.op);
            }
        }
        users
    }

    pub fn has_one_use(&self, value: ValueId) -> bool {
        self.uses(value).len() == 1
    }

    pub fn is_unused(&self, value: ValueId) -> bool {
        self.uses(value).is_empty()
    }

    /// Make every reader of `from` read `to` instead.
    pub fn replace_all_uses(&mut self, from: ValueId, to: ValueId) -> Result<()> {
        self.replace_uses_where(from, to, |_| true)
    }

    /// Like [`Module::replace_all_uses`], but leaves the operand slots of `except` untouched.
    pub fn replace_all_uses_except(&mut self, from: ValueId, to: ValueId, except: OpId) -> Result<()> {
        self.replace_uses_where(from, to, |u| u.op != except)
    }

    fn replace_uses_where(&mut self, from: ValueId, to: ValueId, keep: impl Fn(&Use) -> bool) -> Result<()> {
        self.check_value(from)?;
        self.check_value(to)?;
        if from == to {
            return Ok(());
        }
        let (moved, kept): (SmallVec<[Use; 2]>, SmallVec<[Use; 2]>) =
            self.values[from.index()].uses.iter().copied().partition(|u| keep(u));
        self.values[from.index()].uses = kept;
        for u in &moved {
            if let Some(Some(op)) = self.ops.get_mut(u.op.index()) {
                op.operands[u.operand] = to;
            }
        }
        self.values[to.index()].uses.extend(moved);
        Ok(())
    }

    // =========================================================================
    // Traversal
    // =========================================================================

    /// Every live operation, pre-order: functions in order, nested regions right after their owner.
    pub fn walk(&self) -> Vec<OpId> {
        let mut out = Vec::new();
        for function in &self.functions {
            self.walk_region_into(function.body, &mut out);
        }
        out
    }

    /// Operations of `region` and of its nested regions, pre-order.
    pub fn walk_region(&self, region: RegionId) -> Vec<OpId> {
        let mut out = Vec::new();
        self.walk_region_into(region, &mut out);
        out
    }

    fn walk_region_into(&self, region: RegionId, out: &mut Vec<OpId>) {
        let Some(region) = self.regions.get(region.index()) else {
            return;
        };
        for &op in &region.ops {
            out.push(op);
            if let Ok(operation) = self.op(op) {
                for &nested in &operation.regions {
                    self.walk_region_into(nested, out);
                }
            }
        }
    }

    /// Number of live operations of `kind` anywhere in the module.
    pub fn count(&self, kind: OpKind) -> usize {
        self.walk().into_iter().filter(|&op| self.kind(op) == Some(kind)).count()
    }

    // =========================================================================
    // Diagnostics
    // =========================================================================

    pub fn emit(&mut self, diagnostic: Diagnostic) {
        self.diagnostics.push(diagnostic);
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    // =========================================================================
    // Internals
    // =========================================================================

    fn alloc_value(&mut self, ty: TensorType, def: ValueDef) -> ValueId {
        let id = ValueId(self.values.len() as u32);
        self.values.push(ValueData { ty, def, uses: SmallVec::new() });
        id
    }

    fn value_data(&self, value: ValueId) -> Result<&ValueData> {
        self.values.get(value.index()).context(UnknownValueSnafu { value })
    }

    fn check_value(&self, value: ValueId) -> Result<()> {
        match self.value_data(value)?.def {
            ValueDef::Result { op, .. } => ensure!(self.is_live(op), DeadValueSnafu { value }),
            ValueDef::Argument { region, .. } => {
                self.region(region)?;
            }
        }
        Ok(())
    }

    fn op_mut(&mut self, op: OpId) -> Result<&mut Operation> {
        self.ops.get_mut(op.index()).and_then(Option::as_mut).context(DeadOperationSnafu { op })
    }

    fn resolve_insert_point(&self, at: InsertPoint) -> Result<(RegionId, usize)> {
        match at {
            InsertPoint::End(region) => Ok((region, self.region(region)?.ops.len())),
            InsertPoint::Start(region) => {
                self.region(region)?;
                Ok((region, 0))
            }
            InsertPoint::Before(anchor) => {
                let parent = self.op(anchor)?.parent;
                let position = self.regions[parent.index()].ops.iter().position(|&o| o == anchor).unwrap_or(0);
                Ok((parent, position))
            }
        }
    }

    fn remove_use(&mut self, value: ValueId, u: Use) {
        if let Some(data) = self.values.get_mut(value.index())
            && let Some(pos) = data.uses.iter().position(|x| *x == u)
        {
            data.uses.remove(pos);
        }
    }

    /// Tombstone `op` and its nested operations, dropping the uses they hold.
    /// The caller has already detached `op` from its parent region.
    fn erase_unchecked(&mut self, op: OpId) {
        let Some(operation) = self.ops.get_mut(op.index()).and_then(Option::take) else {
            return;
        };
        for &region in &operation.regions {
            let nested = std::mem::take(&mut self.regions[region.index()].ops);
            // Users before producers.
            for &inner in nested.iter().rev() {
                self.erase_unchecked(inner);
            }
        }
        for (operand, &value) in operation.operands.iter().enumerate() {
            self.remove_use(value, Use { op, operand });
        }
    }
}
