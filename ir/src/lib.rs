//! Intermediate Representation (IR) for the quanta quantization pipeline.
//!
//! The IR is an arena of operations grouped into regions. Operations refer to
//! their operands, results and nested regions through copyable handles, so
//! rewrites can erase and create operations while a driver keeps iterating
//! over handles it collected earlier.
//!
//! # Module Organization
//!
//! - [`module`] - Arena owning functions, regions, operations and values
//! - [`op`] - Operation kinds and [`OperationState`] descriptions
//! - [`types`] - Attribute values and well-known attribute names
//! - [`builder`] - [`FuncBuilder`] for constructing graphs
//! - [`marker`] - Quantize/dequantize boundary markers and their verification
//! - [`pattern`] - Rules, ordered pattern sets and the [`Rewriter`]
//! - [`rewrite`] - Greedy fixed-point driver
//! - [`diagnostic`] - Messages attached to a module by passes
//! - [`error`] - Error types and result handling

pub mod builder;
pub mod debug;
pub mod diagnostic;
pub mod error;
pub mod marker;
pub mod module;
pub mod op;
pub mod pattern;
pub mod rewrite;
pub mod types;


pub use builder::FuncBuilder;
pub use diagnostic::{Diagnostic, Severity};
pub use error::{Error, Result};
pub use marker::{MarkerKind, marker_kind, marker_quantized_type, verify_markers};
pub use module::{Function, InsertPoint, Module, OpId, Region, RegionId, Use, ValueDef, ValueId};
pub use op::{OpKind, Operation, OperationState};
pub use types::{ATTR_ENTRY_FUNCTION, ATTR_QUANT_TRAIT, ATTR_VALUE, Attribute, Attributes, DenseElements};

pub use pattern::{PatternSet, RewriteResult, Rewriter};
pub use rewrite::{Convergence, GreedyRewriteConfig, RewriteStats, apply_patterns_greedily};

// Re-export external types for convenience
pub use quanta_dtype::{ElementType, ScalarDType, TensorType, UniformQuantizedType};
