//! Marker-driven quantization rewrites.
//!
//! Upstream calibration leaves `quant.qcast`/`quant.dcast` marker pairs around
//! the tensors it decided to quantize. The [`QuantizePass`] consumes those
//! markers: every op whose operands and results are bracketed by markers is
//! re-created with quantized types, the absorbed markers disappear, and a
//! few follow-up lowerings rewrite call bodies into integer arithmetic.
//!
//! ```ignore
//! let options = QuantizePassOptions::from_env()?;
//! let outcome = QuantizePass::new(&options).run(&mut module);
//! assert!(outcome.converged());
//! ```
//!
//! # Module Organization
//!
//! - [`spec`] - Read-only quantization settings shared by all patterns
//! - [`options`] - User-facing pass options (builder and environment)
//! - [`quantizable`] - Which ops may run on quantized values
//! - [`patterns`] - The rewrite pattern families
//! - [`registry`] - Ordered assembly of the pattern set
//! - [`pass`] - The pass entry point
//! - [`error`] - Configuration errors

pub mod error;
pub mod options;
pub mod pass;
pub mod patterns;
pub mod quantizable;
pub mod registry;
pub mod spec;


pub use error::{Error, Result};
pub use options::QuantizePassOptions;
pub use pass::{CONVERGENCE_WARNING, PassOutcome, QuantizePass};
pub use quantizable::{FULLY_QUANTIZABLE, QuantSemantics, is_quantizable, semantics_of};
pub use registry::build_patterns;
pub use spec::{InferenceType, NumericVerifySpec, QuantPassSpec, QuantizationSpecs};
