//! Ordered pattern registry of the quantize pass.

use quanta_ir::PatternSet;

use crate::patterns::MarkerPattern;
use crate::patterns::fused_gemm::populate_fused_gemm_patterns;
use crate::patterns::hybrid::populate_hybrid_patterns;
use crate::patterns::region::populate_region_patterns;
use crate::patterns::singular::populate_singular_patterns;
use crate::spec::{QuantPassSpec, QuantizationSpecs};

/// Build the pattern set in priority order.
///
/// 1. marker variants: standard, reversed, then weight-only when enabled
/// 2. hybrid-op lowering (weight-only mode only)
/// 3. op-with-region patterns
/// 4. fused gemm lowering
/// 5. singular-op patterns
pub fn build_patterns(specs: &QuantizationSpecs) -> PatternSet<QuantPassSpec> {
    let mut set = PatternSet::new();
    MarkerPattern::standard().register(&mut set);
    MarkerPattern::reversed().register(&mut set);
    if specs.enable_weight_only {
        MarkerPattern::weight_only().register(&mut set);
        populate_hybrid_patterns(&mut set);
    }
    populate_region_patterns(&mut set);
    populate_fused_gemm_patterns(&mut set);
    populate_singular_patterns(&mut set);
    set
}
