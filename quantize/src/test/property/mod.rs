//! Property-based tests for the quantize pass.
//!
//! Random elementwise graphs with randomly placed marker pairs check that the
//! pass converges, never invents markers and reaches a fixpoint.

#[cfg(test)]
mod pass_props;
