//! Property-based tests for the IR.
//!
//! Uses proptest to verify invariants of the arena and the rewrite driver.
