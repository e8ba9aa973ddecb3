//! Metrics recorded through the `metrics` facade
//!
//! Nothing here installs a recorder; without one every call is a no-op.

pub mod counters;
pub mod histograms;
pub mod labels;
