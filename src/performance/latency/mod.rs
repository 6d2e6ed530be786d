//! Latency measurement primitives shared by the bridge and audit pipeline.

pub mod histogram;

pub use histogram::{CdfPoint, HistogramSummary, LatencyHistogram};
