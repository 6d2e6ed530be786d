//! Shared performance-measurement primitives used across the gateway.
//!
//! - Latency histograms for microsecond/millisecond percentile reporting.
//! - Queue depth/wait-time tracking for bounded channels on backpressure paths.

pub mod latency;
pub mod queues;

pub use latency::LatencyHistogram;
pub use queues::{global_queue_registry, QueueMetrics, QueueRegistry, QueueSnapshot, QueueWaitGuard};
