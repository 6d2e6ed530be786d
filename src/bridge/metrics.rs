//! Atomic, snapshot-readable bridge metrics.

use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use serde::Serialize;

#[derive(Default)]
pub struct BridgeMetrics {
    pub orders_submitted: AtomicU64,
    pub orders_cancelled: AtomicU64,
    pub events_published: AtomicU64,
    pub order_queries: AtomicU64,
    pub market_snapshots: AtomicU64,
    latency_avg: Mutex<RunningAverage>,
}

/// Welford's online mean: numerically stable without needing the running
/// sum of samples.
#[derive(Default)]
struct RunningAverage {
    count: u64,
    mean_ns: f64,
}

impl RunningAverage {
    fn fold(&mut self, sample_ns: u64) {
        self.count += 1;
        let delta = sample_ns as f64 - self.mean_ns;
        self.mean_ns += delta / self.count as f64;
    }
}

impl BridgeMetrics {
    pub fn record_order_latency(&self, latency_ns: u64) {
        self.latency_avg.lock().fold(latency_ns);
    }

    pub fn avg_order_latency_ns(&self) -> f64 {
        self.latency_avg.lock().mean_ns
    }

    pub fn snapshot(&self, pool: &super::event::EventPool) -> BridgeMetricsSnapshot {
        BridgeMetricsSnapshot {
            orders_submitted: self.orders_submitted.load(Ordering::Acquire),
            orders_cancelled: self.orders_cancelled.load(Ordering::Acquire),
            events_published: self.events_published.load(Ordering::Acquire),
            order_queries: self.order_queries.load(Ordering::Acquire),
            market_snapshots: self.market_snapshots.load(Ordering::Acquire),
            avg_order_latency_ns: self.avg_order_latency_ns(),
            pool_allocated: pool.allocated(),
            pool_total_allocations: pool.total_allocations(),
            pool_heap_fallbacks: pool.heap_fallbacks(),
        }
    }

    /// Each counter resets independently; a concurrent reader may observe
    /// a mix of reset and not-yet-reset counters. Acceptable per the
    /// metrics contract.
    pub fn reset(&self) {
        self.orders_submitted.store(0, Ordering::Relaxed);
        self.orders_cancelled.store(0, Ordering::Relaxed);
        self.events_published.store(0, Ordering::Relaxed);
        self.order_queries.store(0, Ordering::Relaxed);
        self.market_snapshots.store(0, Ordering::Relaxed);
        *self.latency_avg.lock() = RunningAverage::default();
    }
}

#[derive(Debug, Clone, Copy, Serialize, Default)]
pub struct BridgeMetricsSnapshot {
    pub orders_submitted: u64,
    pub orders_cancelled: u64,
    pub events_published: u64,
    pub order_queries: u64,
    pub market_snapshots: u64,
    pub avg_order_latency_ns: f64,
    /// Event payload slots currently checked out of the pool.
    pub pool_allocated: u64,
    /// Total publishes served, pooled or not, since the pool was created.
    pub pool_total_allocations: u64,
    /// Publishes that found the free list empty and allocated fresh.
    pub pool_heap_fallbacks: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn running_average_converges_to_mean() {
        let metrics = BridgeMetrics::default();
        for sample in [10u64, 20, 30] {
            metrics.record_order_latency(sample);
        }
        assert!((metrics.avg_order_latency_ns() - 20.0).abs() < 1e-9);
    }
}
