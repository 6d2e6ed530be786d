//! Per-strategy-instance atomic metrics.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

#[derive(Default)]
pub struct StrategyMetrics {
    pub events_processed: AtomicU64,
    pub signals_generated: AtomicU64,
    pub signals_dropped: AtomicU64,
    pub errors: AtomicU64,
    pub cumulative_execution_time_ns: AtomicU64,
    pub max_execution_time_ns: AtomicU64,
    pub last_event_time_ns: AtomicU64,
}

impl StrategyMetrics {
    pub fn record_dispatch(&self, execution_time_ns: u64, event_time_ns: u64) {
        self.events_processed.fetch_add(1, Ordering::Relaxed);
        self.cumulative_execution_time_ns
            .fetch_add(execution_time_ns, Ordering::Relaxed);
        self.max_execution_time_ns
            .fetch_max(execution_time_ns, Ordering::Relaxed);
        self.last_event_time_ns.store(event_time_ns, Ordering::Relaxed);
    }

    pub fn record_signals(&self, count: u64) {
        self.signals_generated.fetch_add(count, Ordering::Relaxed);
    }

    pub fn record_dropped_signals(&self, count: u64) {
        self.signals_dropped.fetch_add(count, Ordering::Relaxed);
    }

    pub fn record_error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StrategyMetricsSnapshot {
        StrategyMetricsSnapshot {
            events_processed: self.events_processed.load(Ordering::Acquire),
            signals_generated: self.signals_generated.load(Ordering::Acquire),
            signals_dropped: self.signals_dropped.load(Ordering::Acquire),
            errors: self.errors.load(Ordering::Acquire),
            cumulative_execution_time_ns: self.cumulative_execution_time_ns.load(Ordering::Acquire),
            max_execution_time_ns: self.max_execution_time_ns.load(Ordering::Acquire),
            last_event_time_ns: self.last_event_time_ns.load(Ordering::Acquire),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct StrategyMetricsSnapshot {
    pub events_processed: u64,
    pub signals_generated: u64,
    pub signals_dropped: u64,
    pub errors: u64,
    pub cumulative_execution_time_ns: u64,
    pub max_execution_time_ns: u64,
    pub last_event_time_ns: u64,
}

/// Aggregates per-instance snapshots across the whole registry.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct AggregateMetrics {
    pub instance_count: usize,
    pub events_processed: u64,
    pub signals_generated: u64,
    pub signals_dropped: u64,
    pub errors: u64,
}

impl AggregateMetrics {
    pub fn fold(instances: impl Iterator<Item = StrategyMetricsSnapshot>) -> Self {
        let mut agg = Self::default();
        for snapshot in instances {
            agg.instance_count += 1;
            agg.events_processed += snapshot.events_processed;
            agg.signals_generated += snapshot.signals_generated;
            agg.signals_dropped += snapshot.signals_dropped;
            agg.errors += snapshot.errors;
        }
        agg
    }
}
