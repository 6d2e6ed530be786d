//! A running (or stopped) strategy, owned by the registry behind an `Arc`
//! so a concurrent `unload_strategy` racing a dispatch cycle is safe: the
//! dispatcher holds its own clone for the duration of the call.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use tracing::warn;

use crate::bridge::OrderIntent;
use crate::error::{GatewayError, GatewayResult};

use super::metrics::{StrategyMetrics, StrategyMetricsSnapshot};
use super::strategy_trait::Strategy;
use super::types::{MarketEvent, PositionUpdate, StrategyConfig};

/// Dispatches slower than this are logged; the framework never preempts
/// a strategy, so a slow handler only shows up here, not as an error.
const SLOW_DISPATCH_THRESHOLD_NS: u64 = 1_000_000;

pub struct StrategyInstance {
    pub id: String,
    pub config: StrategyConfig,
    running: AtomicBool,
    metrics: StrategyMetrics,
    inner: Mutex<Box<dyn Strategy>>,
}

impl StrategyInstance {
    pub fn new(id: String, config: StrategyConfig, strategy: Box<dyn Strategy>) -> Self {
        Self {
            id,
            config,
            running: AtomicBool::new(false),
            metrics: StrategyMetrics::default(),
            inner: Mutex::new(strategy),
        }
    }

    pub fn start(&self) {
        self.running.store(true, Ordering::Release);
    }

    /// Idempotent.
    pub fn stop(&self) {
        self.running.store(false, Ordering::Release);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// A stopped instance ignores the event entirely (no metric change).
    pub fn dispatch_event(&self, event: &MarketEvent, now_ns: u64) {
        if !self.is_running() {
            return;
        }
        let start = std::time::Instant::now();
        {
            let mut strategy = self.inner.lock();
            strategy.on_event(event);
        }
        let elapsed_ns = start.elapsed().as_nanos() as u64;
        if elapsed_ns > SLOW_DISPATCH_THRESHOLD_NS {
            warn!(strategy_id = %self.id, elapsed_ns, "slow on_event dispatch");
        }
        self.metrics.record_dispatch(elapsed_ns, now_ns);
    }

    pub fn dispatch_timer(&self, timestamp_ns: u64) {
        if !self.is_running() {
            return;
        }
        let start = std::time::Instant::now();
        {
            let mut strategy = self.inner.lock();
            strategy.on_timer(timestamp_ns);
        }
        self.metrics
            .record_dispatch(start.elapsed().as_nanos() as u64, timestamp_ns);
    }

    pub fn dispatch_position_update(&self, position: &PositionUpdate, now_ns: u64) {
        if !self.is_running() {
            return;
        }
        let start = std::time::Instant::now();
        {
            let mut strategy = self.inner.lock();
            strategy.on_position_update(position);
        }
        self.metrics
            .record_dispatch(start.elapsed().as_nanos() as u64, now_ns);
    }

    pub fn notify_order_rejected(&self, request: &OrderIntent, reason: &str) {
        self.inner.lock().on_order_rejected(request, reason);
    }

    /// Drains the strategy's pending-signal outbox; counts the drained
    /// batch into `signals_generated`.
    pub fn drain_signals(&self) -> Vec<OrderIntent> {
        let signals = self.inner.lock().get_signals();
        if !signals.is_empty() {
            self.metrics.record_signals(signals.len() as u64);
        }
        signals
    }

    pub fn record_error(&self) {
        self.metrics.record_error();
    }

    pub fn record_dropped_signals(&self, count: u64) {
        self.metrics.record_dropped_signals(count);
    }

    pub fn reset(&self) {
        self.inner.lock().reset();
    }

    pub fn supports_hot_reload(&self) -> bool {
        self.inner.lock().supports_hot_reload()
    }

    pub fn reload_parameters(&self, params: &HashMap<String, f64>) -> GatewayResult<()> {
        if !self.supports_hot_reload() {
            return Err(GatewayError::Unsupported(format!(
                "strategy {} does not support hot-reload",
                self.id
            )));
        }
        let mut strategy = self.inner.lock();
        if strategy.update_parameters(params) {
            Ok(())
        } else {
            Err(GatewayError::Unsupported(format!(
                "strategy {} rejected parameter update",
                self.id
            )))
        }
    }

    pub fn metrics(&self) -> StrategyMetricsSnapshot {
        self.metrics.snapshot()
    }
}
