//! The contract every strategy factory builds against.

use std::collections::HashMap;

use crate::bridge::OrderIntent;
use crate::strategy::metrics::StrategyMetricsSnapshot;
use crate::strategy::types::{MarketEvent, PositionUpdate, StrategyType};

/// Implemented by every strategy instance a factory constructs. The
/// framework never inspects internal state directly — only through this
/// interface and the pending-signal outbox it drains via `get_signals`.
pub trait Strategy: Send + Sync {
    fn get_type(&self) -> StrategyType;

    /// The dispatcher increments `events_processed` around this call and
    /// `signals_generated` when the outbox is drained; implementations
    /// only need to call `StrategyInstance::record_error` on their own
    /// failure paths. Must not block.
    fn on_event(&mut self, event: &MarketEvent);

    fn on_timer(&mut self, timestamp_ns: u64);

    fn on_position_update(&mut self, position: &PositionUpdate);

    /// Destructive read: moves the outbox out, leaving it empty.
    fn get_signals(&mut self) -> Vec<OrderIntent>;

    /// Clears transient state (ring buffers, pending signals) without
    /// unloading the instance.
    fn reset(&mut self);

    fn supports_hot_reload(&self) -> bool {
        false
    }

    /// Fails (returns `false`) when `supports_hot_reload()` is `false`.
    /// Applies only to subsequent events; already-queued signals retain
    /// their old parameters.
    fn update_parameters(&mut self, _params: &HashMap<String, f64>) -> bool {
        false
    }

    fn get_metrics(&self) -> Option<StrategyMetricsSnapshot> {
        None
    }

    /// Opt-in self-healing hook, e.g. resetting an in-position flag when
    /// risk refuses an entry the strategy thought had gone through.
    fn on_order_rejected(&mut self, _request: &OrderIntent, _reason: &str) {}
}

/// Constructs a boxed strategy instance from a config. Registered under a
/// unique type name in the [`crate::strategy::StrategyRegistry`].
pub trait StrategyFactory: Send + Sync {
    fn create(&self, config: &crate::strategy::types::StrategyConfig) -> Box<dyn Strategy>;
}
