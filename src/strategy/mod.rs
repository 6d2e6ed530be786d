//! Pluggable, hot-reloadable signal-generating strategies.
//!
//! The registry owns factory registration and instance lifecycle; the
//! dispatcher fans market/position/timer events into every running
//! instance and routes collected signals to a caller-supplied callback.

mod builtin;
mod instance;
mod metrics;
mod ring_buffer;
mod registry;
mod strategy_trait;
mod types;

pub use builtin::{MovingAverageCrossoverFactory, MovingAverageCrossoverStrategy};
pub use instance::StrategyInstance;
pub use metrics::{AggregateMetrics, StrategyMetricsSnapshot};
pub use registry::{SignalCallback, StrategyRegistry};
pub use strategy_trait::{Strategy, StrategyFactory};
pub use types::{
    MarketEvent, PositionUpdate, RiskCaps, SignalBatch, StrategyConfig, StrategyType,
};

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn config_with(short: f64, long: f64) -> StrategyConfig {
        let mut params = HashMap::new();
        params.insert("short_period".to_string(), short);
        params.insert("long_period".to_string(), long);
        StrategyConfig::new("ma-cross", StrategyType::TrendFollowing)
            .with_symbols(vec!["BTCUSDT".to_string()])
            .with_parameters(params)
    }

    fn registry_with_builtin() -> StrategyRegistry {
        let registry = StrategyRegistry::new();
        registry.register_factory(
            StrategyType::TrendFollowing.canonical_name(),
            Box::new(MovingAverageCrossoverFactory),
        );
        registry
    }

    #[test]
    fn load_strategy_returns_empty_string_for_unknown_type() {
        let registry = StrategyRegistry::new();
        let id = registry.load_strategy(config_with(10.0, 20.0));
        assert!(id.is_empty());
    }

    #[test]
    fn load_and_unload_strategy_round_trips() {
        let registry = registry_with_builtin();
        let id = registry.load_strategy(config_with(10.0, 20.0));
        assert!(!id.is_empty());
        assert_eq!(registry.instance_count(), 1);
        assert!(registry.unload_strategy(&id));
        assert_eq!(registry.instance_count(), 0);
        assert!(!registry.unload_strategy(&id));
    }

    #[test]
    fn hot_reload_changes_parameters_and_is_reported_via_signature() {
        let registry = registry_with_builtin();
        let id = registry.load_strategy(config_with(10.0, 20.0));

        let mut new_params = HashMap::new();
        new_params.insert("short_period".to_string(), 15.0);
        new_params.insert("long_period".to_string(), 30.0);
        assert!(registry.reload_parameters(&id, &new_params).is_ok());

        let unknown_err = registry.reload_parameters("strat-does-not-exist", &new_params);
        assert!(unknown_err.is_err());
    }

    #[test]
    fn market_events_increment_events_processed_and_generate_signals_on_crossover() {
        let registry = registry_with_builtin();
        let id = registry.load_strategy(config_with(2.0, 3.0));
        let instance = registry.get_instance(&id).unwrap();

        let prices = [1.0, 1.0, 1.0, 5.0, 5.0, 5.0];
        for (i, price) in prices.iter().enumerate() {
            registry.on_market_event(
                &MarketEvent {
                    symbol: "BTCUSDT".to_string(),
                    price: *price,
                    timestamp_ns: i as u64,
                    is_candle_closed: true,
                },
                i as u64,
            );
        }

        assert_eq!(instance.metrics().events_processed as usize, prices.len());

        let received = Arc::new(AtomicUsize::new(0));
        let received_clone = Arc::clone(&received);
        registry.set_signal_callback(Box::new(move |batch| {
            received_clone.fetch_add(batch.len(), Ordering::SeqCst);
        }));
        registry.process_and_route_signals();
        assert!(received.load(Ordering::SeqCst) > 0);
    }

    #[test]
    fn signals_are_dropped_and_counted_when_no_callback_registered() {
        let registry = registry_with_builtin();
        let id = registry.load_strategy(config_with(2.0, 3.0));
        let instance = registry.get_instance(&id).unwrap();

        for (i, price) in [1.0, 1.0, 1.0, 5.0, 5.0, 5.0].iter().enumerate() {
            registry.on_market_event(
                &MarketEvent {
                    symbol: "BTCUSDT".to_string(),
                    price: *price,
                    timestamp_ns: i as u64,
                    is_candle_closed: true,
                },
                i as u64,
            );
        }
        registry.process_and_route_signals();
        assert!(instance.metrics().signals_dropped > 0);
    }

    #[test]
    fn unloaded_instance_ignores_further_dispatch() {
        let registry = registry_with_builtin();
        let id = registry.load_strategy(config_with(2.0, 3.0));
        registry.unload_strategy(&id);

        registry.on_market_event(
            &MarketEvent {
                symbol: "BTCUSDT".to_string(),
                price: 100.0,
                timestamp_ns: 0,
                is_candle_closed: true,
            },
            0,
        );
        assert!(registry.get_instance(&id).is_none());
    }
}
