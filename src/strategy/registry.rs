//! Factory registration, instance lifecycle, and dispatch fan-out.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use rand::Rng;
use tracing::warn;

use crate::bridge::OrderIntent;
use crate::error::{GatewayError, GatewayResult};

use super::instance::StrategyInstance;
use super::metrics::AggregateMetrics;
use super::strategy_trait::StrategyFactory;
use super::types::{MarketEvent, PositionUpdate, SignalBatch, StrategyConfig};

pub type SignalCallback = Box<dyn Fn(SignalBatch) + Send + Sync + 'static>;

/// Owns the factory registry and the live instance table; strategies are
/// held by `Arc` so a concurrent `unload_strategy` racing a dispatch call
/// is safe — the dispatcher keeps its own clone alive for the call's
/// duration even if the registry entry is removed underneath it.
pub struct StrategyRegistry {
    factories: RwLock<HashMap<String, Box<dyn StrategyFactory>>>,
    instances: RwLock<HashMap<String, Arc<StrategyInstance>>>,
    signal_callback: Mutex<Option<SignalCallback>>,
}

impl Default for StrategyRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl StrategyRegistry {
    pub fn new() -> Self {
        Self {
            factories: RwLock::new(HashMap::new()),
            instances: RwLock::new(HashMap::new()),
            signal_callback: Mutex::new(None),
        }
    }

    pub fn register_factory(&self, type_name: impl Into<String>, factory: Box<dyn StrategyFactory>) {
        self.factories.write().insert(type_name.into(), factory);
    }

    pub fn set_signal_callback(&self, callback: SignalCallback) {
        *self.signal_callback.lock() = Some(callback);
    }

    /// Looks up the factory for `config.strategy_type`'s canonical name,
    /// constructs and starts the instance, and stores it under a fresh
    /// `strat-<random>` id. Returns an empty string if the factory is
    /// missing.
    pub fn load_strategy(&self, config: StrategyConfig) -> String {
        let type_name = config.strategy_type.canonical_name();
        let factories = self.factories.read();
        let factory = match factories.get(type_name) {
            Some(f) => f,
            None => {
                warn!(strategy_type = %type_name, "load_strategy: no factory registered");
                return String::new();
            }
        };

        let strategy = factory.create(&config);
        let id = generate_instance_id();
        let instance = Arc::new(StrategyInstance::new(id.clone(), config, strategy));
        instance.start();

        self.instances.write().insert(id.clone(), instance);
        id
    }

    /// Stops (idempotent) and removes the instance; the id becomes
    /// unknown to subsequent calls.
    pub fn unload_strategy(&self, id: &str) -> bool {
        let removed = self.instances.write().remove(id);
        if let Some(instance) = removed {
            instance.stop();
            true
        } else {
            false
        }
    }

    fn snapshot_instances(&self) -> Vec<Arc<StrategyInstance>> {
        self.instances.read().values().cloned().collect()
    }

    pub fn get_instance(&self, id: &str) -> Option<Arc<StrategyInstance>> {
        self.instances.read().get(id).cloned()
    }

    /// Dispatch is in-order within a strategy; across strategies the
    /// order is unspecified.
    pub fn on_market_event(&self, event: &MarketEvent, now_ns: u64) {
        for instance in self.snapshot_instances() {
            instance.dispatch_event(event, now_ns);
        }
    }

    pub fn on_position_update(&self, position: &PositionUpdate, now_ns: u64) {
        for instance in self.snapshot_instances() {
            instance.dispatch_position_update(position, now_ns);
        }
    }

    pub fn on_timer(&self, timestamp_ns: u64) {
        for instance in self.snapshot_instances() {
            instance.dispatch_timer(timestamp_ns);
        }
    }

    /// Drains every running instance's outbox, concatenates into one
    /// ordered batch, and invokes the registered signal callback. If no
    /// callback is registered the batch is dropped, counted per-strategy
    /// as `signals_dropped`.
    pub fn process_and_route_signals(&self) {
        let instances = self.snapshot_instances();
        let mut batch: Vec<OrderIntent> = Vec::new();
        let mut per_instance_counts: Vec<(Arc<StrategyInstance>, usize)> = Vec::new();

        for instance in instances {
            let signals = instance.drain_signals();
            let count = signals.len();
            batch.extend(signals);
            per_instance_counts.push((instance, count));
        }

        if batch.is_empty() {
            return;
        }

        let callback = self.signal_callback.lock();
        match callback.as_ref() {
            Some(cb) => cb(batch),
            None => {
                for (instance, count) in per_instance_counts {
                    if count > 0 {
                        instance.record_dropped_signals(count as u64);
                    }
                }
            }
        }
    }

    pub fn reload_parameters(&self, id: &str, params: &HashMap<String, f64>) -> GatewayResult<()> {
        let instance = self
            .instances
            .read()
            .get(id)
            .cloned()
            .ok_or_else(|| GatewayError::NotFound(format!("strategy {id}")))?;
        instance.reload_parameters(params)
    }

    pub fn get_metrics_summary(&self) -> AggregateMetrics {
        AggregateMetrics::fold(self.snapshot_instances().iter().map(|i| i.metrics()))
    }

    pub fn instance_count(&self) -> usize {
        self.instances.read().len()
    }
}

fn generate_instance_id() -> String {
    let suffix: u64 = rand::thread_rng().gen();
    format!("strat-{suffix:016x}")
}
