//! In-process async bridge between the HTTP gateway and the matching
//! engine: order/cancel submission, state reads, event pub/sub, metrics.

mod adapter;
mod event;
mod metrics;
mod subscription;
mod types;

pub use adapter::{AdapterAck, EngineAdapter, PaperEngineAdapter};
pub use event::{BridgeEvent, EventPayload, EventPool, EventType};
pub use metrics::BridgeMetricsSnapshot;
pub use subscription::EventCallback;
pub use types::{
    AccountState, MarketSnapshot, Order, OrderIntent, OrderSide, OrderStatus, OrderType, Position,
    TimeInForce,
};

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use quanta::Instant;
use tracing::{info, warn};

use crate::config::BridgeConfig;
use crate::error::{GatewayError, GatewayResult};
use metrics::BridgeMetrics;
use subscription::{dispatch, SubscriptionTable};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
enum LifecycleState {
    Idle = 0,
    Initialized = 1,
    Running = 2,
    Stopped = 3,
}

impl LifecycleState {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => Self::Idle,
            1 => Self::Initialized,
            2 => Self::Running,
            _ => Self::Stopped,
        }
    }
}

/// The subscription lane depth for each new subscriber.
const DEFAULT_LANE_CAPACITY: usize = 1024;

pub struct Bridge {
    state: AtomicU8,
    adapter: Arc<dyn EngineAdapter>,
    pool: Arc<EventPool>,
    subscriptions: SubscriptionTable,
    metrics: BridgeMetrics,
    config: BridgeConfig,
    // Guards the `initialize`/`start`/`stop` transitions so two callers
    // racing a lifecycle change observe a consistent state.
    lifecycle_lock: Mutex<()>,
}

impl Bridge {
    pub fn new(config: BridgeConfig, adapter: Arc<dyn EngineAdapter>) -> Self {
        let pool = Arc::new(EventPool::new(config.event_queue_capacity));
        let max_subscriptions = config.max_subscriptions;
        Self {
            state: AtomicU8::new(LifecycleState::Idle as u8),
            adapter,
            pool,
            subscriptions: SubscriptionTable::new(max_subscriptions),
            metrics: BridgeMetrics::default(),
            config,
            lifecycle_lock: Mutex::new(()),
        }
    }

    fn state(&self) -> LifecycleState {
        LifecycleState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Wires up internal state. The ambient async I/O context itself
    /// (tokio runtime, socket acceptors) is supplied by the HTTP layer and
    /// is out of scope here; calling from within a tokio runtime is the
    /// only requirement.
    pub fn initialize(&self) -> GatewayResult<()> {
        let _guard = self.lifecycle_lock.lock();
        if self.state() != LifecycleState::Idle {
            return Err(GatewayError::AlreadyRunning);
        }
        self.state
            .store(LifecycleState::Initialized as u8, Ordering::Release);
        Ok(())
    }

    pub fn start(&self) -> GatewayResult<()> {
        let _guard = self.lifecycle_lock.lock();
        match self.state() {
            LifecycleState::Running => return Err(GatewayError::AlreadyRunning),
            LifecycleState::Idle => return Err(GatewayError::NotRunning),
            _ => {}
        }
        self.state
            .store(LifecycleState::Running as u8, Ordering::Release);
        info!("bridge started");
        Ok(())
    }

    /// Idempotent: a second call is a no-op. Cancels all subscriptions and
    /// drains in-flight delivery before returning.
    pub fn stop(&self) {
        let _guard = self.lifecycle_lock.lock();
        if self.state() == LifecycleState::Stopped {
            return;
        }
        self.subscriptions.unsubscribe_all();
        self.state
            .store(LifecycleState::Stopped as u8, Ordering::Release);
        info!("bridge stopped");
    }

    fn require_running(&self) -> GatewayResult<()> {
        if self.state() != LifecycleState::Running {
            Err(GatewayError::NotRunning)
        } else {
            Ok(())
        }
    }

    /// Validation order: side, then symbol, then quantity, then client_id.
    /// No state changes or metric increments occur before every check
    /// passes.
    pub async fn place_order(
        &self,
        side: &str,
        symbol: &str,
        quantity: f64,
        price: f64,
        client_id: &str,
    ) -> GatewayResult<AdapterAck> {
        self.require_running()?;

        let side = OrderSide::parse(side)
            .ok_or_else(|| GatewayError::InvalidInput("side must be buy or sell".into()))?;
        if symbol.trim().is_empty() {
            return Err(GatewayError::InvalidInput("symbol must not be empty".into()));
        }
        if !(quantity > 0.0) {
            return Err(GatewayError::InvalidInput("quantity must be positive".into()));
        }
        if client_id.trim().is_empty() {
            return Err(GatewayError::InvalidInput("client_id must not be empty".into()));
        }

        let intent = OrderIntent {
            symbol: symbol.to_string(),
            side,
            quantity,
            price,
            order_type: if price > 0.0 { OrderType::Limit } else { OrderType::Market },
            time_in_force: TimeInForce::Gtc,
            strategy_id: None,
        };

        let start = Instant::now();
        let ack = self.adapter.submit_order(&intent, client_id).await.map_err(|e| {
            warn!(client_id, error = %e, "adapter rejected order");
            e
        })?;
        let latency_ns = start.elapsed().as_nanos() as u64;

        self.metrics.orders_submitted.fetch_add(1, Ordering::Relaxed);
        self.metrics.record_order_latency(latency_ns);

        self.publish(EventPayload::OrderUpdate {
            client_id: client_id.to_string(),
            symbol: symbol.to_string(),
            side,
            quantity,
            price,
            cancelled: false,
        });

        Ok(ack)
    }

    pub async fn cancel_order(&self, client_id: &str) -> GatewayResult<()> {
        self.require_running()?;
        if client_id.trim().is_empty() {
            return Err(GatewayError::InvalidInput("client_id must not be empty".into()));
        }

        self.adapter.cancel_order(client_id).await?;
        self.metrics.orders_cancelled.fetch_add(1, Ordering::Relaxed);

        let order = self.adapter.get_order(client_id);
        self.publish(EventPayload::OrderUpdate {
            client_id: client_id.to_string(),
            symbol: order.as_ref().map(|o| o.symbol.clone()).unwrap_or_default(),
            side: order.as_ref().map(|o| o.side).unwrap_or(OrderSide::Buy),
            quantity: order.as_ref().map(|o| o.quantity).unwrap_or(0.0),
            price: order.as_ref().map(|o| o.price).unwrap_or(0.0),
            cancelled: true,
        });

        Ok(())
    }

    pub fn get_order(&self, client_id: &str) -> Option<Order> {
        self.metrics.order_queries.fetch_add(1, Ordering::Relaxed);
        self.adapter.get_order(client_id)
    }

    pub fn get_orders(&self) -> Vec<Order> {
        self.metrics.order_queries.fetch_add(1, Ordering::Relaxed);
        self.adapter.get_orders()
    }

    pub fn get_pending_orders(&self) -> Vec<Order> {
        self.metrics.order_queries.fetch_add(1, Ordering::Relaxed);
        self.adapter.get_pending_orders()
    }

    pub fn get_market_snapshot(&self, symbol: &str) -> Option<MarketSnapshot> {
        self.metrics.market_snapshots.fetch_add(1, Ordering::Relaxed);
        self.adapter.get_market_snapshot(symbol)
    }

    /// Returns results in the same order as `symbols`.
    pub fn get_market_snapshots(&self, symbols: &[&str]) -> Vec<Option<MarketSnapshot>> {
        self.metrics.market_snapshots.fetch_add(1, Ordering::Relaxed);
        symbols.iter().map(|s| self.adapter.get_market_snapshot(s)).collect()
    }

    pub fn get_account_state(&self) -> AccountState {
        self.adapter.get_account_state()
    }

    pub fn get_positions(&self) -> Vec<Position> {
        self.adapter.get_positions()
    }

    pub fn get_position(&self, symbol: &str) -> Option<Position> {
        self.adapter.get_position(symbol)
    }

    /// Registers for every event type. Returns a non-zero subscription id,
    /// or `0` if `max_subscriptions` has been reached.
    pub fn subscribe_to_events(&self, callback: EventCallback) -> u64 {
        self.subscribe_filtered(None, callback)
    }

    pub fn subscribe_to_event_type(&self, event_type: EventType, callback: EventCallback) -> u64 {
        self.subscribe_filtered(Some(event_type), callback)
    }

    fn subscribe_filtered(&self, filter: Option<EventType>, callback: EventCallback) -> u64 {
        self.subscriptions
            .subscribe(filter, callback, Arc::clone(&self.pool), DEFAULT_LANE_CAPACITY)
            .unwrap_or(0)
    }

    /// No-op on an unknown id. Blocks until in-flight delivery to `id` has
    /// drained, so no callback for `id` runs after this returns.
    pub fn unsubscribe(&self, id: u64) -> bool {
        self.subscriptions.unsubscribe(id)
    }

    pub fn unsubscribe_all(&self) {
        self.subscriptions.unsubscribe_all();
    }

    fn publish(&self, payload: EventPayload) {
        let event = self.pool.publish(payload);
        self.metrics.events_published.fetch_add(1, Ordering::Relaxed);
        let targets = self.subscriptions.snapshot();
        dispatch(&targets, &event, &self.pool);
        // The publisher's own reference; subscriptions hold clones that
        // keep the payload alive until their worker releases it.
        self.pool.release(event);
    }

    pub fn metrics(&self) -> BridgeMetricsSnapshot {
        self.metrics.snapshot(&self.pool)
    }

    pub fn reset_metrics(&self) {
        self.metrics.reset();
    }

    pub fn subscription_count(&self) -> usize {
        self.subscriptions.len()
    }

    /// `None` for an unknown or already-unsubscribed id, otherwise how
    /// many events that subscription's lane has drop-oldest-evicted.
    pub fn subscription_dropped_count(&self, id: u64) -> Option<u64> {
        self.subscriptions.dropped_count(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn running_bridge() -> Bridge {
        let bridge = Bridge::new(
            BridgeConfig::default(),
            Arc::new(PaperEngineAdapter::new()),
        );
        bridge.initialize().unwrap();
        bridge.start().unwrap();
        bridge
    }

    #[tokio::test]
    async fn place_order_happy_path_updates_metrics_and_publishes() {
        let bridge = running_bridge();
        let ack = bridge
            .place_order("buy", "BTCUSDT", 1.0, 50_000.0, "order-1")
            .await
            .unwrap();
        assert!(!ack.engine_order_id.is_empty());

        let snapshot = bridge.metrics();
        assert_eq!(snapshot.orders_submitted, 1);
        assert!(snapshot.avg_order_latency_ns > 0.0);
    }

    #[tokio::test]
    async fn place_order_rejects_invalid_side_without_side_effects() {
        let bridge = running_bridge();
        let err = bridge
            .place_order("invalid", "BTCUSDT", 1.0, 50_000.0, "x")
            .await
            .unwrap_err();
        assert_eq!(err, GatewayError::InvalidInput("side must be buy or sell".into()));
        assert_eq!(bridge.metrics().orders_submitted, 0);
    }

    #[tokio::test]
    async fn not_running_rejects_place_order() {
        let bridge = Bridge::new(BridgeConfig::default(), Arc::new(PaperEngineAdapter::new()));
        let err = bridge
            .place_order("buy", "BTCUSDT", 1.0, 1.0, "c1")
            .await
            .unwrap_err();
        assert_eq!(err, GatewayError::NotRunning);
    }

    #[tokio::test]
    async fn starting_twice_fails_already_running() {
        let bridge = running_bridge();
        assert_eq!(bridge.start().unwrap_err(), GatewayError::AlreadyRunning);
    }

    #[tokio::test]
    async fn stop_twice_is_a_no_op() {
        let bridge = running_bridge();
        bridge.stop();
        bridge.stop();
    }

    #[tokio::test]
    async fn all_events_and_filtered_subscriber_both_receive_order_update() {
        let bridge = running_bridge();
        let count_a = Arc::new(AtomicUsize::new(0));
        let count_b = Arc::new(AtomicUsize::new(0));

        let ca = Arc::clone(&count_a);
        let sub_a = bridge.subscribe_to_events(Box::new(move |_ev| {
            ca.fetch_add(1, Ordering::SeqCst);
        }));

        let cb = Arc::clone(&count_b);
        let sub_b = bridge.subscribe_to_event_type(
            EventType::OrderUpdate,
            Box::new(move |_ev| {
                cb.fetch_add(1, Ordering::SeqCst);
            }),
        );

        bridge
            .place_order("buy", "BTCUSDT", 1.0, 50_000.0, "order-1")
            .await
            .unwrap();

        // Delivery happens on each subscription's worker thread; give it a
        // moment to run before asserting.
        std::thread::sleep(std::time::Duration::from_millis(50));
        assert_eq!(count_a.load(Ordering::SeqCst), 1);
        assert_eq!(count_b.load(Ordering::SeqCst), 1);

        assert!(bridge.unsubscribe(sub_a));
        bridge
            .place_order("buy", "BTCUSDT", 1.0, 50_000.0, "order-2")
            .await
            .unwrap();
        std::thread::sleep(std::time::Duration::from_millis(50));

        assert_eq!(count_a.load(Ordering::SeqCst), 1);
        assert_eq!(count_b.load(Ordering::SeqCst), 2);
        assert!(sub_b != 0);
    }

    #[tokio::test]
    async fn unsubscribe_unknown_id_is_a_no_op() {
        let bridge = running_bridge();
        assert!(!bridge.unsubscribe(999_999));
    }
}
