//! The engine side of the bridge: an external collaborator the bridge
//! forwards validated orders to and mirrors state from. Only the
//! interface contract is specified here; a real adapter wiring into an
//! actual matching/execution engine lives outside this crate.

use async_trait::async_trait;

use crate::error::GatewayResult;

use super::types::{AccountState, MarketSnapshot, Order, OrderIntent, Position};

#[derive(Debug, Clone)]
pub struct AdapterAck {
    pub engine_order_id: String,
}

/// What the bridge needs from the engine: forwarding orders and mirroring
/// read-side state. Modeled the same way the paper/live execution
/// adapters are, behind one `async_trait` boundary the bridge is agnostic
/// to.
#[async_trait]
pub trait EngineAdapter: Send + Sync {
    async fn submit_order(&self, intent: &OrderIntent, client_id: &str) -> GatewayResult<AdapterAck>;
    async fn cancel_order(&self, client_id: &str) -> GatewayResult<()>;

    fn get_order(&self, client_id: &str) -> Option<Order>;
    fn get_orders(&self) -> Vec<Order>;
    fn get_pending_orders(&self) -> Vec<Order>;
    fn get_market_snapshot(&self, symbol: &str) -> Option<MarketSnapshot>;
    fn get_account_state(&self) -> AccountState;
    fn get_positions(&self) -> Vec<Position>;
    fn get_position(&self, symbol: &str) -> Option<Position>;
}

/// In-memory adapter used by tests and as a default when no real engine is
/// wired in: every submitted order is accepted and mirrored into a simple
/// in-process order book, without any matching or fill simulation.
pub struct PaperEngineAdapter {
    orders: parking_lot::RwLock<std::collections::HashMap<String, Order>>,
    snapshots: parking_lot::RwLock<std::collections::HashMap<String, MarketSnapshot>>,
}

impl Default for PaperEngineAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl PaperEngineAdapter {
    pub fn new() -> Self {
        Self {
            orders: parking_lot::RwLock::new(std::collections::HashMap::new()),
            snapshots: parking_lot::RwLock::new(std::collections::HashMap::new()),
        }
    }

    pub fn seed_snapshot(&self, snapshot: MarketSnapshot) {
        self.snapshots
            .write()
            .insert(snapshot.symbol.clone(), snapshot);
    }
}

#[async_trait]
impl EngineAdapter for PaperEngineAdapter {
    async fn submit_order(&self, intent: &OrderIntent, client_id: &str) -> GatewayResult<AdapterAck> {
        let order = Order {
            client_id: client_id.to_string(),
            symbol: intent.symbol.clone(),
            side: intent.side,
            quantity: intent.quantity,
            price: intent.price,
            status: super::types::OrderStatus::Submitted,
        };
        self.orders.write().insert(client_id.to_string(), order);
        Ok(AdapterAck {
            engine_order_id: format!("paper-{client_id}"),
        })
    }

    async fn cancel_order(&self, client_id: &str) -> GatewayResult<()> {
        if let Some(order) = self.orders.write().get_mut(client_id) {
            order.status = super::types::OrderStatus::Cancelled;
        }
        Ok(())
    }

    fn get_order(&self, client_id: &str) -> Option<Order> {
        self.orders.read().get(client_id).cloned()
    }

    fn get_orders(&self) -> Vec<Order> {
        self.orders.read().values().cloned().collect()
    }

    fn get_pending_orders(&self) -> Vec<Order> {
        self.orders
            .read()
            .values()
            .filter(|o| o.status == super::types::OrderStatus::Submitted)
            .cloned()
            .collect()
    }

    fn get_market_snapshot(&self, symbol: &str) -> Option<MarketSnapshot> {
        self.snapshots.read().get(symbol).cloned()
    }

    fn get_account_state(&self) -> AccountState {
        AccountState::default()
    }

    fn get_positions(&self) -> Vec<Position> {
        Vec::new()
    }

    fn get_position(&self, _symbol: &str) -> Option<Position> {
        None
    }
}
