//! Domain types carried across the bridge boundary.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    /// Case-insensitive parse of `"buy"`/`"sell"`, per the place_order
    /// validation order: side is checked before any other field.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.to_ascii_lowercase().as_str() {
            "buy" => Some(Self::Buy),
            "sell" => Some(Self::Sell),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderType {
    Limit,
    Market,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimeInForce {
    Gtc,
    Ioc,
    Fok,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderIntent {
    pub symbol: String,
    pub side: OrderSide,
    pub quantity: f64,
    /// `0.0` means market price.
    pub price: f64,
    pub order_type: OrderType,
    pub time_in_force: TimeInForce,
    pub strategy_id: Option<String>,
}

impl OrderIntent {
    /// Rejects empty symbol, non-positive quantity, and unknown side. Side
    /// is structurally typed here so only the first two checks apply.
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.symbol.trim().is_empty() {
            return Err("symbol must not be empty");
        }
        if !(self.quantity > 0.0) {
            return Err("quantity must be positive");
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Order {
    pub client_id: String,
    pub symbol: String,
    pub side: OrderSide,
    pub quantity: f64,
    pub price: f64,
    pub status: OrderStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum OrderStatus {
    Submitted,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MarketSnapshot {
    pub symbol: String,
    pub bid: f64,
    pub ask: f64,
    pub last: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Default)]
pub struct AccountState {
    pub equity: f64,
    pub available_margin: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Position {
    pub symbol: String,
    pub quantity: f64,
    pub average_price: f64,
}
