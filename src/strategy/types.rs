//! Types shared across the strategy framework.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::bridge::{OrderIntent, Position};

/// Closed set of strategy kinds; unknown tags fall back to `Custom`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StrategyType {
    TrendFollowing,
    MeanReversion,
    Momentum,
    Arbitrage,
    MarketMaking,
    Grid,
    Custom,
}

impl StrategyType {
    pub fn canonical_name(&self) -> &'static str {
        match self {
            Self::TrendFollowing => "trend_following",
            Self::MeanReversion => "mean_reversion",
            Self::Momentum => "momentum",
            Self::Arbitrage => "arbitrage",
            Self::MarketMaking => "market_making",
            Self::Grid => "grid",
            Self::Custom => "custom",
        }
    }

    pub fn from_str(raw: &str) -> Self {
        match raw {
            "trend_following" => Self::TrendFollowing,
            "mean_reversion" => Self::MeanReversion,
            "momentum" => Self::Momentum,
            "arbitrage" => Self::Arbitrage,
            "market_making" => Self::MarketMaking,
            "grid" => Self::Grid,
            _ => Self::Custom,
        }
    }
}

/// Per-strategy risk caps; enforcement is the strategy's own
/// responsibility, the framework only carries the values through.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RiskCaps {
    pub max_position_size: f64,
    pub per_trade_risk: f64,
    pub stop_target: Option<f64>,
    pub take_target: Option<f64>,
}

/// Immutable descriptor consumed once at construction. Later changes go
/// through [`crate::strategy::StrategyRegistry::reload_parameters`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategyConfig {
    pub name: String,
    pub strategy_type: StrategyType,
    pub risk_caps: RiskCaps,
    pub symbols: Vec<String>,
    pub parameters: HashMap<String, f64>,
}

impl StrategyConfig {
    pub fn new(name: impl Into<String>, strategy_type: StrategyType) -> Self {
        Self {
            name: name.into(),
            strategy_type,
            risk_caps: RiskCaps::default(),
            symbols: Vec::new(),
            parameters: HashMap::new(),
        }
    }

    pub fn with_parameters(mut self, parameters: HashMap<String, f64>) -> Self {
        self.parameters = parameters;
        self
    }

    pub fn with_symbols(mut self, symbols: Vec<String>) -> Self {
        self.symbols = symbols;
        self
    }
}

/// Market data tick fanned out to every running strategy instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketEvent {
    pub symbol: String,
    pub price: f64,
    pub timestamp_ns: u64,
    pub is_candle_closed: bool,
}

pub type PositionUpdate = Position;

/// Batch handed to the caller-registered signal callback after a dispatch
/// cycle drains every strategy's outbox.
pub type SignalBatch = Vec<OrderIntent>;
