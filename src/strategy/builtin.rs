//! A minimal trend-following strategy exercising the hot-reload path;
//! kept simple since indicator math bodies are out of scope here.

use std::collections::HashMap;

use crate::bridge::{OrderIntent, OrderSide, OrderType, TimeInForce};

use super::ring_buffer::RingBuffer;
use super::strategy_trait::{Strategy, StrategyFactory};
use super::types::{MarketEvent, PositionUpdate, StrategyConfig, StrategyType};

/// Buys when the short-window average crosses above the long-window
/// average, sells on the reverse cross. Parameters `short_period` /
/// `long_period` are hot-reloadable; history is preserved across a
/// reload, only the window sizes change for subsequent events.
pub struct MovingAverageCrossoverStrategy {
    symbol: String,
    short_period: usize,
    long_period: usize,
    prices: RingBuffer<f64>,
    was_short_above_long: Option<bool>,
    outbox: Vec<OrderIntent>,
}

impl MovingAverageCrossoverStrategy {
    pub fn new(config: &StrategyConfig) -> Self {
        let short_period = config.parameters.get("short_period").copied().unwrap_or(10.0) as usize;
        let long_period = config.parameters.get("long_period").copied().unwrap_or(20.0) as usize;
        let symbol = config.symbols.first().cloned().unwrap_or_default();
        Self {
            symbol,
            short_period: short_period.max(1),
            long_period: long_period.max(1),
            prices: RingBuffer::new(long_period.max(1)),
            was_short_above_long: None,
            outbox: Vec::new(),
        }
    }

    fn average(&self, window: usize) -> Option<f64> {
        if self.prices.len() < window {
            return None;
        }
        let values: Vec<f64> = self.prices.iter().copied().collect();
        let tail = &values[values.len() - window..];
        Some(tail.iter().sum::<f64>() / window as f64)
    }
}

impl Strategy for MovingAverageCrossoverStrategy {
    fn get_type(&self) -> StrategyType {
        StrategyType::TrendFollowing
    }

    fn on_event(&mut self, event: &MarketEvent) {
        if event.symbol != self.symbol || !event.is_candle_closed {
            return;
        }
        self.prices.push(event.price);

        let (Some(short), Some(long)) = (self.average(self.short_period), self.average(self.long_period))
        else {
            return;
        };
        let short_above_long = short > long;

        if let Some(was_above) = self.was_short_above_long {
            if was_above != short_above_long {
                let side = if short_above_long { OrderSide::Buy } else { OrderSide::Sell };
                self.outbox.push(OrderIntent {
                    symbol: self.symbol.clone(),
                    side,
                    quantity: 1.0,
                    price: 0.0,
                    order_type: OrderType::Market,
                    time_in_force: TimeInForce::Gtc,
                    strategy_id: None,
                });
            }
        }
        self.was_short_above_long = Some(short_above_long);
    }

    fn on_timer(&mut self, _timestamp_ns: u64) {}

    fn on_position_update(&mut self, _position: &PositionUpdate) {}

    fn get_signals(&mut self) -> Vec<OrderIntent> {
        std::mem::take(&mut self.outbox)
    }

    fn reset(&mut self) {
        self.prices.clear();
        self.was_short_above_long = None;
        self.outbox.clear();
    }

    fn supports_hot_reload(&self) -> bool {
        true
    }

    fn update_parameters(&mut self, params: &HashMap<String, f64>) -> bool {
        if let Some(&short) = params.get("short_period") {
            self.short_period = (short as usize).max(1);
        }
        if let Some(&long) = params.get("long_period") {
            self.long_period = (long as usize).max(1);
            let values: Vec<f64> = self.prices.iter().copied().collect();
            self.prices = RingBuffer::new(self.long_period);
            for v in values {
                self.prices.push(v);
            }
        }
        true
    }
}

pub struct MovingAverageCrossoverFactory;

impl StrategyFactory for MovingAverageCrossoverFactory {
    fn create(&self, config: &StrategyConfig) -> Box<dyn Strategy> {
        Box::new(MovingAverageCrossoverStrategy::new(config))
    }
}
