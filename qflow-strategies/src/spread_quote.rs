//! A symmetric spread-quoting market maker, adapted from the teacher's
//! fixed-spread `SimpleSpread` strategy: quote a fixed number of basis
//! points either side of the book mid, skip the tick if the market is
//! already narrower than `min_spread_bps`.
//!
//! Unlike the teacher's const-generic, Cargo-feature-selected version,
//! parameters here come from `StrategyKernel::parameter` so they can be
//! hot-reloaded by `paramwatch::ParameterWatcher` without a rebuild.

use crate::Strategy;
use qflow_core::shm::records::{MarketUpdate, RequestMsg, Side};
use qflow_core::strategy::kernel::StrategyKernel;

/// Parameter keys this strategy reads off the kernel's parameter map.
/// `paramwatch`'s key-map translates model-file keywords to these.
pub mod params {
    pub const SPREAD_BPS: &str = "spread_bps";
    pub const MIN_SPREAD_BPS: &str = "min_spread_bps";
    pub const ORDER_SIZE: &str = "order_size";
}

const DEFAULT_SPREAD_BPS: f64 = 10.0;
const DEFAULT_MIN_SPREAD_BPS: f64 = 2.0;
const DEFAULT_ORDER_SIZE: f64 = 1.0;

/// Reprice only when the desired quote has moved by more than this
/// many basis points from the last one placed, to avoid flooding the
/// bridge with cancel/replace churn on every tick.
const REPRICE_THRESHOLD_BPS: f64 = 5.0;

pub struct SpreadQuoteStrategy {
    last_quote_mid: std::collections::HashMap<String, f64>,
}

impl SpreadQuoteStrategy {
    pub fn new() -> Self {
        Self {
            last_quote_mid: std::collections::HashMap::new(),
        }
    }

    fn needs_reprice(&self, symbol: &str, mid: f64) -> bool {
        match self.last_quote_mid.get(symbol) {
            Some(&last_mid) if last_mid > 0.0 => {
                let drift_bps = ((mid - last_mid) / last_mid).abs() * 10_000.0;
                drift_bps >= REPRICE_THRESHOLD_BPS
            }
            _ => true,
        }
    }
}

impl Default for SpreadQuoteStrategy {
    fn default() -> Self {
        Self::new()
    }
}

impl Strategy for SpreadQuoteStrategy {
    fn on_tick(&mut self, kernel: &mut StrategyKernel, symbol: &str, update: &MarketUpdate) -> Vec<RequestMsg> {
        let Some(mid) = update.mid_price() else {
            return Vec::new();
        };
        let (Some(best_bid), Some(best_ask)) = (update.best_bid(), update.best_ask()) else {
            return Vec::new();
        };

        let market_spread_bps = ((best_ask.price - best_bid.price) / mid) * 10_000.0;
        let min_spread_bps = kernel
            .parameter(params::MIN_SPREAD_BPS)
            .unwrap_or(DEFAULT_MIN_SPREAD_BPS);
        if market_spread_bps < min_spread_bps {
            return Vec::new();
        }

        if !self.needs_reprice(symbol, mid) {
            return Vec::new();
        }

        let spread_bps = kernel.parameter(params::SPREAD_BPS).unwrap_or(DEFAULT_SPREAD_BPS);
        let order_size = kernel.parameter(params::ORDER_SIZE).unwrap_or(DEFAULT_ORDER_SIZE) as i32;
        let half_spread = mid * (spread_bps / 10_000.0) / 2.0;

        let our_bid = mid - half_spread;
        let our_ask = mid + half_spread;

        let mut orders = Vec::with_capacity(2);
        if let Some(req) = kernel.emit_order(symbol, Side::Buy, our_bid, order_size) {
            orders.push(req);
        }
        if let Some(req) = kernel.emit_order(symbol, Side::Sell, our_ask, order_size) {
            orders.push(req);
        }

        if !orders.is_empty() {
            self.last_quote_mid.insert(symbol.to_string(), mid);
        }
        orders
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use qflow_core::shm::records::{symbol_buf, ExchangeType, PriceLevel};

    fn tick(symbol: &str, bid: f64, ask: f64) -> MarketUpdate {
        let mut update: MarketUpdate = unsafe { std::mem::zeroed() };
        update.symbol = symbol_buf(symbol);
        update.exchange_type = ExchangeType::Shfe as u8;
        update.valid_bids = 1;
        update.valid_asks = 1;
        update.bids[0] = PriceLevel { price: bid, quantity: 10, order_count: 1 };
        update.asks[0] = PriceLevel { price: ask, quantity: 10, order_count: 1 };
        update
    }

    #[test]
    fn quotes_both_sides_when_market_spread_is_wide_enough() {
        let mut kernel = StrategyKernel::new(1, vec!["ag2506".into()], "/tmp");
        kernel.control.activate();
        kernel.initialize(
            [(params::SPREAD_BPS.to_string(), 10.0), (params::MIN_SPREAD_BPS.to_string(), 2.0)]
                .into_iter()
                .collect(),
        );

        let update = tick("ag2506", 7800.0, 7805.0);
        kernel.on_tick(update);

        let mut strategy = SpreadQuoteStrategy::new();
        let orders = strategy.on_tick(&mut kernel, "ag2506", &update);
        assert_eq!(orders.len(), 2);
    }

    #[test]
    fn skips_when_market_spread_narrower_than_minimum() {
        let mut kernel = StrategyKernel::new(1, vec!["ag2506".into()], "/tmp");
        kernel.control.activate();
        kernel.initialize([(params::MIN_SPREAD_BPS.to_string(), 50.0)].into_iter().collect());

        let update = tick("ag2506", 7800.0, 7800.5);
        kernel.on_tick(update);

        let mut strategy = SpreadQuoteStrategy::new();
        let orders = strategy.on_tick(&mut kernel, "ag2506", &update);
        assert!(orders.is_empty());
    }

    #[test]
    fn does_not_reprice_within_threshold() {
        let mut kernel = StrategyKernel::new(1, vec!["ag2506".into()], "/tmp");
        kernel.control.activate();

        let update = tick("ag2506", 7800.0, 7805.0);
        kernel.on_tick(update);

        let mut strategy = SpreadQuoteStrategy::new();
        let first = strategy.on_tick(&mut kernel, "ag2506", &update);
        assert_eq!(first.len(), 2);

        let second = strategy.on_tick(&mut kernel, "ag2506", &update);
        assert!(second.is_empty());
    }
}
