//! Correlated random-walk tick generator (§4.4).
//!
//! Each tick draws one common Gaussian shock `z_c` shared by every
//! instrument, then blends it with a per-instrument idiosyncratic shock
//! `z_i` via `ρ·z_c + √(1−ρ²)·z_i`. This keeps instruments moving
//! together (as correlated futures legs do) while still diverging from
//! each other tick to tick. No `rand_distr` dependency: Box-Muller turns
//! the two uniform draws `rand::Rng` already gives us into a standard
//! normal.

use crate::marketdata::MarketDataFeed;
use crate::shm::records::{symbol_buf, ExchangeType, FeedType, MarketUpdate, PriceLevel};
use rand::Rng;
use std::f64::consts::PI;
use std::time::{SystemTime, UNIX_EPOCH};

const CORRELATION: f64 = 0.95;

#[derive(Debug, Clone)]
pub struct InstrumentConfig {
    pub symbol: String,
    pub exchange: ExchangeType,
    pub tick_size: f64,
    pub initial_mid: f64,
    pub volatility: f64,
    pub base_liquidity: i32,
}

struct InstrumentState {
    config: InstrumentConfig,
    mid: f64,
}

fn standard_normal(rng: &mut impl Rng) -> f64 {
    let u1: f64 = rng.gen_range(f64::EPSILON..1.0);
    let u2: f64 = rng.gen_range(0.0..1.0);
    (-2.0 * u1.ln()).sqrt() * (2.0 * PI * u2).cos()
}

fn now_ns() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos() as u64
}

/// Generates correlated `MarketUpdate` ticks for a fixed instrument
/// universe, round-robin, one instrument per `next_tick` call.
pub struct SimulatedFeed<R: Rng> {
    rng: R,
    instruments: Vec<InstrumentState>,
    cursor: usize,
    seq: u64,
}

impl<R: Rng> SimulatedFeed<R> {
    pub fn new(rng: R, instruments: Vec<InstrumentConfig>) -> Self {
        let instruments = instruments
            .into_iter()
            .map(|config| InstrumentState {
                mid: config.initial_mid,
                config,
            })
            .collect();
        Self {
            rng,
            instruments,
            cursor: 0,
            seq: 0,
        }
    }

    fn snap_to_tick(mid: f64, tick_size: f64) -> f64 {
        (mid / tick_size).round() * tick_size
    }

    fn build_levels(mid: f64, tick_size: f64, base_liquidity: i32, rng: &mut R) -> ([PriceLevel; 5], [PriceLevel; 5]) {
        let mut bids = [PriceLevel::default(); 5];
        let mut asks = [PriceLevel::default(); 5];
        for level in 0..5 {
            let decay = 1.0 - (level as f64) * 0.15;
            let jitter_bid: f64 = rng.gen_range(-0.05..0.05);
            let jitter_ask: f64 = rng.gen_range(-0.05..0.05);
            let qty = ((base_liquidity as f64) * decay).max(1.0);

            bids[level] = PriceLevel {
                price: mid - tick_size * (0.5 + level as f64),
                quantity: (qty * (1.0 + jitter_bid)).round() as i32,
                order_count: 1 + level as i32,
            };
            asks[level] = PriceLevel {
                price: mid + tick_size * (0.5 + level as f64),
                quantity: (qty * (1.0 + jitter_ask)).round() as i32,
                order_count: 1 + level as i32,
            };
        }
        (bids, asks)
    }
}

impl<R: Rng + Send> MarketDataFeed for SimulatedFeed<R> {
    fn next_tick(&mut self) -> Option<MarketUpdate> {
        if self.instruments.is_empty() {
            return None;
        }

        let z_c = standard_normal(&mut self.rng);
        let idx = self.cursor;
        self.cursor = (self.cursor + 1) % self.instruments.len();

        let z_i = standard_normal(&mut self.rng);
        let shock = CORRELATION * z_c + (1.0 - CORRELATION * CORRELATION).sqrt() * z_i;

        let state = &mut self.instruments[idx];
        let drift = shock * state.config.volatility;
        state.mid = Self::snap_to_tick(state.mid + drift, state.config.tick_size);

        let (bids, asks) = Self::build_levels(
            state.mid,
            state.config.tick_size,
            state.config.base_liquidity,
            &mut self.rng,
        );

        self.seq += 1;
        let ts = now_ns();

        Some(MarketUpdate {
            seq: self.seq,
            exchange_timestamp_ns: ts,
            local_timestamp_ns: ts,
            symbol: symbol_buf(&state.config.symbol),
            exchange_type: state.config.exchange as u8,
            valid_bids: 5,
            valid_asks: 5,
            feed_type: FeedType::Incremental as u8,
            update_type: 0,
            end_pkt: 1,
            bids,
            asks,
            last_price: state.mid,
            last_qty: 1,
            cum_volume: self.seq as i64,
            cum_turnover: state.mid * self.seq as f64,
        })
    }
}
