//! Circuit breaker for flash-crash and market-anomaly detection.
//!
//! Detects extreme market conditions and halts trading to prevent losses:
//! - Flash crashes (extreme spread widening)
//! - Price spikes (sudden large price movements)
//! - Low liquidity (insufficient size on book)
//! - Stale data (no recent updates)
//!
//! This is ambient per-instrument protection, distinct from
//! [`crate::risk::gate::RiskGate`]'s per-strategy/global position and
//! loss limits: the gate reasons about a strategy's own P&L and
//! exposure, this reasons about whether the market itself looks sane
//! enough to keep quoting into.
//!
//! ## State machine
//!
//! ```text
//!           NORMAL
//!              |
//!      anomaly detected (N consecutive ticks)
//!              v
//!           HALTED
//!              |
//!        manual reset
//!              v
//!           NORMAL
//! ```

use crate::shm::records::MarketUpdate;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{error, warn};

/// Maximum spread in basis points before the circuit breaker trips.
pub const MAX_SPREAD_BPS: u64 = 100;

/// Maximum price change between ticks, in percent.
pub const MAX_PRICE_CHANGE_PCT: u64 = 10;

/// Minimum resting size on either side of the book.
pub const MIN_LIQUIDITY: i32 = 1;

/// Maximum data age in nanoseconds before a tick is considered stale.
pub const MAX_DATA_AGE_NS: u64 = 5_000_000_000;

/// Consecutive violations required before halting, so a single
/// spurious tick doesn't trip the breaker.
pub const CONSECUTIVE_VIOLATIONS_THRESHOLD: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BreakerState {
    Normal,
    Halted(HaltReason),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum HaltReason {
    ExcessiveSpread { spread_bps: u64, max_bps: u64 },
    ExcessivePriceMove { change_pct: u64, max_pct: u64 },
    InsufficientLiquidity { min_size: i32, actual_bid: i32, actual_ask: i32 },
    StaleData { age_ms: u64, max_age_ms: u64 },
    Manual,
}

impl std::fmt::Display for HaltReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HaltReason::ExcessiveSpread { spread_bps, max_bps } => {
                write!(f, "excessive spread: {spread_bps}bps (max: {max_bps}bps)")
            }
            HaltReason::ExcessivePriceMove { change_pct, max_pct } => {
                write!(f, "excessive price move: {change_pct}% (max: {max_pct}%)")
            }
            HaltReason::InsufficientLiquidity { min_size, actual_bid, actual_ask } => {
                write!(f, "insufficient liquidity: bid={actual_bid}, ask={actual_ask} (min: {min_size})")
            }
            HaltReason::StaleData { age_ms, max_age_ms } => {
                write!(f, "stale data: {age_ms}ms old (max: {max_age_ms}ms)")
            }
            HaltReason::Manual => write!(f, "manual halt"),
        }
    }
}

/// Per-instrument circuit breaker. One instance per symbol.
///
/// Tracks market state and trips on anomalies; once tripped, requires
/// a manual reset.
pub struct CircuitBreaker {
    state: BreakerState,
    last_mid_price: Option<f64>,
    consecutive_violations: u32,
    total_trips: u64,
    last_trip_reason: Option<HaltReason>,
}

impl CircuitBreaker {
    pub fn new() -> Self {
        Self {
            state: BreakerState::Normal,
            last_mid_price: None,
            consecutive_violations: 0,
            total_trips: 0,
            last_trip_reason: None,
        }
    }

    /// Checks one market tick and returns the resulting state. Low
    /// liquidity and stale data skip the tick (return `Normal` without
    /// updating `last_mid_price`) rather than tripping the breaker.
    pub fn check(&mut self, tick: &MarketUpdate) -> BreakerState {
        if let BreakerState::Halted(reason) = self.state {
            return BreakerState::Halted(reason);
        }

        let (bid, ask) = match (tick.best_bid(), tick.best_ask()) {
            (Some(b), Some(a)) if b.price > 0.0 && a.price > b.price => (b, a),
            _ => return BreakerState::Normal,
        };

        if let Some(reason) = self.check_spread(bid.price, ask.price) {
            return self.trip(reason);
        }

        let mid = (bid.price + ask.price) / 2.0;
        if let Some(reason) = self.check_price_movement(mid) {
            return self.trip(reason);
        }

        if let Some(reason) = self.check_liquidity(bid.quantity, ask.quantity) {
            warn!("{}", reason);
            return BreakerState::Normal;
        }

        if let Some(reason) = self.check_staleness(tick) {
            warn!("{}", reason);
            return BreakerState::Normal;
        }

        self.last_mid_price = Some(mid);
        self.consecutive_violations = 0;
        BreakerState::Normal
    }

    fn check_spread(&self, bid: f64, ask: f64) -> Option<HaltReason> {
        let spread_bps = ((ask - bid) / bid * 10_000.0) as u64;
        (spread_bps > MAX_SPREAD_BPS).then_some(HaltReason::ExcessiveSpread {
            spread_bps,
            max_bps: MAX_SPREAD_BPS,
        })
    }

    fn check_price_movement(&self, current_mid: f64) -> Option<HaltReason> {
        let last_mid = self.last_mid_price?;
        if last_mid == 0.0 {
            return None;
        }
        let change_pct = ((current_mid - last_mid).abs() / last_mid * 100.0) as u64;
        (change_pct > MAX_PRICE_CHANGE_PCT).then_some(HaltReason::ExcessivePriceMove {
            change_pct,
            max_pct: MAX_PRICE_CHANGE_PCT,
        })
    }

    fn check_liquidity(&self, bid_size: i32, ask_size: i32) -> Option<HaltReason> {
        (bid_size < MIN_LIQUIDITY || ask_size < MIN_LIQUIDITY).then_some(
            HaltReason::InsufficientLiquidity {
                min_size: MIN_LIQUIDITY,
                actual_bid: bid_size,
                actual_ask: ask_size,
            },
        )
    }

    fn check_staleness(&self, tick: &MarketUpdate) -> Option<HaltReason> {
        let now_ns = SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_nanos() as u64;
        if now_ns < tick.exchange_timestamp_ns {
            return None;
        }
        let age_ns = now_ns - tick.exchange_timestamp_ns;
        (age_ns > MAX_DATA_AGE_NS).then_some(HaltReason::StaleData {
            age_ms: age_ns / 1_000_000,
            max_age_ms: MAX_DATA_AGE_NS / 1_000_000,
        })
    }

    fn trip(&mut self, reason: HaltReason) -> BreakerState {
        self.consecutive_violations += 1;
        if self.consecutive_violations >= CONSECUTIVE_VIOLATIONS_THRESHOLD {
            error!("circuit breaker tripped: {}", reason);
            self.state = BreakerState::Halted(reason);
            self.last_trip_reason = Some(reason);
            self.total_trips += 1;
            BreakerState::Halted(reason)
        } else {
            warn!(
                "circuit breaker warning ({}/{}): {}",
                self.consecutive_violations, CONSECUTIVE_VIOLATIONS_THRESHOLD, reason
            );
            BreakerState::Normal
        }
    }

    /// Manually resets the breaker. Should only be called after
    /// investigating and resolving the underlying issue.
    pub fn reset(&mut self) {
        if let BreakerState::Halted(reason) = self.state {
            warn!("circuit breaker reset (was: {})", reason);
            self.state = BreakerState::Normal;
            self.consecutive_violations = 0;
        }
    }

    pub fn manual_halt(&mut self) {
        error!("circuit breaker manually halted");
        self.state = BreakerState::Halted(HaltReason::Manual);
        self.total_trips += 1;
    }

    pub fn state(&self) -> BreakerState {
        self.state
    }

    pub fn total_trips(&self) -> u64 {
        self.total_trips
    }

    pub fn last_trip_reason(&self) -> Option<HaltReason> {
        self.last_trip_reason
    }

    pub fn is_halted(&self) -> bool {
        matches!(self.state, BreakerState::Halted(_))
    }
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new()
    }
}
