//! Risk management (§4.7, §ambient circuit-breaking).
//!
//! Two independent layers, deliberately not merged into one struct:
//!
//! - [`gate::RiskGate`]: per-strategy and global position/P&L/reject
//!   limits, the risk tier the spec actually calls for.
//! - [`circuit_breaker::CircuitBreaker`]: ambient per-instrument market
//!   sanity (spread blowout, price spikes, stale data), independent of
//!   which strategy or how much P&L is at stake.
//!
//! [`pre_trade::PreTradeValidator`] and [`rate_limiter::RateLimiter`]
//! round out pre-trade order validation and order-frequency throttling;
//! [`types`] holds the shared `Position`/`RiskLimits` value types those
//! two still use.

pub mod types;
pub mod circuit_breaker;
pub mod rate_limiter;
pub mod pre_trade;
pub mod gate;

pub use types::{Position, RiskLimits, RiskViolation};
pub use circuit_breaker::{CircuitBreaker, BreakerState, HaltReason};
pub use rate_limiter::{RateLimiter, RateLimiterConfig};
pub use pre_trade::{PreTradeValidator, PreTradeResult, PreTradeRejection, ExchangeRules};
pub use gate::{GateAction, GlobalRiskLimits, RiskGate, StrategyRiskLimits, StrategyRiskSnapshot};
