//! Multi-strategy runtime: per-strategy state ([`kernel`]) hosted by a
//! shared dispatch shell ([`host`]) that fans market data out, routes
//! broker responses back, and answers to the trading-window clock and
//! POSIX activate/flatten signals (§4.5, §4.6).

pub mod host;
pub mod kernel;

pub use host::{Allocation, SessionController, StrategyHost};
pub use kernel::{Control, EstimatedPosition, PnlAccumulator, PositionSnapshot, RunState, StrategyKernel};
