//! Example strategy implementations against the `StrategyKernel` host
//! contract (qflow-core's `strategy::kernel`).
//!
//! Per-strategy signal generation is explicitly out of scope for the
//! core platform: the kernel only maintains book state, the estimated
//! position, and the PNL accumulator, and exposes `emit_order` as the
//! sole path a strategy uses to request new orders. This crate holds
//! one reference implementation of that contract (a spread-quoting
//! market maker) so `qflow-bins` has something concrete to run; it is
//! not meant to be an exhaustive strategy library.

pub mod spread_quote;

pub use spread_quote::SpreadQuoteStrategy;

use qflow_core::shm::records::{MarketUpdate, RequestMsg};
use qflow_core::strategy::kernel::StrategyKernel;

/// Host contract a strategy's signal-generation logic satisfies.
/// `StrategyHost`/`StrategyKernel` drive book-keeping and order
/// bookkeeping; implementors decide only what orders to place.
pub trait Strategy: Send {
    /// Called once per tick for every symbol the kernel is subscribed
    /// to, after the kernel has already updated its book and marks.
    /// Returns the orders (if any) the strategy wants placed this tick.
    fn on_tick(&mut self, kernel: &mut StrategyKernel, symbol: &str, update: &MarketUpdate) -> Vec<RequestMsg>;
}
