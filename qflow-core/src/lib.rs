//! Core of a multi-process futures trading platform: SysV shared-memory
//! MWMR ring queues for the market-data/request/response wire, a
//! broker-adapter bridge implementing Chinese-futures open/close-offset
//! accounting, a multi-strategy runtime (`StrategyHost`/`StrategyKernel`),
//! two-tier risk gating, startup/periodic position reconciliation, and a
//! model-file parameter hot-reload watcher.
//!
//! ## Process model
//!
//! Strategy processes and broker-bridge processes are separate binaries
//! (see `qflow-bins`) that only ever speak to each other through the
//! shared-memory queues in [`shm`]; nothing here assumes they share an
//! address space.
//!
//! ## Module map
//!
//! - [`shm`]: SysV IPC ring queues and the wire record types
//!   (`RequestMsg`, `ResponseMsg`, `MarketUpdate`).
//! - [`ledger`]: open/close-offset accounting (`PositionLedger`).
//! - [`bridge`]: `OrderBridge`, the broker-facing request/callback loop.
//! - [`marketdata`]: the correlated-random-walk simulator feed used in
//!   place of a live exchange connection.
//! - [`strategy`]: `StrategyKernel` (per-strategy state) hosted by
//!   `StrategyHost` (fan-out/fan-in, session control).
//! - [`reconcile`]: startup and periodic position reconciliation against
//!   broker truth.
//! - [`paramwatch`]: model-file hot-reload watcher.
//! - [`risk`]: per-strategy/global risk gate, pre-trade checks, circuit
//!   breakers, rate limiting.
//! - [`errors`]: typed error enums for each subsystem above.
//!
//! The remaining modules (`core`, `monitoring`, `resilience`, `config`,
//! `utils`, `perf`) are ambient infrastructure: zero-overhead value
//! types, metrics/alerting, backoff/circuit-breaking, and runtime
//! configuration.

pub mod core;

pub mod errors;
pub mod shm;

pub mod ledger;
pub mod bridge;
pub mod marketdata;
pub mod strategy;
pub mod reconcile;
pub mod paramwatch;

pub mod risk;
pub mod config;
pub mod monitoring;
pub mod resilience;
pub mod utils;
pub mod perf;

pub use core::{fixed_point, OrderId, OrderStatus, OrderType, Position, Side, Signal, SignalAction};

pub use shm::{
    ExchangeType, FeedType, MarketUpdate, OrdType, PriceLevel, RequestMsg, ResponseMsg,
    ResponseType, ShmQueue, ShmRecord,
};
pub use ledger::{OffsetFlag, PositionBuckets, PositionLedger};
pub use bridge::{BridgeStats, OrderBridge, OrderCacheEntry};
pub use marketdata::MarketDataFeed;
pub use strategy::{Allocation, SessionController, StrategyHost, StrategyKernel};
pub use reconcile::{PositionReconciler, ReconcileOutcome};
pub use paramwatch::ParameterWatcher;
pub use risk::{GateAction, RiskGate};

pub use anyhow::{Error, Result};

/// Convenient imports for strategy/bridge binaries.
pub mod prelude {
    pub use crate::bridge::{BrokerAdapter, OrderBridge};
    pub use crate::ledger::PositionLedger;
    pub use crate::marketdata::{simulator::SimulatedFeed, MarketDataFeed};
    pub use crate::paramwatch::ParameterWatcher;
    pub use crate::reconcile::PositionReconciler;
    pub use crate::risk::RiskGate;
    pub use crate::shm::{MarketUpdate, RequestMsg, ResponseMsg, ShmQueue};
    pub use crate::strategy::{SessionController, StrategyHost, StrategyKernel};

    pub use crate::{Error, Result};
}
