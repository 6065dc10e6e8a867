//! Typed error enums for the core subsystems.
//!
//! Each subsystem gets its own `thiserror` enum rather than a single
//! catch-all; callers that need to propagate across subsystem boundaries
//! wrap with `anyhow::Error` at the binary entry point, mirroring how
//! `core::errors` keeps domain errors narrow and hand-rolled.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ShmError {
    #[error("shmget failed for key {key:#x}: {source}")]
    Allocate {
        key: i32,
        #[source]
        source: std::io::Error,
    },
    #[error("shmat failed for key {key:#x}: {source}")]
    Attach {
        key: i32,
        #[source]
        source: std::io::Error,
    },
    #[error("shmdt failed: {0}")]
    Detach(std::io::Error),
    #[error("segment for key {key:#x} has capacity {found}, expected {expected} (power of two required)")]
    BadCapacity {
        key: i32,
        found: u32,
        expected: u32,
    },
    #[error("segment for key {key:#x} has elem_size {found}, expected {expected}")]
    BadElemSize {
        key: i32,
        found: u32,
        expected: u32,
    },
    #[error("queue full after exhausting retry budget ({attempts} attempts)")]
    Full { attempts: u32 },
    #[error("queue empty")]
    Empty,
}

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("bucket underflow: symbol {symbol} bucket {bucket} has {have}, tried to deduct {want}")]
    BucketUnderflow {
        symbol: String,
        bucket: &'static str,
        have: i64,
        want: i64,
    },
    #[error("no order cache entry for broker order id {0}")]
    UnknownOrder(String),
}

#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("no broker available for symbol {0}")]
    NoBroker(String),
    #[error("broker send failed for order {0}")]
    SendFailed(u32),
    #[error(transparent)]
    Ledger(#[from] LedgerError),
    #[error(transparent)]
    Shm(#[from] ShmError),
}

#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("broker query did not stabilize after {attempts} attempts")]
    BrokerNotReady { attempts: u32 },
    #[error("broker query failed permanently: {0}")]
    BrokerFailure(String),
    #[error("snapshot io error for strategy {strategy_id}: {source}")]
    SnapshotIo {
        strategy_id: i32,
        #[source]
        source: std::io::Error,
    },
    #[error("snapshot serialization error for strategy {strategy_id}: {source}")]
    SnapshotFormat {
        strategy_id: i32,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Error)]
pub enum ParamError {
    #[error("model file not found: {0}")]
    FileMissing(String),
    #[error("parse error at line {line}: {message}")]
    Parse { line: usize, message: String },
    #[error("validation failed for key '{key}': {message}")]
    Validation { key: String, message: String },
    #[error("unmapped model key: {0}")]
    UnmappedKey(String),
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum RiskBreach {
    #[error("strategy {strategy_id} max position exceeded: {current} > {limit}")]
    MaxPosition {
        strategy_id: i32,
        current: i64,
        limit: i64,
    },
    #[error("strategy {strategy_id} max exposure exceeded: {current:.2} > {limit:.2}")]
    MaxExposure {
        strategy_id: i32,
        current: f64,
        limit: f64,
    },
    #[error("strategy {strategy_id} stop loss hit: pnl {pnl:.2} <= floor {floor:.2}")]
    StopLoss {
        strategy_id: i32,
        pnl: f64,
        floor: f64,
    },
    #[error("strategy {strategy_id} max cumulative loss exceeded: {loss:.2} > {limit:.2}")]
    MaxLoss {
        strategy_id: i32,
        loss: f64,
        limit: f64,
    },
    #[error("strategy {strategy_id} max rejects exceeded: {count} > {limit}")]
    MaxRejects {
        strategy_id: i32,
        count: u32,
        limit: u32,
    },
    #[error("strategy {strategy_id} max drawdown exceeded: {drawdown:.2} > {limit:.2}")]
    MaxDrawdown {
        strategy_id: i32,
        drawdown: f64,
        limit: f64,
    },
    #[error("global drawdown breach: {current:.2} > {limit:.2}")]
    GlobalDrawdown { current: f64, limit: f64 },
    #[error("global daily loss breach: {current:.2} > {limit:.2}")]
    GlobalDailyLoss { current: f64, limit: f64 },
    #[error("global exposure breach: {current:.2} > {limit:.2}")]
    GlobalExposure { current: f64, limit: f64 },
    #[error("emergency stop tripped after {count} consecutive global breaches")]
    EmergencyStop { count: u32 },
}
