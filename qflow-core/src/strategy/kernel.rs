//! Per-strategy runtime state (§4.6).
//!
//! `StrategyKernel` owns the strategy's own view of its positions — a
//! separate ledger from the bridge's [`crate::ledger::PositionLedger`],
//! reconciled to broker truth only at startup and after a flatten. No
//! teacher precedent for this exact shape; grounded on the general
//! "narrow methods behind one state struct" discipline used by
//! [`crate::risk::gate::RiskGate`] and [`crate::ledger::PositionLedger`].

use crate::shm::records::{MarketUpdate, RequestMsg, ResponseMsg, ResponseType, Side};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Active,
    Flattening,
    Stopped,
}

#[derive(Debug, Clone, Copy)]
pub struct Control {
    pub active: bool,
    pub exit_requested: bool,
    pub cancel_pending: bool,
    pub flatten_mode: bool,
    pub run_state: RunState,
}

impl Default for Control {
    fn default() -> Self {
        Self {
            active: false,
            exit_requested: false,
            cancel_pending: false,
            flatten_mode: false,
            run_state: RunState::Idle,
        }
    }
}

impl Control {
    /// §4.6's transition table: Idle→Active→Flattening→Stopped→Active.
    pub fn activate(&mut self) {
        if matches!(self.run_state, RunState::Idle | RunState::Stopped) {
            self.active = true;
            self.exit_requested = false;
            self.cancel_pending = false;
            self.flatten_mode = false;
            self.run_state = RunState::Active;
        }
    }

    pub fn begin_flatten(&mut self) {
        if self.run_state == RunState::Active {
            self.flatten_mode = true;
            self.exit_requested = true;
            self.run_state = RunState::Flattening;
        }
    }

    pub fn mark_stopped_if_flat(&mut self, any_position_nonzero: bool, orders_outstanding: bool) {
        if self.run_state == RunState::Flattening && !any_position_nonzero && !orders_outstanding {
            self.active = false;
            self.run_state = RunState::Stopped;
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct EstimatedPosition {
    pub net_qty: i64,
    pub avg_cost: f64,
}

#[derive(Debug, Clone, Default)]
pub struct PnlAccumulator {
    pub realized: f64,
    pub unrealized: f64,
}

impl PnlAccumulator {
    pub fn total(&self) -> f64 {
        self.realized + self.unrealized
    }

    pub fn mark(&mut self, positions: &HashMap<String, EstimatedPosition>, marks: &HashMap<String, f64>) {
        self.unrealized = positions
            .iter()
            .filter_map(|(symbol, pos)| {
                marks
                    .get(symbol)
                    .map(|mark| (mark - pos.avg_cost) * pos.net_qty as f64)
            })
            .sum();
    }
}

/// Persisted on `save_snapshot`, loaded on `load_snapshot` (§4.8).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PositionSnapshot {
    pub strategy_id: i32,
    pub timestamp: u64,
    pub symbols_pos: HashMap<String, EstimatedPosition>,
    pub realized_pnl: f64,
}

pub struct StrategyKernel {
    pub strategy_id: i32,
    pub subscribed_symbols: Vec<String>,
    books: HashMap<String, MarketUpdate>,
    positions: HashMap<String, EstimatedPosition>,
    pnl: PnlAccumulator,
    parameters: HashMap<String, f64>,
    pub control: Control,
    pending_orders: u32,
    next_order_id: u32,
    snapshot_dir: PathBuf,
}

impl StrategyKernel {
    pub fn new(strategy_id: i32, subscribed_symbols: Vec<String>, snapshot_dir: impl Into<PathBuf>) -> Self {
        Self {
            strategy_id,
            subscribed_symbols,
            books: HashMap::new(),
            positions: HashMap::new(),
            pnl: PnlAccumulator::default(),
            parameters: HashMap::new(),
            control: Control::default(),
            pending_orders: 0,
            next_order_id: 1,
            snapshot_dir: snapshot_dir.into(),
        }
    }

    pub fn initialize(&mut self, params: HashMap<String, f64>) {
        self.parameters = params;
    }

    /// Replaces estimated positions wholesale with broker-reconciled
    /// truth. `avg_price` is the broker's reported price already scaled
    /// by `contract_multiplier`; this divides it back out.
    pub fn initialize_positions_with_cost(
        &mut self,
        broker_positions: HashMap<String, (i64, f64)>,
        contract_multiplier: f64,
    ) {
        self.positions = broker_positions
            .into_iter()
            .map(|(symbol, (qty, avg_price))| {
                (
                    symbol,
                    EstimatedPosition {
                        net_qty: qty,
                        avg_cost: if contract_multiplier != 0.0 {
                            avg_price / contract_multiplier
                        } else {
                            avg_price
                        },
                    },
                )
            })
            .collect();
    }

    pub fn positions(&self) -> &HashMap<String, EstimatedPosition> {
        &self.positions
    }

    pub fn pnl(&self) -> &PnlAccumulator {
        &self.pnl
    }

    pub fn update_parameters(&mut self, new_map: HashMap<String, f64>) {
        self.parameters = new_map;
    }

    pub fn parameter(&self, key: &str) -> Option<f64> {
        self.parameters.get(key).copied()
    }

    fn next_order_id(&mut self) -> u32 {
        let id = self.next_order_id;
        self.next_order_id += 1;
        id
    }

    /// Update the strategy's book for the ticked symbol. Strategy logic
    /// itself lives in `qflow-strategies`; the kernel's job here is to
    /// maintain book state and mark-to-market, and to offer `emit_order`
    /// as the one path a strategy uses to request new orders.
    pub fn on_tick(&mut self, update: MarketUpdate) {
        if !self.subscribed_symbols.iter().any(|s| s == update.symbol_str()) {
            return;
        }
        let symbol = update.symbol_str().to_string();
        if let Some(mid) = update.mid_price() {
            let mut marks = HashMap::new();
            marks.insert(symbol.clone(), mid);
            self.pnl.mark(&self.positions, &marks);
        }
        self.books.insert(symbol, update);
    }

    pub fn book(&self, symbol: &str) -> Option<&MarketUpdate> {
        self.books.get(symbol)
    }

    pub fn emit_order(&mut self, symbol: &str, side: Side, price: f64, quantity: i32) -> Option<RequestMsg> {
        if !self.control.active {
            return None;
        }
        let order_id = self.next_order_id();
        self.pending_orders += 1;
        Some(RequestMsg::new(
            order_id,
            self.strategy_id,
            symbol,
            self.books
                .get(symbol)
                .map(|b| crate::shm::records::ExchangeType::from_u8(b.exchange_type))
                .unwrap_or(crate::shm::records::ExchangeType::Unknown),
            side,
            crate::shm::records::OrdType::Limit,
            price,
            quantity,
            0,
        ))
    }

    /// §4.6: OPEN fill increments signed position; CLOSE fill decrements
    /// it; reject/cancel leave position untouched (the strategy's view
    /// never pre-reserves the way the bridge ledger does).
    pub fn on_order_update(&mut self, response: &ResponseMsg) {
        match response.response_type() {
            ResponseType::TradeConfirm => {
                let symbol = response.symbol_str().to_string();
                let signed_qty = match response.side() {
                    Side::Buy => response.quantity as i64,
                    Side::Sell => -(response.quantity as i64),
                };
                let entry = self.positions.entry(symbol).or_default();
                let prior_qty = entry.net_qty;
                let new_qty = prior_qty + signed_qty;

                if prior_qty == 0 || prior_qty.signum() == signed_qty.signum() {
                    let total_cost = entry.avg_cost * prior_qty.unsigned_abs() as f64
                        + response.price * signed_qty.unsigned_abs() as f64;
                    entry.avg_cost = if new_qty != 0 {
                        total_cost / new_qty.unsigned_abs() as f64
                    } else {
                        0.0
                    };
                } else {
                    let closed = signed_qty.unsigned_abs().min(prior_qty.unsigned_abs());
                    self.pnl.realized += (response.price - entry.avg_cost)
                        * closed as f64
                        * prior_qty.signum() as f64;
                }
                entry.net_qty = new_qty;

                if self.pending_orders > 0 {
                    self.pending_orders -= 1;
                }
            }
            ResponseType::CancelOrderConfirm | ResponseType::OrderError | ResponseType::OrsReject | ResponseType::RmsReject => {
                if self.pending_orders > 0 {
                    self.pending_orders -= 1;
                }
            }
            ResponseType::NewOrderConfirm => {}
        }

        let any_nonzero = self.positions.values().any(|p| p.net_qty != 0);
        self.control
            .mark_stopped_if_flat(any_nonzero, self.pending_orders > 0);
    }

    /// Enter Flattening: the host is responsible for actually canceling
    /// outstanding orders and issuing the zeroing orders this returns.
    pub fn trigger_flatten(&mut self) -> Vec<(String, Side, i32)> {
        self.control.begin_flatten();
        self.positions
            .iter()
            .filter(|(_, pos)| pos.net_qty != 0)
            .map(|(symbol, pos)| {
                let side = if pos.net_qty > 0 { Side::Sell } else { Side::Buy };
                (symbol.clone(), side, pos.net_qty.unsigned_abs() as i32)
            })
            .collect()
    }

    fn snapshot_path(&self) -> PathBuf {
        Self::snapshot_path_for(&self.snapshot_dir, self.strategy_id)
    }

    fn snapshot_path_for(dir: &Path, strategy_id: i32) -> PathBuf {
        dir.join(format!("{strategy_id}.json"))
    }

    /// Writes temp-then-rename (§4.8/spec.md:56): a crash between open
    /// and write leaves the previous snapshot intact instead of a
    /// truncated or half-written one, since the rename only lands once
    /// the temp file is fully flushed.
    pub fn save_snapshot(&self) -> Result<(), crate::errors::ReconcileError> {
        let snapshot = PositionSnapshot {
            strategy_id: self.strategy_id,
            timestamp: std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap_or_default()
                .as_secs(),
            symbols_pos: self.positions.clone(),
            realized_pnl: self.pnl.realized,
        };
        let json = serde_json::to_string_pretty(&snapshot).map_err(|source| {
            crate::errors::ReconcileError::SnapshotFormat {
                strategy_id: self.strategy_id,
                source,
            }
        })?;
        std::fs::create_dir_all(&self.snapshot_dir).map_err(|source| {
            crate::errors::ReconcileError::SnapshotIo {
                strategy_id: self.strategy_id,
                source,
            }
        })?;
        let final_path = self.snapshot_path();
        let tmp_path = final_path.with_extension("json.tmp");
        std::fs::write(&tmp_path, json).map_err(|source| crate::errors::ReconcileError::SnapshotIo {
            strategy_id: self.strategy_id,
            source,
        })?;
        std::fs::rename(&tmp_path, &final_path).map_err(|source| crate::errors::ReconcileError::SnapshotIo {
            strategy_id: self.strategy_id,
            source,
        })
    }

    pub fn load_snapshot(strategy_id: i32, dir: &Path) -> Result<PositionSnapshot, crate::errors::ReconcileError> {
        let path = Self::snapshot_path_for(dir, strategy_id);
        let data = std::fs::read_to_string(&path).map_err(|source| crate::errors::ReconcileError::SnapshotIo {
            strategy_id,
            source,
        })?;
        serde_json::from_str(&data).map_err(|source| crate::errors::ReconcileError::SnapshotFormat {
            strategy_id,
            source,
        })
    }

    pub fn apply_snapshot(&mut self, snapshot: PositionSnapshot) {
        self.positions = snapshot.symbols_pos;
        self.pnl.realized = snapshot.realized_pnl;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shm::records::ExchangeType;
    use tempfile::tempdir;

    fn filled_response(symbol: &str, side: Side, qty: i32, price: f64) -> ResponseMsg {
        ResponseMsg::new(1, 7, symbol, side, ResponseType::TradeConfirm, qty, price, 0, "exec1", 0)
    }

    #[test]
    fn open_fill_increments_position_with_weighted_avg_cost() {
        let mut kernel = StrategyKernel::new(7, vec!["ag2506".into()], "/tmp");
        kernel.control.activate();
        kernel.on_order_update(&filled_response("ag2506", Side::Buy, 2, 100.0));
        kernel.on_order_update(&filled_response("ag2506", Side::Buy, 2, 110.0));
        let pos = kernel.positions()["ag2506"];
        assert_eq!(pos.net_qty, 4);
        assert!((pos.avg_cost - 105.0).abs() < 1e-9);
    }

    #[test]
    fn closing_fill_realizes_pnl_and_decrements_position() {
        let mut kernel = StrategyKernel::new(7, vec!["ag2506".into()], "/tmp");
        kernel.control.activate();
        kernel.on_order_update(&filled_response("ag2506", Side::Buy, 4, 100.0));
        kernel.on_order_update(&filled_response("ag2506", Side::Sell, 4, 110.0));
        let pos = kernel.positions()["ag2506"];
        assert_eq!(pos.net_qty, 0);
        assert!((kernel.pnl().realized - 40.0).abs() < 1e-9);
    }

    #[test]
    fn trigger_flatten_issues_zeroing_orders_and_stops_when_flat() {
        let mut kernel = StrategyKernel::new(7, vec!["ag2506".into()], "/tmp");
        kernel.control.activate();
        kernel.on_order_update(&filled_response("ag2506", Side::Buy, 4, 100.0));

        let orders = kernel.trigger_flatten();
        assert_eq!(orders, vec![("ag2506".to_string(), Side::Sell, 4)]);
        assert_eq!(kernel.control.run_state, RunState::Flattening);

        kernel.on_order_update(&filled_response("ag2506", Side::Sell, 4, 105.0));
        assert_eq!(kernel.control.run_state, RunState::Stopped);
        assert!(!kernel.control.active);
    }

    #[test]
    fn reactivation_resets_control_flags() {
        let mut kernel = StrategyKernel::new(7, vec!["ag2506".into()], "/tmp");
        kernel.control.activate();
        kernel.control.begin_flatten();
        kernel.control.mark_stopped_if_flat(false, false);
        assert_eq!(kernel.control.run_state, RunState::Stopped);

        kernel.control.activate();
        assert_eq!(kernel.control.run_state, RunState::Active);
        assert!(!kernel.control.exit_requested);
        assert!(!kernel.control.flatten_mode);
    }

    #[test]
    fn snapshot_round_trips_positions() {
        let dir = tempdir().unwrap();
        let mut kernel = StrategyKernel::new(42, vec!["ag2506".into()], dir.path());
        kernel.control.activate();
        kernel.on_order_update(&filled_response("ag2506", Side::Buy, 3, 100.0));
        kernel.save_snapshot().unwrap();

        let loaded = StrategyKernel::load_snapshot(42, dir.path()).unwrap();
        assert_eq!(loaded.symbols_pos["ag2506"].net_qty, 3);
    }

    #[test]
    fn on_tick_ignores_unsubscribed_symbols() {
        let mut kernel = StrategyKernel::new(7, vec!["ag2506".into()], "/tmp");
        let mut update: MarketUpdate = unsafe { std::mem::zeroed() };
        update.symbol = crate::shm::records::symbol_buf("cu2508");
        update.exchange_type = ExchangeType::Shfe as u8;
        kernel.on_tick(update);
        assert!(kernel.book("cu2508").is_none());
    }
}
