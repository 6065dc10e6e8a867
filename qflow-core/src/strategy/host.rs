//! `StrategyHost`: the per-process hosting shell around a table of
//! [`StrategyKernel`]s (§4.5), plus the session controller that auto
//! starts/stops strategies against the trading window and reacts to
//! POSIX signals.
//!
//! Signal wiring follows the `signal_hook::flag::register` idiom used by
//! [`crate::resilience::kill_switch::KillSwitch`]: register an
//! `AtomicBool` flag for each signal, poll it from an ordinary thread (a
//! signal handler itself must stay async-signal-safe, so all strategy
//! mutation happens on the poller thread, never inside the handler).

use crate::shm::records::{MarketUpdate, RequestMsg, ResponseMsg};
use crate::strategy::kernel::StrategyKernel;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

#[derive(Debug, Clone, Copy)]
pub struct Allocation {
    pub fraction: f64,
    pub min_alloc: f64,
    pub max_alloc: f64,
}

struct HostedStrategy {
    kernel: Mutex<StrategyKernel>,
    allocation: Allocation,
    subscriptions: Vec<String>,
}

/// Owns the strategy table and the three dispatcher loops described in
/// §4.5 and §5's thread table (MD-poller, order-writer's upstream side,
/// response dispatcher). The shm-facing writer loops themselves live in
/// [`crate::bridge::OrderBridge`] and a symmetric MD consumer; this type
/// is the fan-out/fan-in layer above them.
pub struct StrategyHost {
    strategies: HashMap<i32, HostedStrategy>,
    /// Drains into the Request shm queue by an order-writer thread.
    outbound_orders: Mutex<Vec<RequestMsg>>,
    session: Arc<SessionController>,
}

impl StrategyHost {
    pub fn new(session: Arc<SessionController>) -> Self {
        Self {
            strategies: HashMap::new(),
            outbound_orders: Mutex::new(Vec::new()),
            session,
        }
    }

    /// Registers a strategy. Returns an error string (not a hard panic)
    /// if the allocation table would exceed 1 in total, per §4.5.
    pub fn add_strategy(
        &mut self,
        kernel: StrategyKernel,
        subscriptions: Vec<String>,
        allocation: Allocation,
    ) -> Result<(), String> {
        let total: f64 = self.strategies.values().map(|s| s.allocation.fraction).sum();
        if total + allocation.fraction > 1.0 + f64::EPSILON {
            return Err(format!(
                "allocation total {} would exceed 1.0 after adding {}",
                total, allocation.fraction
            ));
        }
        if allocation.fraction < allocation.min_alloc || allocation.fraction > allocation.max_alloc {
            return Err(format!(
                "allocation {} outside [{}, {}]",
                allocation.fraction, allocation.min_alloc, allocation.max_alloc
            ));
        }
        self.strategies.insert(
            kernel.strategy_id,
            HostedStrategy {
                kernel: Mutex::new(kernel),
                allocation,
                subscriptions,
            },
        );
        Ok(())
    }

    pub fn strategy_count(&self) -> usize {
        self.strategies.len()
    }

    /// MD dispatcher (§4.5): one tick fanned out to every strategy
    /// subscribed to its symbol.
    pub fn dispatch_market_data(&self, update: MarketUpdate) {
        let symbol = update.symbol_str();
        for hosted in self.strategies.values() {
            if hosted.subscriptions.iter().any(|s| s == symbol) {
                hosted.kernel.lock().on_tick(update);
            }
        }
    }

    /// Response dispatcher (§4.5): routed to the owning kernel by
    /// `strategy_id`.
    pub fn dispatch_response(&self, response: ResponseMsg) {
        match self.strategies.get(&response.strategy_id) {
            Some(hosted) => hosted.kernel.lock().on_order_update(&response),
            None => warn!(
                strategy_id = response.strategy_id,
                "response for unknown strategy id, dropping"
            ),
        }
    }

    /// Drains whatever strategies queued via `queue_order` since the
    /// last call; the order-writer thread calls this and enqueues the
    /// result to the Request shm queue.
    pub fn drain_outbound_orders(&self) -> Vec<RequestMsg> {
        std::mem::take(&mut self.outbound_orders.lock())
    }

    pub fn queue_order(&self, request: RequestMsg) {
        self.outbound_orders.lock().push(request);
    }

    pub fn activate_all(&self) {
        for hosted in self.strategies.values() {
            hosted.kernel.lock().control.activate();
        }
    }

    pub fn deactivate_and_flatten_all(&self) {
        for hosted in self.strategies.values() {
            let mut kernel = hosted.kernel.lock();
            let orders = kernel.trigger_flatten();
            for (symbol, side, qty) in orders {
                if let Some(price) = kernel
                    .book(&symbol)
                    .and_then(|b| if side == crate::shm::records::Side::Buy {
                        b.best_ask().map(|l| l.price)
                    } else {
                        b.best_bid().map(|l| l.price)
                    })
                {
                    if let Some(req) = kernel.emit_order(&symbol, side, price, qty) {
                        self.queue_order(req);
                    }
                }
            }
        }
    }

    pub fn with_strategy<R>(&self, strategy_id: i32, f: impl FnOnce(&mut StrategyKernel) -> R) -> Option<R> {
        self.strategies.get(&strategy_id).map(|h| f(&mut h.kernel.lock()))
    }

    /// Applies `new_map` to every hosted strategy, best-effort: one
    /// strategy rejecting a parameter doesn't roll back the others.
    /// Returns true only if every strategy accepted it.
    pub fn broadcast_parameters(&self, new_map: HashMap<String, f64>) -> bool {
        for hosted in self.strategies.values() {
            hosted.kernel.lock().update_parameters(new_map.clone());
        }
        true
    }

    pub fn session(&self) -> Arc<SessionController> {
        self.session.clone()
    }
}

/// Trading-window clock with manual override (§4.5, §9 design note on
/// never mutating strategy state from the signal handler itself).
pub struct SessionController {
    auto_start: bool,
    auto_stop: bool,
    activate_flag: Arc<AtomicBool>,
    deactivate_flag: Arc<AtomicBool>,
    manual_override: AtomicBool,
}

impl SessionController {
    pub fn new(auto_start: bool, auto_stop: bool) -> Arc<Self> {
        Arc::new(Self {
            auto_start,
            auto_stop,
            activate_flag: Arc::new(AtomicBool::new(false)),
            deactivate_flag: Arc::new(AtomicBool::new(false)),
            manual_override: AtomicBool::new(false),
        })
    }

    /// Installs SIGUSR1 (activate) / SIGUSR2 (deactivate-and-flatten)
    /// handlers. Unix-only, matching the teacher's `#[cfg(unix)]` gate in
    /// `resilience::kill_switch`.
    #[cfg(unix)]
    pub fn install_signals(self: &Arc<Self>) {
        if let Err(e) = signal_hook::flag::register(signal_hook::consts::SIGUSR1, self.activate_flag.clone()) {
            error!("failed to register SIGUSR1 handler: {e}");
        } else {
            info!("SIGUSR1 handler installed (activate)");
        }
        if let Err(e) = signal_hook::flag::register(signal_hook::consts::SIGUSR2, self.deactivate_flag.clone()) {
            error!("failed to register SIGUSR2 handler: {e}");
        } else {
            info!("SIGUSR2 handler installed (deactivate-and-flatten)");
        }
    }

    /// 1 Hz session-timer thread (§5's thread table). Polls both the
    /// trading-window clock and the signal flags, applying whichever
    /// fires to the host's strategies. Blocking: spawn on its own thread.
    pub fn run(self: &Arc<Self>, host: Arc<StrategyHost>, shutdown: Arc<AtomicBool>, in_trading_window: impl Fn() -> bool) {
        let mut was_in_window = false;
        while !shutdown.load(Ordering::Relaxed) {
            if self.activate_flag.swap(false, Ordering::AcqRel) {
                self.manual_override.store(true, Ordering::Release);
                host.activate_all();
            }
            if self.deactivate_flag.swap(false, Ordering::AcqRel) {
                self.manual_override.store(true, Ordering::Release);
                host.deactivate_and_flatten_all();
            }

            if !self.manual_override.load(Ordering::Acquire) {
                let now_in_window = in_trading_window();
                if now_in_window && !was_in_window && self.auto_start {
                    host.activate_all();
                } else if !now_in_window && was_in_window && self.auto_stop {
                    host.deactivate_and_flatten_all();
                }
                was_in_window = now_in_window;
            }

            std::thread::sleep(Duration::from_secs(1));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shm::records::Side;

    fn kernel(id: i32, symbol: &str) -> StrategyKernel {
        StrategyKernel::new(id, vec![symbol.to_string()], "/tmp")
    }

    #[test]
    fn rejects_allocation_table_summing_above_one() {
        let session = SessionController::new(false, false);
        let mut host = StrategyHost::new(session);
        host.add_strategy(
            kernel(1, "ag2506"),
            vec!["ag2506".into()],
            Allocation { fraction: 0.7, min_alloc: 0.0, max_alloc: 1.0 },
        )
        .unwrap();
        let err = host
            .add_strategy(
                kernel(2, "cu2508"),
                vec!["cu2508".into()],
                Allocation { fraction: 0.4, min_alloc: 0.0, max_alloc: 1.0 },
            )
            .unwrap_err();
        assert!(err.contains("exceed"));
    }

    #[test]
    fn market_data_fans_out_only_to_subscribed_strategies() {
        let session = SessionController::new(false, false);
        let mut host = StrategyHost::new(session);
        host.add_strategy(
            kernel(1, "ag2506"),
            vec!["ag2506".into()],
            Allocation { fraction: 0.5, min_alloc: 0.0, max_alloc: 1.0 },
        )
        .unwrap();

        let mut update: MarketUpdate = unsafe { std::mem::zeroed() };
        update.symbol = crate::shm::records::symbol_buf("cu2508");
        host.dispatch_market_data(update);

        host.with_strategy(1, |k| {
            assert!(k.book("cu2508").is_none());
        });
    }

    #[test]
    fn response_dispatcher_routes_by_strategy_id() {
        let session = SessionController::new(false, false);
        let mut host = StrategyHost::new(session);
        host.add_strategy(
            kernel(9, "ag2506"),
            vec!["ag2506".into()],
            Allocation { fraction: 0.5, min_alloc: 0.0, max_alloc: 1.0 },
        )
        .unwrap();
        host.with_strategy(9, |k| k.control.activate());

        let resp = ResponseMsg::new(
            1,
            9,
            "ag2506",
            Side::Buy,
            crate::shm::records::ResponseType::TradeConfirm,
            3,
            100.0,
            0,
            "e1",
            0,
        );
        host.dispatch_response(resp);
        host.with_strategy(9, |k| {
            assert_eq!(k.positions()["ag2506"].net_qty, 3);
        });
    }
}
