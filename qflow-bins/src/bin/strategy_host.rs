//! Strategy-host process (§4.5, §4.6): owns one `StrategyHost` hosting
//! a single `StrategyKernel` + `SpreadQuoteStrategy`, reads market data
//! and execution responses off the shared-memory queues, writes orders
//! back, and runs the session/paramwatch/risk-gate/reconcile loops
//! around it.
//!
//! `--Sim` swaps the market-data source for `SimulatedFeed` instead of
//! the shm market-data queue, for running a strategy end-to-end without
//! a live feed process; `--Live` consumes market data off shm like
//! every other process in this system.

use anyhow::{Context, Result};
use qflow_bins::common::{bootstrap, RunMode};
use qflow_core::bridge::{BrokerAdapter, SimBroker};
use qflow_core::config::Config;
use qflow_core::marketdata::simulator::{InstrumentConfig, SimulatedFeed};
use qflow_core::marketdata::MarketDataFeed;
use qflow_core::paramwatch::{default_key_map, default_schema, ParameterWatcher};
use qflow_core::reconcile::PositionReconciler;
use qflow_core::risk::gate::{GlobalRiskLimits, RiskGate, StrategyRiskLimits, StrategyRiskSnapshot};
use qflow_core::shm::records::{ExchangeType, MarketUpdate, RequestMsg, ResponseMsg};
use qflow_core::shm::{keys, ShmQueue};
use qflow_core::strategy::host::{Allocation, SessionController, StrategyHost};
use qflow_core::strategy::kernel::StrategyKernel;
use qflow_strategies::{SpreadQuoteStrategy, Strategy};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

fn main() -> Result<()> {
    let args = bootstrap()?;
    let config = Config::load(&args.config_file).with_context(|| format!("loading {}", args.config_file))?;
    config.validate().context("config failed validation")?;

    let strategy_id = args.strategy_id.unwrap_or(1);
    let symbols: Vec<String> = config.bridge.symbol_routing.keys().cloned().collect();
    let symbols = if symbols.is_empty() { vec!["ag2506".to_string()] } else { symbols };

    info!(mode = ?args.mode(), strategy_id, ?symbols, "starting strategy host");

    let mode_dir = match args.mode() {
        RunMode::Live => "live",
        RunMode::Sim => "simulation",
    };
    let snapshot_dir = config.reconcile.snapshot_dir.join(mode_dir).join("positions");

    let session = SessionController::new(config.session.auto_start, config.session.auto_stop);
    #[cfg(unix)]
    session.install_signals();

    let mut host = StrategyHost::new(session.clone());
    let kernel = StrategyKernel::new(strategy_id, symbols.clone(), &snapshot_dir);
    host.add_strategy(
        kernel,
        symbols.clone(),
        Allocation { fraction: 1.0, min_alloc: 0.0, max_alloc: 1.0 },
    )
    .map_err(|e| anyhow::anyhow!(e))
    .context("registering strategy with host")?;
    let host = Arc::new(host);

    let reconciler = PositionReconciler::new(&snapshot_dir);
    reconcile_at_startup(&reconciler, &host, strategy_id, &config)?;

    let risk_gate = Arc::new(build_risk_gate(&config));
    risk_gate.register_strategy(strategy_id, strategy_limits(&config));

    let mut watcher = (!config.paramwatch.model_path.as_os_str().is_empty()).then(|| {
        let key_map = if config.paramwatch.key_map.is_empty() {
            default_key_map()
        } else {
            config.paramwatch.key_map.clone()
        };
        ParameterWatcher::new(&config.paramwatch.model_path, key_map, default_schema())
    });
    if let Some(control_file) = &args.control_file {
        watcher = Some(ParameterWatcher::new(control_file, default_key_map(), default_schema()));
    }
    if let Some(w) = &watcher {
        info!(path = %w.model_path().display(), "parameter watcher configured");
    }

    let shutdown = Arc::new(AtomicBool::new(false));
    install_ctrlc_handler(shutdown.clone());

    let session_thread = {
        let host = host.clone();
        let session = session.clone();
        let shutdown = shutdown.clone();
        let window_start = config.session.window_start.clone();
        let window_end = config.session.window_end.clone();
        std::thread::spawn(move || {
            session.run(host, shutdown, move || in_trading_window(&window_start, &window_end));
        })
    };

    let mut strategy_logic = SpreadQuoteStrategy::new();
    let mut rng = StdRng::from_entropy();

    match args.mode() {
        RunMode::Sim => run_simulated(&host, &mut strategy_logic, &mut rng, &symbols, &risk_gate, strategy_id, &shutdown),
        RunMode::Live => run_live(&host, &mut strategy_logic, &config, &risk_gate, strategy_id, &shutdown)?,
    }

    info!("shutdown requested, flattening all strategies");
    host.deactivate_and_flatten_all();
    host.with_strategy(strategy_id, |k| {
        if let Err(e) = k.save_snapshot() {
            warn!(error = %e, "failed to persist final snapshot");
        }
    });

    shutdown.store(true, Ordering::Relaxed);
    let _ = watcher; // kept alive through shutdown for its history ring
    let _ = session_thread.join();
    Ok(())
}

/// §4.8 startup reconciliation, run from the strategy-host process
/// since it's the one that owns the `StrategyKernel` the outcome gets
/// applied to. Builds its own `SimBroker` purely to query positions —
/// this process never routes orders, that stays the bridge's job
/// (mirrors `bridge::build_brokers`'s login-then-wrap pattern).
fn reconcile_at_startup(
    reconciler: &PositionReconciler,
    host: &Arc<StrategyHost>,
    strategy_id: i32,
    config: &Config,
) -> Result<()> {
    let name = config.bridge.brokers.keys().next().cloned().unwrap_or_else(|| "sim".to_string());
    let mut broker = SimBroker::new(name);
    broker.login();

    match reconciler.reconcile_startup(&broker, &[strategy_id]) {
        Ok(outcome) => {
            let broker_positions: std::collections::HashMap<String, (i64, f64)> = outcome.broker_cost_basis.clone();
            host.with_strategy(strategy_id, |kernel| {
                kernel.initialize_positions_with_cost(broker_positions, 1.0);
            });
            info!(?outcome, "startup reconciliation complete, positions applied");
        }
        Err(e) => warn!(error = %e, "startup reconciliation failed, strategy starts with no seeded positions"),
    }
    Ok(())
}

fn build_risk_gate(config: &Config) -> RiskGate {
    let limits = GlobalRiskLimits {
        max_drawdown: config.risk_gate.global_max_drawdown.unwrap_or(f64::MAX),
        max_daily_loss: config.risk_gate.global_max_daily_loss.unwrap_or(f64::MAX),
        max_exposure: config.risk_gate.global_max_exposure.unwrap_or(f64::MAX),
        emergency_stop_threshold: config.risk_gate.emergency_stop_threshold,
    };
    RiskGate::new(
        limits,
        Duration::from_secs(config.risk_gate.eval_period_secs),
        Duration::from_secs(config.risk_gate.alert_retention_secs),
    )
}

fn strategy_limits(config: &Config) -> StrategyRiskLimits {
    StrategyRiskLimits {
        max_position: config.risk_gate.max_position.map(|p| p as i64).unwrap_or(i64::MAX),
        max_exposure: config.risk_gate.max_exposure.unwrap_or(f64::MAX),
        stop_loss_floor: config.risk_gate.stop_loss_floor.unwrap_or(f64::MIN),
        max_loss: config.risk_gate.max_loss.unwrap_or(f64::MAX),
        max_rejects: config.risk_gate.max_rejects.unwrap_or(u32::MAX),
        max_drawdown: config.risk_gate.max_drawdown.unwrap_or(f64::MAX),
    }
}

fn in_trading_window(start: &Option<String>, end: &Option<String>) -> bool {
    let (Some(start), Some(end)) = (start, end) else {
        return true;
    };
    let now = chrono_free_now_hhmm();
    now.as_str() >= start.as_str() && now.as_str() < end.as_str()
}

/// `HH:MM` in local time without pulling in `chrono` for one field —
/// the rest of this crate has no other use for a date/time library.
fn chrono_free_now_hhmm() -> String {
    let secs_since_midnight = (std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs())
        % 86_400;
    format!("{:02}:{:02}", secs_since_midnight / 3600, (secs_since_midnight % 3600) / 60)
}

fn install_ctrlc_handler(shutdown: Arc<AtomicBool>) {
    if let Err(e) = ctrlc::set_handler(move || {
        warn!("received interrupt, shutting down");
        shutdown.store(true, Ordering::Relaxed);
    }) {
        warn!(error = %e, "failed to install SIGINT/SIGTERM handler");
    }
}

fn run_simulated(
    host: &Arc<StrategyHost>,
    strategy_logic: &mut SpreadQuoteStrategy,
    rng: &mut StdRng,
    symbols: &[String],
    risk_gate: &Arc<RiskGate>,
    strategy_id: i32,
    shutdown: &Arc<AtomicBool>,
) {
    let instruments = symbols
        .iter()
        .map(|s| InstrumentConfig {
            symbol: s.clone(),
            exchange: ExchangeType::Shfe,
            tick_size: 5.0,
            initial_mid: 7800.0,
            volatility: 20.0,
            base_liquidity: 10,
        })
        .collect();
    let mut feed = SimulatedFeed::new(std::mem::replace(rng, StdRng::from_entropy()), instruments);

    host.activate_all();
    while !shutdown.load(Ordering::Relaxed) {
        let Some(update) = feed.next_tick() else {
            break;
        };
        drive_tick(host, strategy_logic, &update, risk_gate, strategy_id);
        std::thread::sleep(Duration::from_millis(50));
    }
}

fn run_live(
    host: &Arc<StrategyHost>,
    strategy_logic: &mut SpreadQuoteStrategy,
    config: &Config,
    risk_gate: &Arc<RiskGate>,
    strategy_id: i32,
    shutdown: &Arc<AtomicBool>,
) -> Result<()> {
    let md_queue: ShmQueue<MarketUpdate> =
        ShmQueue::create(config.shm.base_key + keys::MARKET_DATA, config.shm.market_data_capacity as u32)
            .context("attaching to market data shm queue")?;
    let resp_queue: ShmQueue<ResponseMsg> =
        ShmQueue::create(config.shm.base_key + keys::RESPONSE, config.shm.response_capacity as u32)
            .context("attaching to response shm queue")?;

    host.activate_all();
    while !shutdown.load(Ordering::Relaxed) {
        let mut idle = true;
        if let Some(update) = md_queue.try_dequeue() {
            drive_tick(host, strategy_logic, &update, risk_gate, strategy_id);
            idle = false;
        }
        if let Some(resp) = resp_queue.try_dequeue() {
            host.dispatch_response(resp);
            idle = false;
        }
        if idle {
            std::thread::sleep(Duration::from_micros(200));
        }
    }
    Ok(())
}

fn drive_tick(
    host: &Arc<StrategyHost>,
    strategy_logic: &mut SpreadQuoteStrategy,
    update: &MarketUpdate,
    risk_gate: &Arc<RiskGate>,
    strategy_id: i32,
) {
    host.dispatch_market_data(*update);
    let symbol = update.symbol_str().to_string();
    let orders: Vec<RequestMsg> = host
        .with_strategy(strategy_id, |kernel| strategy_logic.on_tick(kernel, &symbol, update))
        .unwrap_or_default();
    for req in orders {
        host.queue_order(req);
    }

    let snapshot = host
        .with_strategy(strategy_id, |kernel| StrategyRiskSnapshot {
            position: kernel.positions().values().map(|p| p.net_qty).sum(),
            pnl: kernel.pnl().total(),
            cumulative_loss: kernel.pnl().realized.min(0.0).abs(),
            ..Default::default()
        })
        .unwrap_or_default();
    for (action, breach) in risk_gate.evaluate_strategy(strategy_id, snapshot) {
        warn!(?action, ?breach, "risk gate breach");
        if action == qflow_core::risk::gate::GateAction::Stop {
            host.deactivate_and_flatten_all();
        }
    }
}
