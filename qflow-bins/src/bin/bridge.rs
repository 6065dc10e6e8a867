//! Order-routing bridge process (§4.3): attaches to the three shm
//! queues, wires one or more broker adapters, and runs the
//! request-consumer loop until shutdown.
//!
//! `--Sim` wires a `SimBroker` per configured broker name, for running
//! the full request→offset→dispatch→callback→ledger path without a
//! real exchange connection. `--Live` would wire real adapters keyed
//! off `config.bridge.brokers`' paths; those adapters are an external
//! collaborator per §1 (this binary only shows the `SimBroker` wiring a
//! real one would replace).

use anyhow::{Context, Result};
use qflow_bins::common::{bootstrap, RunMode};
use qflow_core::bridge::{BrokerAdapter, OrderBridge, SimBroker};
use qflow_core::config::Config;
use qflow_core::ledger::PositionLedger;
use qflow_core::shm::records::{RequestMsg, ResponseMsg};
use qflow_core::shm::{keys, ShmQueue};
use std::collections::HashMap;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::{info, warn};

fn main() -> Result<()> {
    let args = bootstrap()?;
    let config = Config::load(&args.config_file).with_context(|| format!("loading {}", args.config_file))?;
    config.validate().context("config failed validation")?;

    info!(mode = ?args.mode(), brokers = config.bridge.brokers.len(), "starting order bridge");

    let request_queue: Arc<ShmQueue<RequestMsg>> = Arc::new(
        ShmQueue::create(config.shm.base_key + keys::REQUEST, config.shm.request_capacity as u32)
            .context("attaching to request shm queue")?,
    );
    let response_queue: Arc<ShmQueue<ResponseMsg>> = Arc::new(
        ShmQueue::create(config.shm.base_key + keys::RESPONSE, config.shm.response_capacity as u32)
            .context("attaching to response shm queue")?,
    );

    let brokers = build_brokers(&config, args.mode())?;
    let ledger = Arc::new(PositionLedger::new());
    let bridge = OrderBridge::new(ledger, brokers.clone(), request_queue, response_queue);

    for (symbol, broker_name) in &config.bridge.symbol_routing {
        bridge.route_symbol(symbol.clone(), broker_name.clone());
    }
    for broker in brokers.values() {
        broker.register_callbacks(bridge.clone());
    }

    // Startup position reconciliation (§4.8) runs from the strategy-host
    // process instead of here: it needs a `StrategyKernel` to apply the
    // outcome to, and this process owns order routing, not kernels.

    let shutdown = bridge.shutdown_signal();
    {
        let shutdown = shutdown.clone();
        if let Err(e) = ctrlc::set_handler(move || {
            warn!("received interrupt, shutting down bridge");
            shutdown.store(true, Ordering::Relaxed);
        }) {
            warn!(error = %e, "failed to install SIGINT/SIGTERM handler");
        }
    }

    bridge.run_request_loop();
    bridge.stats().log_status();
    Ok(())
}

fn build_brokers(config: &Config, mode: RunMode) -> Result<HashMap<String, Arc<dyn BrokerAdapter>>> {
    let names: Vec<String> = if config.bridge.brokers.is_empty() {
        vec!["sim".to_string()]
    } else {
        config.bridge.brokers.keys().cloned().collect()
    };

    let mut brokers: HashMap<String, Arc<dyn BrokerAdapter>> = HashMap::new();
    for name in names {
        if mode == RunMode::Live {
            warn!(broker = %name, "no live broker adapter wired in this build, falling back to SimBroker");
        }
        // Logged in while still concretely owned: `BrokerAdapter::login`
        // takes `&mut self`, so this has to happen before the adapter is
        // wrapped in the `Arc<dyn BrokerAdapter>` the bridge shares.
        let mut broker = SimBroker::new(name.clone());
        broker.login();
        brokers.insert(name, Arc::new(broker) as Arc<dyn BrokerAdapter>);
    }
    Ok(brokers)
}
