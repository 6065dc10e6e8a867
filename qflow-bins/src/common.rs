//! Common utilities shared by both binaries.
//!
//! `clap`-derived CLI surface (§6): a required `--Live`/`--Sim` mode
//! marker plus `--configFile`/`--controlFile`/`--strategyID`, following
//! `bog-bins::common::CommonArgs`'s derive-and-layer-over-config
//! convention. `--Live`/`--Sim` are modeled as two boolean flags in a
//! required, mutually exclusive `ArgGroup` rather than a single value
//! flag, since the marker itself carries no value.

use anyhow::Result;
use clap::{ArgGroup, Parser};
use qflow_core::resilience::install_panic_handler;
use qflow_core::utils::init_logger;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    Live,
    Sim,
}

#[derive(Parser, Debug)]
#[command(author, version, about)]
#[command(group(ArgGroup::new("mode").required(true).args(["live", "sim"])))]
pub struct ProcessArgs {
    /// consume market data off shared memory and route orders to a real broker adapter
    #[arg(long = "Live")]
    live: bool,

    /// consume a simulated feed and route orders to `SimBroker`, no shm market-data queue required
    #[arg(long = "Sim")]
    sim: bool,

    /// TOML configuration file
    #[arg(long = "configFile")]
    pub config_file: String,

    /// model/parameter file for paramwatch; overrides the config file's own `paramwatch.model_path`
    #[arg(long = "controlFile")]
    pub control_file: Option<String>,

    /// strategy id this process hosts (default 1)
    #[arg(long = "strategyID")]
    pub strategy_id: Option<i32>,

    /// tracing env-filter level, overridden by RUST_LOG
    #[arg(long = "log-level", default_value = "info")]
    pub log_level: String,

    /// emit JSON-formatted log lines instead of the default text format
    #[arg(long = "json-logs")]
    pub json_logs: bool,
}

impl ProcessArgs {
    pub fn mode(&self) -> RunMode {
        if self.live {
            RunMode::Live
        } else {
            RunMode::Sim
        }
    }
}

/// Parses argv, initializes tracing, and installs the panic hook. Every
/// binary's `main` starts with this. A missing or mismatched mode
/// marker exits the process with status 1 and clap's own usage text,
/// matching this system's "bad mode marker -> exit 1" convention rather
/// than clap's default exit code of 2.
pub fn bootstrap() -> Result<ProcessArgs> {
    let args = match ProcessArgs::try_parse() {
        Ok(args) => args,
        Err(e) => {
            e.print().ok();
            std::process::exit(1);
        }
    };

    init_logger(&args.log_level, args.json_logs);
    install_panic_handler();

    Ok(args)
}
