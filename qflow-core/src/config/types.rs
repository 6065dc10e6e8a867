use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Top-level runtime configuration for one strategy process or bridge
/// process, loaded from a TOML file (§config).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub shm: ShmConfig,
    pub bridge: BridgeConfig,
    pub session: SessionConfig,
    pub reconcile: ReconcileConfig,
    pub paramwatch: ParamWatcherConfig,
    pub risk_gate: RiskGateConfig,
    pub metrics: MetricsConfig,
    pub monitoring: MonitoringConfig,
    pub alerts: AlertConfig,
}

/// SysV shared-memory queue identity and sizing (§shm).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShmConfig {
    /// Base IPC key; request/response/market-data queues offset from it
    /// per `shm::keys`.
    #[serde(default = "default_shm_base_key")]
    pub base_key: i32,

    #[serde(default = "default_request_capacity")]
    pub request_capacity: usize,

    #[serde(default = "default_response_capacity")]
    pub response_capacity: usize,

    #[serde(default = "default_md_capacity")]
    pub market_data_capacity: usize,
}

impl Default for ShmConfig {
    fn default() -> Self {
        Self {
            base_key: default_shm_base_key(),
            request_capacity: default_request_capacity(),
            response_capacity: default_response_capacity(),
            market_data_capacity: default_md_capacity(),
        }
    }
}

/// Broker adapters the bridge process dispatches orders to, and the
/// exact-symbol routing table consulted before falling back to the
/// first logged-in adapter (§4.3).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BridgeConfig {
    /// Broker name → config file path, passed to `BrokerAdapter::initialize`.
    pub brokers: std::collections::HashMap<String, PathBuf>,

    /// Symbol → broker name, consulted before the first-logged-in fallback.
    #[serde(default)]
    pub symbol_routing: std::collections::HashMap<String, String>,

    #[serde(default = "default_response_enqueue_max_attempts")]
    pub response_enqueue_max_attempts: u32,

    #[serde(default = "default_poll_idle_sleep_micros")]
    pub poll_idle_sleep_micros: u64,
}

/// Trading-window auto start/stop and manual-override signal behavior
/// (§4.5).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    #[serde(default)]
    pub auto_start: bool,

    #[serde(default)]
    pub auto_stop: bool,

    /// Trading window, local time, "HH:MM" strings.
    pub window_start: Option<String>,
    pub window_end: Option<String>,

    #[serde(default = "default_session_poll_secs")]
    pub poll_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            auto_start: false,
            auto_stop: false,
            window_start: None,
            window_end: None,
            poll_secs: default_session_poll_secs(),
        }
    }
}

/// Startup/periodic position reconciliation against broker truth
/// (§4.8).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconcileConfig {
    /// Base data directory; the host binary appends `{live|simulation}/positions`
    /// per spec.md's `data/{live|simulation}/positions/{strategy_id}.json` layout.
    pub snapshot_dir: PathBuf,

    #[serde(default = "default_reconcile_max_attempts")]
    pub max_query_attempts: u32,

    #[serde(default = "default_reconcile_retry_secs")]
    pub query_retry_secs: u64,

    #[serde(default = "default_periodic_interval_secs")]
    pub periodic_interval_secs: u64,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            snapshot_dir: PathBuf::from("./data"),
            max_query_attempts: default_reconcile_max_attempts(),
            query_retry_secs: default_reconcile_retry_secs(),
            periodic_interval_secs: default_periodic_interval_secs(),
        }
    }
}

/// Model-file hot-reload watcher (§4.9, §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParamWatcherConfig {
    pub model_path: PathBuf,

    /// Model keyword → strategy-parameter name. Empty means use
    /// `paramwatch::default_key_map()`.
    #[serde(default)]
    pub key_map: std::collections::HashMap<String, String>,

    #[serde(default = "default_true")]
    pub auto_poll: bool,

    #[serde(default = "default_param_history_cap")]
    pub history_cap: usize,
}

/// Per-strategy and global risk limits consumed by `risk::gate::RiskGate`
/// (§4.7). `f64`, not `Decimal`: the gate evaluates against the same
/// plain-`f64` P&L accumulators `StrategyKernel` already carries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskGateConfig {
    #[serde(default = "default_eval_period_secs")]
    pub eval_period_secs: u64,

    #[serde(default = "default_alert_retention_secs")]
    pub alert_retention_secs: u64,

    #[serde(default = "default_max_alert_queue")]
    pub max_alert_queue: usize,

    pub max_position: Option<f64>,
    pub max_exposure: Option<f64>,
    pub stop_loss_floor: Option<f64>,
    pub max_loss: Option<f64>,
    pub max_rejects: Option<u32>,
    pub max_drawdown: Option<f64>,

    pub global_max_drawdown: Option<f64>,
    pub global_max_daily_loss: Option<f64>,
    pub global_max_exposure: Option<f64>,

    #[serde(default = "default_emergency_stop_threshold")]
    pub emergency_stop_threshold: u32,
}

impl Default for RiskGateConfig {
    fn default() -> Self {
        Self {
            eval_period_secs: default_eval_period_secs(),
            alert_retention_secs: default_alert_retention_secs(),
            max_alert_queue: default_max_alert_queue(),
            max_position: None,
            max_exposure: None,
            stop_loss_floor: None,
            max_loss: None,
            max_rejects: None,
            max_drawdown: None,
            global_max_drawdown: None,
            global_max_daily_loss: None,
            global_max_exposure: None,
            emergency_stop_threshold: default_emergency_stop_threshold(),
        }
    }
}

/// Metrics and logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    #[serde(default = "default_prometheus_port")]
    pub prometheus_port: u16,

    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default)]
    pub json_logs: bool,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            prometheus_port: default_prometheus_port(),
            log_level: default_log_level(),
            json_logs: false,
        }
    }
}

/// Monitoring and observability configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitoringConfig {
    #[serde(default = "default_true")]
    pub enable_prometheus: bool,

    #[serde(default = "default_metrics_addr")]
    pub metrics_addr: String,

    #[serde(default = "default_metrics_path")]
    pub metrics_path: String,

    #[serde(default = "default_true")]
    pub enable_journal: bool,

    #[serde(default = "default_journal_path")]
    pub journal_path: PathBuf,

    #[serde(default = "default_true")]
    pub recover_on_startup: bool,
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            enable_prometheus: true,
            metrics_addr: default_metrics_addr(),
            metrics_path: default_metrics_path(),
            enable_journal: true,
            journal_path: default_journal_path(),
            recover_on_startup: true,
        }
    }
}

/// Alert configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertConfig {
    #[serde(default = "default_true")]
    pub enable_alerts: bool,

    #[serde(default = "default_true")]
    pub console_output: bool,

    #[serde(default = "default_console_severity")]
    pub console_min_severity: String,

    #[serde(default)]
    pub webhook_output: bool,

    #[serde(default)]
    pub webhook_url: Option<String>,

    #[serde(default = "default_rate_limit")]
    pub rate_limit_secs: u64,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            enable_alerts: true,
            console_output: true,
            console_min_severity: default_console_severity(),
            webhook_output: false,
            webhook_url: None,
            rate_limit_secs: default_rate_limit(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_shm_base_key() -> i32 {
    0x5A00
}

fn default_request_capacity() -> usize {
    crate::config::constants::DEFAULT_REQUEST_QUEUE_CAPACITY
}

fn default_response_capacity() -> usize {
    crate::config::constants::DEFAULT_RESPONSE_QUEUE_CAPACITY
}

fn default_md_capacity() -> usize {
    crate::config::constants::DEFAULT_MARKET_DATA_QUEUE_CAPACITY
}

fn default_response_enqueue_max_attempts() -> u32 {
    crate::config::constants::DEFAULT_RESPONSE_ENQUEUE_MAX_ATTEMPTS
}

fn default_poll_idle_sleep_micros() -> u64 {
    crate::config::constants::DEFAULT_POLL_IDLE_SLEEP_MICROS
}

fn default_session_poll_secs() -> u64 {
    crate::config::constants::DEFAULT_SESSION_POLL_SECS
}

fn default_reconcile_max_attempts() -> u32 {
    crate::config::constants::DEFAULT_RECONCILE_MAX_QUERY_ATTEMPTS
}

fn default_reconcile_retry_secs() -> u64 {
    crate::config::constants::DEFAULT_RECONCILE_QUERY_RETRY_SECS
}

fn default_periodic_interval_secs() -> u64 {
    60
}

fn default_param_history_cap() -> usize {
    crate::config::constants::DEFAULT_PARAM_HISTORY_CAP
}

fn default_eval_period_secs() -> u64 {
    5
}

fn default_alert_retention_secs() -> u64 {
    3600
}

fn default_max_alert_queue() -> usize {
    crate::config::constants::DEFAULT_MAX_ALERT_QUEUE
}

fn default_emergency_stop_threshold() -> u32 {
    crate::config::constants::DEFAULT_EMERGENCY_STOP_THRESHOLD
}

fn default_prometheus_port() -> u16 {
    9090
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_metrics_addr() -> String {
    "127.0.0.1:9090".to_string()
}

fn default_metrics_path() -> String {
    "/metrics".to_string()
}

fn default_journal_path() -> PathBuf {
    PathBuf::from("./data/bridge.jsonl")
}

fn default_console_severity() -> String {
    "Warning".to_string()
}

fn default_rate_limit() -> u64 {
    60
}
