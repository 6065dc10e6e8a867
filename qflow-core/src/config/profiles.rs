//! Configuration profiles for different environments
//!
//! Provides pre-configured profiles for:
//! - Development: relaxed limits, verbose logging, simulated feed
//! - Staging: production-like but with safety guards
//! - Production: strict limits, critical alerts only, live broker adapters

use super::types::*;
use std::path::PathBuf;

/// Configuration profile name
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfileName {
    /// Development profile (local testing)
    Development,
    /// Staging profile (pre-production)
    Staging,
    /// Production profile (live trading)
    Production,
}

impl ProfileName {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Development => "development",
            Self::Staging => "staging",
            Self::Production => "production",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "dev" | "development" => Some(Self::Development),
            "staging" | "stage" => Some(Self::Staging),
            "prod" | "production" => Some(Self::Production),
            _ => None,
        }
    }
}

/// Configuration profile with environment-specific defaults
pub struct ConfigProfile;

impl ConfigProfile {
    /// Development: simulated market-data feed, relaxed risk gate,
    /// verbose logging.
    pub fn development() -> Config {
        Config {
            shm: ShmConfig {
                base_key: 0x5A00,
                request_capacity: 1024,
                response_capacity: 1024,
                market_data_capacity: 8192,
            },
            bridge: BridgeConfig {
                brokers: Default::default(),
                symbol_routing: Default::default(),
                response_enqueue_max_attempts: 1000,
                poll_idle_sleep_micros: 500,
            },
            session: SessionConfig {
                auto_start: true,
                auto_stop: false,
                window_start: None,
                window_end: None,
                poll_secs: 1,
            },
            reconcile: ReconcileConfig {
                snapshot_dir: PathBuf::from("./dev-data/snapshots"),
                max_query_attempts: 5,
                query_retry_secs: 1,
                periodic_interval_secs: 30,
            },
            paramwatch: ParamWatcherConfig {
                model_path: PathBuf::from("./dev-data/model.txt"),
                key_map: Default::default(),
                auto_poll: true,
                history_cap: 20,
            },
            risk_gate: RiskGateConfig {
                eval_period_secs: 5,
                alert_retention_secs: 600,
                max_alert_queue: 128,
                max_position: Some(100.0),
                max_exposure: Some(500_000.0),
                stop_loss_floor: Some(-5_000.0),
                max_loss: Some(-10_000.0),
                max_rejects: Some(20),
                max_drawdown: Some(-10_000.0),
                global_max_drawdown: Some(-50_000.0),
                global_max_daily_loss: Some(-50_000.0),
                global_max_exposure: Some(2_000_000.0),
                emergency_stop_threshold: 100,
            },
            metrics: MetricsConfig {
                prometheus_port: 9090,
                log_level: "debug".to_string(),
                json_logs: false,
            },
            monitoring: MonitoringConfig {
                enable_prometheus: true,
                metrics_addr: "127.0.0.1:9090".to_string(),
                metrics_path: "/metrics".to_string(),
                enable_journal: true,
                journal_path: PathBuf::from("./dev-data/bridge.jsonl"),
                recover_on_startup: false,
            },
            alerts: AlertConfig {
                enable_alerts: true,
                console_output: true,
                console_min_severity: "Info".to_string(),
                webhook_output: false,
                webhook_url: None,
                rate_limit_secs: 10,
            },
        }
    }

    /// Staging: production-shaped limits, scaled down, webhook alerts on.
    pub fn staging() -> Config {
        Config {
            shm: ShmConfig {
                base_key: 0x5A10,
                request_capacity: 4096,
                response_capacity: 4096,
                market_data_capacity: 65536,
            },
            bridge: BridgeConfig {
                brokers: Default::default(),
                symbol_routing: Default::default(),
                response_enqueue_max_attempts: 10_000,
                poll_idle_sleep_micros: 100,
            },
            session: SessionConfig {
                auto_start: true,
                auto_stop: true,
                window_start: Some("09:00".to_string()),
                window_end: Some("15:00".to_string()),
                poll_secs: 1,
            },
            reconcile: ReconcileConfig {
                snapshot_dir: PathBuf::from("./staging-data/snapshots"),
                max_query_attempts: 15,
                query_retry_secs: 2,
                periodic_interval_secs: 60,
            },
            paramwatch: ParamWatcherConfig {
                model_path: PathBuf::from("./staging-data/model.txt"),
                key_map: Default::default(),
                auto_poll: true,
                history_cap: 100,
            },
            risk_gate: RiskGateConfig {
                eval_period_secs: 5,
                alert_retention_secs: 3600,
                max_alert_queue: 512,
                max_position: Some(500.0),
                max_exposure: Some(5_000_000.0),
                stop_loss_floor: Some(-50_000.0),
                max_loss: Some(-100_000.0),
                max_rejects: Some(50),
                max_drawdown: Some(-100_000.0),
                global_max_drawdown: Some(-500_000.0),
                global_max_daily_loss: Some(-500_000.0),
                global_max_exposure: Some(20_000_000.0),
                emergency_stop_threshold: 100,
            },
            metrics: MetricsConfig {
                prometheus_port: 9090,
                log_level: "info".to_string(),
                json_logs: true,
            },
            monitoring: MonitoringConfig {
                enable_prometheus: true,
                metrics_addr: "0.0.0.0:9090".to_string(),
                metrics_path: "/metrics".to_string(),
                enable_journal: true,
                journal_path: PathBuf::from("./staging-data/bridge.jsonl"),
                recover_on_startup: true,
            },
            alerts: AlertConfig {
                enable_alerts: true,
                console_output: true,
                console_min_severity: "Warning".to_string(),
                webhook_output: true,
                webhook_url: Some("https://hooks.slack.com/staging-alerts".to_string()),
                rate_limit_secs: 60,
            },
        }
    }

    /// Production: strict risk limits, live broker adapters must be
    /// filled in via `bridge.brokers`, errors-only console.
    pub fn production() -> Config {
        Config {
            shm: ShmConfig {
                base_key: 0x5A20,
                request_capacity: 4096,
                response_capacity: 4096,
                market_data_capacity: 65536,
            },
            bridge: BridgeConfig {
                brokers: Default::default(),
                symbol_routing: Default::default(),
                response_enqueue_max_attempts: 10_000,
                poll_idle_sleep_micros: 100,
            },
            session: SessionConfig {
                auto_start: true,
                auto_stop: true,
                window_start: Some("09:00".to_string()),
                window_end: Some("15:00".to_string()),
                poll_secs: 1,
            },
            reconcile: ReconcileConfig {
                snapshot_dir: PathBuf::from("/var/lib/qflow/snapshots"),
                max_query_attempts: 15,
                query_retry_secs: 2,
                periodic_interval_secs: 60,
            },
            paramwatch: ParamWatcherConfig {
                model_path: PathBuf::from("/var/lib/qflow/model.txt"),
                key_map: Default::default(),
                auto_poll: true,
                history_cap: 100,
            },
            risk_gate: RiskGateConfig {
                eval_period_secs: 5,
                alert_retention_secs: 3600,
                max_alert_queue: 512,
                max_position: Some(1000.0),
                max_exposure: Some(20_000_000.0),
                stop_loss_floor: Some(-200_000.0),
                max_loss: Some(-500_000.0),
                max_rejects: Some(100),
                max_drawdown: Some(-500_000.0),
                global_max_drawdown: Some(-2_000_000.0),
                global_max_daily_loss: Some(-2_000_000.0),
                global_max_exposure: Some(100_000_000.0),
                emergency_stop_threshold: 100,
            },
            metrics: MetricsConfig {
                prometheus_port: 9090,
                log_level: "warn".to_string(),
                json_logs: true,
            },
            monitoring: MonitoringConfig {
                enable_prometheus: true,
                metrics_addr: "0.0.0.0:9090".to_string(),
                metrics_path: "/metrics".to_string(),
                enable_journal: true,
                journal_path: PathBuf::from("/var/lib/qflow/bridge.jsonl"),
                recover_on_startup: true,
            },
            alerts: AlertConfig {
                enable_alerts: true,
                console_output: true,
                console_min_severity: "Error".to_string(),
                webhook_output: true,
                webhook_url: Some("https://hooks.pagerduty.com/production-critical".to_string()),
                rate_limit_secs: 60,
            },
        }
    }

    /// Load profile by name
    pub fn load(profile: ProfileName) -> Config {
        match profile {
            ProfileName::Development => Self::development(),
            ProfileName::Staging => Self::staging(),
            ProfileName::Production => Self::production(),
        }
    }

    /// Load profile from environment variable QFLOW_PROFILE
    pub fn from_env() -> Config {
        let profile = std::env::var("QFLOW_PROFILE")
            .ok()
            .and_then(|s| ProfileName::from_str(&s))
            .unwrap_or(ProfileName::Development);

        Self::load(profile)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profile_name_from_str() {
        assert_eq!(ProfileName::from_str("dev"), Some(ProfileName::Development));
        assert_eq!(
            ProfileName::from_str("development"),
            Some(ProfileName::Development)
        );
        assert_eq!(ProfileName::from_str("staging"), Some(ProfileName::Staging));
        assert_eq!(ProfileName::from_str("prod"), Some(ProfileName::Production));
        assert_eq!(
            ProfileName::from_str("production"),
            Some(ProfileName::Production)
        );
        assert_eq!(ProfileName::from_str("invalid"), None);
    }

    #[test]
    fn test_development_profile() {
        let config = ConfigProfile::development();
        assert_eq!(config.metrics.log_level, "debug");
        assert_eq!(config.alerts.console_min_severity, "Info");
        assert_eq!(config.risk_gate.max_position, Some(100.0));
    }

    #[test]
    fn test_staging_profile() {
        let config = ConfigProfile::staging();
        assert_eq!(config.metrics.log_level, "info");
        assert_eq!(config.alerts.console_min_severity, "Warning");
        assert_eq!(config.risk_gate.max_position, Some(500.0));
        assert!(config.alerts.webhook_output);
    }

    #[test]
    fn test_production_profile() {
        let config = ConfigProfile::production();
        assert_eq!(config.metrics.log_level, "warn");
        assert_eq!(config.alerts.console_min_severity, "Error");
        assert_eq!(config.risk_gate.max_position, Some(1000.0));
        assert!(config.metrics.json_logs);
    }

    #[test]
    fn test_profile_validation() {
        assert!(ConfigProfile::development().validate().is_ok());
        assert!(ConfigProfile::staging().validate().is_ok());
        assert!(ConfigProfile::production().validate().is_ok());
    }
}
