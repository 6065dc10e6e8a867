//! Configuration System
//!
//! Uses a **two-tier configuration system**:
//!
//! 1. **Compile-time defaults** via [`constants`] for hot-path tunables
//!    (queue capacities, retry budgets) that rarely change per deployment.
//! 2. **Runtime configuration** via TOML files (secondary), for
//!    per-symbol/per-broker settings that do vary per deployment:
//!    broker credentials, risk limits, trading windows.
//!
//! ## Runtime Configuration
//!
//! ### Example: config/default.toml
//!
//! ```toml
//! [shm]
//! base_key = 0x5A00
//!
//! [bridge]
//! [bridge.brokers]
//! ctp-sim = "config/ctp-sim.toml"
//!
//! [session]
//! auto_start = true
//! window_start = "09:00"
//! window_end = "15:00"
//!
//! [risk_gate]
//! max_position = 100.0
//! max_loss = -10000.0
//!
//! [metrics]
//! log_level = "info"
//! prometheus_port = 9090
//! ```
//!
//! ### Loading Configuration
//!
//! ```rust
//! use qflow_core::config::Config;
//!
//! let config = Config::load("config/production.toml")?;
//! let config = Config::load_default()?;
//! # Ok::<(), anyhow::Error>(())
//! ```
//!
//! ## Configuration Precedence
//!
//! 1. **Compile-time defaults** - from [`constants`], used as serde field
//!    defaults when a TOML section omits a key.
//! 2. **TOML file** - from `config/*.toml`.
//! 3. **Environment variables** - `QFLOW_*` prefix, double underscore
//!    (`__`) separates nested fields, e.g.
//!    `QFLOW_METRICS__LOG_LEVEL=debug`.
//!
//! ## Available Profiles
//!
//! See [`ConfigProfile`] for pre-built configuration sets: Development,
//! Staging, Production.

pub mod constants;
pub mod profiles;
pub mod types;

pub use constants::*;
pub use profiles::{ConfigProfile, ProfileName};
pub use types::*;

use anyhow::{Context, Result};
use config::{Config as ConfigLoader, Environment, File};
use std::path::Path;

impl Config {
    /// Load configuration from a TOML file, with `QFLOW_` environment
    /// variable overrides layered on top.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config_path = path.as_ref();

        let loader = ConfigLoader::builder()
            .add_source(File::from(config_path))
            .add_source(Environment::with_prefix("QFLOW").separator("__"))
            .build()
            .context("failed to build configuration")?;

        let cfg: Config = loader
            .try_deserialize()
            .context("failed to deserialize configuration")?;

        cfg.validate()?;

        Ok(cfg)
    }

    /// Load from the default location (./config/default.toml)
    pub fn load_default() -> Result<Self> {
        Self::load("config/default.toml")
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.shm.request_capacity == 0 || !self.shm.request_capacity.is_power_of_two() {
            anyhow::bail!("shm.request_capacity must be a power of two");
        }
        if self.shm.response_capacity == 0 || !self.shm.response_capacity.is_power_of_two() {
            anyhow::bail!("shm.response_capacity must be a power of two");
        }
        if self.shm.market_data_capacity == 0 || !self.shm.market_data_capacity.is_power_of_two() {
            anyhow::bail!("shm.market_data_capacity must be a power of two");
        }

        if let (Some(start), Some(end)) = (&self.session.window_start, &self.session.window_end) {
            if start >= end {
                anyhow::bail!(
                    "session.window_start ({start}) must precede session.window_end ({end})"
                );
            }
        }

        if let Some(max_position) = self.risk_gate.max_position {
            if max_position <= 0.0 {
                anyhow::bail!("risk_gate.max_position must be positive");
            }
        }

        if self.risk_gate.emergency_stop_threshold == 0 {
            anyhow::bail!("risk_gate.emergency_stop_threshold must be positive");
        }

        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&self.metrics.log_level.as_str()) {
            anyhow::bail!(
                "invalid log level '{}', must be one of: {:?}",
                self.metrics.log_level,
                valid_log_levels
            );
        }

        let valid_severities = ["Info", "Warning", "Error", "Critical"];
        if !valid_severities.contains(&self.alerts.console_min_severity.as_str()) {
            anyhow::bail!(
                "invalid console_min_severity '{}', must be one of: {:?}",
                self.alerts.console_min_severity,
                valid_severities
            );
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_validation() {
        let mut config = ConfigProfile::development();
        assert!(config.validate().is_ok());

        config.shm.request_capacity = 1000;
        assert!(config.validate().is_err());
        config.shm.request_capacity = 1024;

        config.metrics.log_level = "invalid".to_string();
        assert!(config.validate().is_err());
        config.metrics.log_level = "debug".to_string();

        config.risk_gate.max_position = Some(-1.0);
        assert!(config.validate().is_err());
        config.risk_gate.max_position = Some(100.0);

        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_session_window_order_validated() {
        let mut config = ConfigProfile::staging();
        config.session.window_start = Some("15:00".to_string());
        config.session.window_end = Some("09:00".to_string());
        assert!(config.validate().is_err());
    }
}
