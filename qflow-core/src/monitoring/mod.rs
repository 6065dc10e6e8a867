//! Monitoring and observability module
//!
//! Provides Prometheus metrics export, an HTTP server for scraping, and
//! an alerting system for rule-based breach notification.

pub mod alert_rules;
pub mod alerts;
pub mod metrics;
pub mod server;

pub use alert_rules::{AlertRule, RuleContext, RuleEngine};
pub use alerts::{
    Alert, AlertCategory, AlertId, AlertManager, AlertManagerConfig, AlertOutput, AlertSeverity,
};
pub use metrics::{
    MetricsRegistry, PerformanceMetrics, RiskMetrics, SystemMetrics, TradingMetrics,
};
pub use server::{MetricsServer, MetricsServerConfig};
