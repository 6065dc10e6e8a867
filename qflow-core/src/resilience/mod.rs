//! Resilience patterns for production deployment
//!
//! Provides robust error handling and recovery mechanisms:
//! - Exponential backoff for retries
//! - Circuit breaker pattern (v2, with half-open probing)
//! - Feed/connection health monitoring and staleness detection
//! - Gap detection for sequence-numbered feeds
//! - A panic hook that logs via `tracing` before unwinding
//! - `KillSwitch`: the POSIX-signal flag pattern that
//!   [`crate::strategy::host::SessionController`] generalizes into a
//!   polled, non-one-shot activate/flatten controller

pub mod backoff;
pub mod circuit_breaker_v2;
pub mod gap_detector;
pub mod health;
pub mod kill_switch;
pub mod panic;
pub mod stale_data;

pub use backoff::{BackoffConfig, ExponentialBackoff};
pub use circuit_breaker_v2::{CircuitBreakerConfig, CircuitBreakerV2, CircuitState};
pub use gap_detector::GapDetector;
pub use health::{FeedHealth, HealthConfig, HealthStatus};
pub use kill_switch::{KillSwitch, KillSwitchState};
pub use panic::install_panic_handler;
pub use stale_data::{StaleDataBreaker, StaleDataConfig, StaleDataState};
