//! Compile-time defaults for the futures trading system.
//!
//! Mirrors the teacher's approach of keeping hot-path tunables as
//! `const`s rather than runtime lookups; unlike the teacher's Cargo
//! feature matrix (one feature per BTC position-size tier), these are
//! plain defaults overridden through [`super::types::Config`] at
//! runtime, since symbol/venue-specific limits don't fit a fixed set of
//! feature combinations.

/// Default SysV shared-memory queue capacities (§shm, keys module).
pub const DEFAULT_REQUEST_QUEUE_CAPACITY: usize = 4096;
pub const DEFAULT_RESPONSE_QUEUE_CAPACITY: usize = 4096;
pub const DEFAULT_MARKET_DATA_QUEUE_CAPACITY: usize = 65536;

/// Bridge: attempts to enqueue a response before dropping and counting.
pub const DEFAULT_RESPONSE_ENQUEUE_MAX_ATTEMPTS: u32 = 10_000;

/// Bridge and market-data poll loops: idle sleep between empty polls.
pub const DEFAULT_POLL_IDLE_SLEEP_MICROS: u64 = 100;

/// Risk gate: bounded alert ring capacity.
pub const DEFAULT_MAX_ALERT_QUEUE: usize = 512;

/// Risk gate: consecutive global breaches before tripping the
/// emergency stop.
pub const DEFAULT_EMERGENCY_STOP_THRESHOLD: u32 = 100;

/// Reconciliation: broker query retry budget.
pub const DEFAULT_RECONCILE_MAX_QUERY_ATTEMPTS: u32 = 15;
pub const DEFAULT_RECONCILE_QUERY_RETRY_SECS: u64 = 2;

/// Parameter watcher: bounded reload-history ring.
pub const DEFAULT_PARAM_HISTORY_CAP: usize = 100;

/// Session controller: trading-window poll period.
pub const DEFAULT_SESSION_POLL_SECS: u64 = 1;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn queue_capacities_are_powers_of_two() {
        for cap in [
            DEFAULT_REQUEST_QUEUE_CAPACITY,
            DEFAULT_RESPONSE_QUEUE_CAPACITY,
            DEFAULT_MARKET_DATA_QUEUE_CAPACITY,
        ] {
            assert!(cap.is_power_of_two());
        }
    }

    #[test]
    fn retry_and_backoff_budgets_are_positive() {
        assert!(DEFAULT_RESPONSE_ENQUEUE_MAX_ATTEMPTS > 0);
        assert!(DEFAULT_RECONCILE_MAX_QUERY_ATTEMPTS > 0);
        assert!(DEFAULT_EMERGENCY_STOP_THRESHOLD > 0);
    }
}
