//! Two-tier risk gate (§4.7): per-strategy limits evaluated on a fixed
//! timer, plus a global tier aggregating across every strategy with an
//! emergency-stop trip after repeated consecutive breaches.
//!
//! Grounded on the locked-single-struct discipline used elsewhere in this
//! crate (e.g. [`crate::ledger::PositionLedger`]): narrow update methods
//! behind one lock rather than public field mutation, generalized here to
//! a strategy-keyed table and a bounded alert ring instead of a single
//! account's limits.

use crate::errors::RiskBreach;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateAction {
    Warn,
    Stop,
}

#[derive(Debug, Clone, Copy)]
pub struct StrategyRiskLimits {
    pub max_position: i64,
    pub max_exposure: f64,
    pub stop_loss_floor: f64,
    pub max_loss: f64,
    pub max_rejects: u32,
    pub max_drawdown: f64,
}

impl Default for StrategyRiskLimits {
    fn default() -> Self {
        Self {
            max_position: i64::MAX,
            max_exposure: f64::MAX,
            stop_loss_floor: f64::MIN,
            max_loss: f64::MAX,
            max_rejects: u32::MAX,
            max_drawdown: f64::MAX,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct GlobalRiskLimits {
    pub max_drawdown: f64,
    pub max_daily_loss: f64,
    pub max_exposure: f64,
    pub emergency_stop_threshold: u32,
}

impl Default for GlobalRiskLimits {
    fn default() -> Self {
        Self {
            max_drawdown: f64::MAX,
            max_daily_loss: f64::MAX,
            max_exposure: f64::MAX,
            emergency_stop_threshold: 100,
        }
    }
}

/// Rolling stats a strategy reports each evaluation tick.
#[derive(Debug, Clone, Copy, Default)]
pub struct StrategyRiskSnapshot {
    pub position: i64,
    pub exposure: f64,
    pub pnl: f64,
    pub peak_pnl: f64,
    pub cumulative_loss: f64,
    pub reject_count: u32,
}

impl StrategyRiskSnapshot {
    fn drawdown(&self) -> f64 {
        (self.peak_pnl - self.pnl).max(0.0)
    }
}

#[derive(Debug)]
struct StrategyState {
    limits: StrategyRiskLimits,
    last_eval: Instant,
}

struct Inner {
    strategies: HashMap<i32, StrategyState>,
    alerts: VecDeque<(Instant, RiskBreach)>,
    consecutive_global_breaches: u32,
    emergency_stopped: bool,
}

/// Bound on the in-memory alert ring; matches §4.7's
/// `max_alert_queue_size` default.
const DEFAULT_MAX_ALERT_QUEUE: usize = 512;

pub struct RiskGate {
    eval_period: Duration,
    alert_retention: Duration,
    max_alert_queue: usize,
    global_limits: GlobalRiskLimits,
    inner: Mutex<Inner>,
}

impl RiskGate {
    pub fn new(global_limits: GlobalRiskLimits, eval_period: Duration, alert_retention: Duration) -> Self {
        Self {
            eval_period,
            alert_retention,
            max_alert_queue: DEFAULT_MAX_ALERT_QUEUE,
            global_limits,
            inner: Mutex::new(Inner {
                strategies: HashMap::new(),
                alerts: VecDeque::new(),
                consecutive_global_breaches: 0,
                emergency_stopped: false,
            }),
        }
    }

    pub fn register_strategy(&self, strategy_id: i32, limits: StrategyRiskLimits) {
        self.inner.lock().strategies.insert(
            strategy_id,
            StrategyState {
                limits,
                last_eval: Instant::now(),
            },
        );
    }

    pub fn emergency_stopped(&self) -> bool {
        self.inner.lock().emergency_stopped
    }

    /// Evaluate one strategy's limits if its per-strategy timer has
    /// elapsed. Returns breaches discovered this call (empty if the
    /// timer hasn't elapsed, or nothing breached).
    pub fn evaluate_strategy(
        &self,
        strategy_id: i32,
        snapshot: StrategyRiskSnapshot,
    ) -> Vec<(GateAction, RiskBreach)> {
        let mut inner = self.inner.lock();
        let period = self.eval_period;
        let Some(state) = inner.strategies.get_mut(&strategy_id) else {
            return Vec::new();
        };
        if state.last_eval.elapsed() < period {
            return Vec::new();
        }
        state.last_eval = Instant::now();
        let limits = state.limits;

        let mut breaches = Vec::new();
        if snapshot.position.unsigned_abs() as i64 > limits.max_position {
            breaches.push(RiskBreach::MaxPosition {
                strategy_id,
                current: snapshot.position,
                limit: limits.max_position,
            });
        }
        if snapshot.exposure > limits.max_exposure {
            breaches.push(RiskBreach::MaxExposure {
                strategy_id,
                current: snapshot.exposure,
                limit: limits.max_exposure,
            });
        }
        if snapshot.pnl <= limits.stop_loss_floor {
            breaches.push(RiskBreach::StopLoss {
                strategy_id,
                pnl: snapshot.pnl,
                floor: limits.stop_loss_floor,
            });
        }
        if snapshot.cumulative_loss > limits.max_loss {
            breaches.push(RiskBreach::MaxLoss {
                strategy_id,
                loss: snapshot.cumulative_loss,
                limit: limits.max_loss,
            });
        }
        if snapshot.reject_count > limits.max_rejects {
            breaches.push(RiskBreach::MaxRejects {
                strategy_id,
                count: snapshot.reject_count,
                limit: limits.max_rejects,
            });
        }
        if snapshot.drawdown() > limits.max_drawdown {
            breaches.push(RiskBreach::MaxDrawdown {
                strategy_id,
                drawdown: snapshot.drawdown(),
                limit: limits.max_drawdown,
            });
        }

        let actioned: Vec<(GateAction, RiskBreach)> = breaches
            .into_iter()
            .map(|b| {
                let action = match b {
                    RiskBreach::StopLoss { .. } | RiskBreach::MaxLoss { .. } => GateAction::Stop,
                    _ => GateAction::Warn,
                };
                (action, b)
            })
            .collect();

        for (_, breach) in &actioned {
            Self::push_alert(&mut inner, self.max_alert_queue, breach.clone());
        }
        actioned
    }

    /// Evaluate the global tier from aggregated figures across every
    /// strategy. Trips the emergency stop after
    /// `emergency_stop_threshold` *consecutive* breaching calls.
    pub fn evaluate_global(
        &self,
        drawdown: f64,
        daily_loss: f64,
        exposure: f64,
    ) -> Vec<RiskBreach> {
        let mut inner = self.inner.lock();
        let mut breaches = Vec::new();
        if drawdown > self.global_limits.max_drawdown {
            breaches.push(RiskBreach::GlobalDrawdown {
                current: drawdown,
                limit: self.global_limits.max_drawdown,
            });
        }
        if daily_loss > self.global_limits.max_daily_loss {
            breaches.push(RiskBreach::GlobalDailyLoss {
                current: daily_loss,
                limit: self.global_limits.max_daily_loss,
            });
        }
        if exposure > self.global_limits.max_exposure {
            breaches.push(RiskBreach::GlobalExposure {
                current: exposure,
                limit: self.global_limits.max_exposure,
            });
        }

        if breaches.is_empty() {
            inner.consecutive_global_breaches = 0;
        } else {
            inner.consecutive_global_breaches += 1;
            if inner.consecutive_global_breaches >= self.global_limits.emergency_stop_threshold
                && !inner.emergency_stopped
            {
                inner.emergency_stopped = true;
                let stop = RiskBreach::EmergencyStop {
                    count: inner.consecutive_global_breaches,
                };
                warn!(?stop, "emergency stop tripped");
                breaches.push(stop.clone());
                Self::push_alert(&mut inner, self.max_alert_queue, stop);
            }
        }

        for b in &breaches {
            Self::push_alert(&mut inner, self.max_alert_queue, b.clone());
        }
        breaches
    }

    fn push_alert(inner: &mut Inner, max_queue: usize, breach: RiskBreach) {
        let now = Instant::now();
        inner.alerts.push_back((now, breach));
        while inner.alerts.len() > max_queue {
            inner.alerts.pop_front();
        }
    }

    /// Drain alerts older than `alert_retention` and return everything
    /// currently held.
    pub fn alerts(&self) -> Vec<RiskBreach> {
        let mut inner = self.inner.lock();
        let retention = self.alert_retention;
        inner
            .alerts
            .retain(|(t, _)| t.elapsed() < retention);
        inner.alerts.iter().map(|(_, b)| b.clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn position_breach_is_reported_as_warn() {
        let gate = RiskGate::new(GlobalRiskLimits::default(), Duration::ZERO, Duration::from_secs(60));
        gate.register_strategy(
            1,
            StrategyRiskLimits {
                max_position: 10,
                ..Default::default()
            },
        );
        let breaches = gate.evaluate_strategy(
            1,
            StrategyRiskSnapshot {
                position: 11,
                ..Default::default()
            },
        );
        assert_eq!(breaches.len(), 1);
        assert_eq!(breaches[0].0, GateAction::Warn);
    }

    #[test]
    fn stop_loss_breach_is_reported_as_stop() {
        let gate = RiskGate::new(GlobalRiskLimits::default(), Duration::ZERO, Duration::from_secs(60));
        gate.register_strategy(
            1,
            StrategyRiskLimits {
                stop_loss_floor: -1000.0,
                ..Default::default()
            },
        );
        let breaches = gate.evaluate_strategy(
            1,
            StrategyRiskSnapshot {
                pnl: -1500.0,
                ..Default::default()
            },
        );
        assert_eq!(breaches.len(), 1);
        assert_eq!(breaches[0].0, GateAction::Stop);
    }

    #[test]
    fn emergency_stop_trips_after_threshold_consecutive_breaches() {
        let gate = RiskGate::new(
            GlobalRiskLimits {
                max_drawdown: 100.0,
                emergency_stop_threshold: 3,
                ..Default::default()
            },
            Duration::ZERO,
            Duration::from_secs(60),
        );
        for _ in 0..2 {
            gate.evaluate_global(200.0, 0.0, 0.0);
            assert!(!gate.emergency_stopped());
        }
        gate.evaluate_global(200.0, 0.0, 0.0);
        assert!(gate.emergency_stopped());
    }

    #[test]
    fn a_clean_global_tick_resets_the_consecutive_counter() {
        let gate = RiskGate::new(
            GlobalRiskLimits {
                max_drawdown: 100.0,
                emergency_stop_threshold: 3,
                ..Default::default()
            },
            Duration::ZERO,
            Duration::from_secs(60),
        );
        gate.evaluate_global(200.0, 0.0, 0.0);
        gate.evaluate_global(0.0, 0.0, 0.0);
        gate.evaluate_global(200.0, 0.0, 0.0);
        gate.evaluate_global(200.0, 0.0, 0.0);
        // Only 2 consecutive breaches since the reset, below the threshold.
        assert!(!gate.emergency_stopped());
    }

    #[test]
    fn alert_queue_is_bounded() {
        let gate = RiskGate::new(GlobalRiskLimits::default(), Duration::ZERO, Duration::from_secs(60));
        gate.register_strategy(
            1,
            StrategyRiskLimits {
                max_rejects: 0,
                ..Default::default()
            },
        );
        for i in 0..600 {
            gate.evaluate_strategy(
                1,
                StrategyRiskSnapshot {
                    reject_count: 1 + i,
                    ..Default::default()
                },
            );
        }
        assert!(gate.alerts().len() <= DEFAULT_MAX_ALERT_QUEUE);
    }
}
