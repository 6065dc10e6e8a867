//! Startup and periodic position reconciliation (§4.8).
//!
//! Generalized from the teacher's `engine::position_reconciliation`
//! (a scalar-position drift counter keyed by fill count) to a per-symbol
//! map compared at startup against broker truth and persisted snapshots,
//! then re-verified on a wall-clock period rather than a fill count.

use crate::bridge::broker::BrokerAdapter;
use crate::errors::ReconcileError;
use crate::strategy::kernel::PositionSnapshot;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;
use std::time::Duration;
use tracing::{info, warn};

pub const DEFAULT_MAX_QUERY_ATTEMPTS: u32 = 15;
pub const DEFAULT_QUERY_RETRY_INTERVAL: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Default)]
pub struct ReconcileOutcome {
    /// Per-symbol net position seeded into the strategies.
    pub seeded: HashMap<String, i64>,
    /// Symbols where broker and snapshot disagreed and were
    /// auto-corrected from broker truth.
    pub corrected: Vec<String>,
    /// Per-symbol `(net_qty, avg_price)` as reported by the broker, for
    /// callers that seed a [`crate::strategy::kernel::StrategyKernel`]
    /// via `initialize_positions_with_cost` rather than just a bare qty.
    pub broker_cost_basis: HashMap<String, (i64, f64)>,
}

#[derive(Debug, Default)]
pub struct ReconcilerStats {
    pub startup_corrections: AtomicU64,
    pub periodic_mismatches: AtomicU64,
}

pub struct PositionReconciler {
    snapshot_dir: PathBuf,
    max_attempts: u32,
    retry_interval: Duration,
    pub stats: ReconcilerStats,
}

impl PositionReconciler {
    pub fn new(snapshot_dir: impl Into<PathBuf>) -> Self {
        Self {
            snapshot_dir: snapshot_dir.into(),
            max_attempts: DEFAULT_MAX_QUERY_ATTEMPTS,
            retry_interval: DEFAULT_QUERY_RETRY_INTERVAL,
            stats: ReconcilerStats::default(),
        }
    }

    /// Query broker positions with retry, distinguishing transient
    /// "not ready" responses (empty table) from permanent failure (the
    /// adapter isn't logged in at all). Returns, per symbol, the net
    /// signed quantity and a volume-weighted average price across that
    /// symbol's reported position entries.
    fn query_broker_with_retry(
        &self,
        broker: &dyn BrokerAdapter,
    ) -> Result<HashMap<String, (i64, f64)>, ReconcileError> {
        for attempt in 1..=self.max_attempts {
            if !broker.is_logged_in() {
                if attempt == self.max_attempts {
                    return Err(ReconcileError::BrokerFailure(
                        "broker never logged in".to_string(),
                    ));
                }
                thread::sleep(self.retry_interval);
                continue;
            }

            let positions = broker.query_positions();
            let mut net = HashMap::new();
            for (symbol, infos) in positions {
                let total: i64 = infos
                    .iter()
                    .map(|p| match p.direction {
                        crate::bridge::broker::Side2::Long => p.volume,
                        crate::bridge::broker::Side2::Short => -p.volume,
                    })
                    .sum();
                let total_volume: i64 = infos.iter().map(|p| p.volume).sum();
                let avg_price = if total_volume != 0 {
                    infos.iter().map(|p| p.avg_price * p.volume as f64).sum::<f64>() / total_volume as f64
                } else {
                    0.0
                };
                net.insert(symbol, (total, avg_price));
            }
            return Ok(net);
        }
        Err(ReconcileError::BrokerNotReady {
            attempts: self.max_attempts,
        })
    }

    fn load_all_snapshots(&self, strategy_ids: &[i32]) -> HashMap<i32, PositionSnapshot> {
        strategy_ids
            .iter()
            .filter_map(|&id| {
                crate::strategy::kernel::StrategyKernel::load_snapshot(id, &self.snapshot_dir)
                    .ok()
                    .map(|s| (id, s))
            })
            .collect()
    }

    fn aggregate_snapshots(snapshots: &HashMap<i32, PositionSnapshot>) -> HashMap<String, i64> {
        let mut agg: HashMap<String, i64> = HashMap::new();
        for snap in snapshots.values() {
            for (symbol, pos) in &snap.symbols_pos {
                *agg.entry(symbol.clone()).or_insert(0) += pos.net_qty;
            }
        }
        agg
    }

    /// Startup reconciliation per §4.8's six-step algorithm. Returns,
    /// per symbol, the net quantity every hosted strategy should be
    /// seeded with (the caller is responsible for splitting this across
    /// strategies that share a symbol — typically only one does).
    pub fn reconcile_startup(
        &self,
        broker: &dyn BrokerAdapter,
        strategy_ids: &[i32],
    ) -> Result<ReconcileOutcome, ReconcileError> {
        let broker_positions = self.query_broker_with_retry(broker)?;
        let broker_qty: HashMap<String, i64> =
            broker_positions.iter().map(|(s, &(qty, _))| (s.clone(), qty)).collect();
        let snapshots = self.load_all_snapshots(strategy_ids);

        if snapshots.is_empty() {
            info!("no persisted snapshots found, seeding strategies from broker truth");
            return Ok(ReconcileOutcome {
                seeded: broker_qty,
                corrected: Vec::new(),
                broker_cost_basis: broker_positions,
            });
        }

        let snapshot_agg = Self::aggregate_snapshots(&snapshots);
        let mut mismatched_symbols = Vec::new();
        let mut all_symbols: Vec<&String> = broker_qty.keys().chain(snapshot_agg.keys()).collect();
        all_symbols.sort();
        all_symbols.dedup();

        for symbol in all_symbols {
            let broker_q = broker_qty.get(symbol).copied().unwrap_or(0);
            let snap_qty = snapshot_agg.get(symbol).copied().unwrap_or(0);
            if broker_q != snap_qty {
                mismatched_symbols.push(symbol.clone());
            }
        }

        if mismatched_symbols.is_empty() {
            info!("startup reconciliation clean, seeding from snapshots");
            return Ok(ReconcileOutcome {
                seeded: snapshot_agg,
                corrected: Vec::new(),
                broker_cost_basis: broker_positions,
            });
        }

        warn!(
            symbols = ?mismatched_symbols,
            "startup position mismatch, auto-correcting from broker truth"
        );
        for &id in strategy_ids {
            let path = self.snapshot_dir.join(format!("{id}.json"));
            let _ = std::fs::remove_file(path);
        }
        self.stats
            .startup_corrections
            .fetch_add(mismatched_symbols.len() as u64, Ordering::Relaxed);

        Ok(ReconcileOutcome {
            seeded: broker_qty,
            corrected: mismatched_symbols,
            broker_cost_basis: broker_positions,
        })
    }

    /// Periodic re-verification (§4.8): diagnostic only, never
    /// self-heals mid-session. Returns symbols that disagree.
    pub fn verify_periodic(
        &self,
        broker: &dyn BrokerAdapter,
        estimated: &HashMap<String, i64>,
    ) -> Vec<String> {
        let broker_positions = match self.query_broker_with_retry(broker) {
            Ok(p) => p,
            Err(e) => {
                warn!(error = %e, "periodic reconciliation could not query broker");
                return Vec::new();
            }
        };

        let mut mismatches = Vec::new();
        for (symbol, &est_qty) in estimated {
            let broker_qty = broker_positions.get(symbol).map(|&(qty, _)| qty).unwrap_or(0);
            if broker_qty != est_qty {
                mismatches.push(symbol.clone());
            }
        }
        if !mismatches.is_empty() {
            self.stats
                .periodic_mismatches
                .fetch_add(mismatches.len() as u64, Ordering::Relaxed);
            warn!(symbols = ?mismatches, "periodic reconciliation mismatch (diagnostic only)");
        }
        mismatches
    }

    pub fn snapshot_dir(&self) -> &Path {
        &self.snapshot_dir
    }
}
