//! Model-file hot-reload watcher (§4.9, §6).
//!
//! The model file is line-oriented keyword/value text
//! (`BEGIN_PLACE 2.0`, `SIZE 4`, ...), translated through a
//! watcher-owned dictionary into strategy-parameter keys
//! (`entry_zscore`, `order_size`, ...). Polling-by-mtime and a bounded
//! history ring mirror the config-reload pattern in
//! `config::types`'s hot-reloadable sections, generalized to file
//! watching instead of in-process signal-driven reload.

use crate::errors::ParamError;
use crate::strategy::host::StrategyHost;
use std::collections::{HashMap, VecDeque};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{info, warn};

const HISTORY_CAP: usize = 100;

#[derive(Debug, Clone)]
pub struct HistoryRecord {
    pub timestamp: u64,
    pub file_path: String,
    pub params_after: HashMap<String, f64>,
    pub success: bool,
    pub error_msg: Option<String>,
}

/// A single validated range for one model key, keyed by the
/// strategy-facing parameter name it maps to.
#[derive(Debug, Clone, Copy)]
pub struct KeySpec {
    pub min: f64,
    pub max: f64,
    pub required: bool,
}

pub struct ParameterWatcher {
    model_path: PathBuf,
    /// model keyword → strategy-parameter name
    key_map: HashMap<String, String>,
    /// strategy-parameter name → validation range
    schema: HashMap<String, KeySpec>,
    last_mtime: Option<SystemTime>,
    history: VecDeque<HistoryRecord>,
}

impl ParameterWatcher {
    pub fn new(
        model_path: impl Into<PathBuf>,
        key_map: HashMap<String, String>,
        schema: HashMap<String, KeySpec>,
    ) -> Self {
        Self {
            model_path: model_path.into(),
            key_map,
            schema,
            last_mtime: None,
            history: VecDeque::new(),
        }
    }

    fn now_secs() -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs()
    }

    /// Auto mode: checks the file's mtime and reloads only if it
    /// changed since the last check.
    pub fn poll(&mut self, host: &StrategyHost) -> Option<bool> {
        let mtime = fs::metadata(&self.model_path).ok()?.modified().ok()?;
        if self.last_mtime == Some(mtime) {
            return None;
        }
        self.last_mtime = Some(mtime);
        Some(self.reload(host))
    }

    /// Manual mode: parse, validate, translate, and apply regardless of
    /// mtime. Returns aggregated success (true only if every hosted
    /// strategy accepted the new map).
    pub fn reload(&mut self, host: &StrategyHost) -> bool {
        let result = self.parse_and_validate();
        let (params, success, error_msg) = match result {
            Ok(params) => (params, true, None),
            Err(e) => (HashMap::new(), false, Some(e.to_string())),
        };

        let mut all_ok = success;
        if success {
            all_ok = self.apply_to_all(host, &params);
        }

        self.push_history(HistoryRecord {
            timestamp: Self::now_secs(),
            file_path: self.model_path.display().to_string(),
            params_after: params,
            success: all_ok,
            error_msg,
        });

        all_ok
    }

    fn parse_and_validate(&self) -> Result<HashMap<String, f64>, ParamError> {
        let text = fs::read_to_string(&self.model_path)
            .map_err(|_| ParamError::FileMissing(self.model_path.display().to_string()))?;

        let mut raw = HashMap::new();
        for (line_no, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let mut parts = line.split_whitespace();
            let key = parts.next().ok_or_else(|| ParamError::Parse {
                line: line_no + 1,
                message: "missing key".to_string(),
            })?;
            let value: f64 = parts
                .next()
                .ok_or_else(|| ParamError::Parse {
                    line: line_no + 1,
                    message: "missing value".to_string(),
                })?
                .parse()
                .map_err(|_| ParamError::Parse {
                    line: line_no + 1,
                    message: format!("value for '{key}' is not a number"),
                })?;
            raw.insert(key.to_string(), value);
        }

        let mut translated = HashMap::new();
        for (model_key, value) in &raw {
            let strategy_key = self
                .key_map
                .get(model_key)
                .ok_or_else(|| ParamError::UnmappedKey(model_key.clone()))?;
            translated.insert(strategy_key.clone(), *value);
        }

        for (key, spec) in &self.schema {
            match translated.get(key) {
                Some(&v) if v < spec.min || v > spec.max => {
                    return Err(ParamError::Validation {
                        key: key.clone(),
                        message: format!("{v} outside [{}, {}]", spec.min, spec.max),
                    });
                }
                None if spec.required => {
                    return Err(ParamError::Validation {
                        key: key.clone(),
                        message: "required key missing".to_string(),
                    });
                }
                _ => {}
            }
        }

        Ok(translated)
    }

    /// Best-effort per strategy: a failing strategy doesn't roll back
    /// ones that already succeeded.
    fn apply_to_all(&self, host: &StrategyHost, params: &HashMap<String, f64>) -> bool {
        // `StrategyHost` doesn't expose a strategy-id iterator directly
        // (kept private to the host), so callers pass the ids they host;
        // here we rely on `with_strategy` failing silently for unknown
        // ids and instead broadcast through a dedicated method.
        host.broadcast_parameters(params.clone())
    }

    fn push_history(&mut self, record: HistoryRecord) {
        self.history.push_back(record);
        while self.history.len() > HISTORY_CAP {
            self.history.pop_front();
        }
    }

    pub fn history(&self) -> &VecDeque<HistoryRecord> {
        &self.history
    }

    pub fn model_path(&self) -> &Path {
        &self.model_path
    }
}

/// Default mapping for the example model-file dialect in §6:
/// `BEGIN_PLACE` → order entry z-score threshold, `SIZE` → order size.
pub fn default_key_map() -> HashMap<String, String> {
    HashMap::from([
        ("BEGIN_PLACE".to_string(), "entry_zscore".to_string()),
        ("SIZE".to_string(), "order_size".to_string()),
    ])
}

pub fn default_schema() -> HashMap<String, KeySpec> {
    HashMap::from([
        (
            "entry_zscore".to_string(),
            KeySpec { min: 0.0, max: 10.0, required: true },
        ),
        (
            "order_size".to_string(),
            KeySpec { min: 1.0, max: 10_000.0, required: true },
        ),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::kernel::StrategyKernel;
    use tempfile::tempdir;

    fn host_with_one_strategy() -> (StrategyHost, i32) {
        let session = crate::strategy::host::SessionController::new(false, false);
        let mut host = StrategyHost::new(session);
        host.add_strategy(
            StrategyKernel::new(1, vec!["ag2506".into()], "/tmp"),
            vec!["ag2506".into()],
            crate::strategy::host::Allocation { fraction: 1.0, min_alloc: 0.0, max_alloc: 1.0 },
        )
        .unwrap();
        (host, 1)
    }

    #[test]
    fn parses_translates_and_applies_valid_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("model.txt");
        fs::write(&path, "BEGIN_PLACE 2.0\nSIZE 4\n").unwrap();

        let mut watcher = ParameterWatcher::new(&path, default_key_map(), default_schema());
        let (host, strategy_id) = host_with_one_strategy();
        assert!(watcher.reload(&host));

        host.with_strategy(strategy_id, |k| {
            assert_eq!(k.parameter("entry_zscore"), Some(2.0));
            assert_eq!(k.parameter("order_size"), Some(4.0));
        });
        assert_eq!(watcher.history().len(), 1);
        assert!(watcher.history()[0].success);
    }

    #[test]
    fn out_of_range_value_rejects_reload_and_keeps_prior_params() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("model.txt");
        fs::write(&path, "BEGIN_PLACE 2.0\nSIZE 4\n").unwrap();
        let mut watcher = ParameterWatcher::new(&path, default_key_map(), default_schema());
        let (host, strategy_id) = host_with_one_strategy();
        watcher.reload(&host);

        fs::write(&path, "BEGIN_PLACE 99.0\nSIZE 4\n").unwrap();
        assert!(!watcher.reload(&host));

        host.with_strategy(strategy_id, |k| {
            assert_eq!(k.parameter("entry_zscore"), Some(2.0));
        });
    }

    #[test]
    fn unmapped_key_fails_the_whole_reload() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("model.txt");
        fs::write(&path, "MYSTERY_KEY 1.0\n").unwrap();
        let mut watcher = ParameterWatcher::new(&path, default_key_map(), default_schema());
        let (host, _id) = host_with_one_strategy();
        assert!(!watcher.reload(&host));
        assert!(!watcher.history()[0].success);
    }

    #[test]
    fn history_ring_is_bounded() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("model.txt");
        fs::write(&path, "BEGIN_PLACE 2.0\nSIZE 4\n").unwrap();
        let mut watcher = ParameterWatcher::new(&path, default_key_map(), default_schema());
        let (host, _id) = host_with_one_strategy();
        for _ in 0..150 {
            watcher.reload(&host);
        }
        assert_eq!(watcher.history().len(), HISTORY_CAP);
    }

    #[test]
    fn poll_only_reloads_when_mtime_changes() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("model.txt");
        fs::write(&path, "BEGIN_PLACE 2.0\nSIZE 4\n").unwrap();
        let mut watcher = ParameterWatcher::new(&path, default_key_map(), default_schema());
        let (host, _id) = host_with_one_strategy();

        assert!(watcher.poll(&host).is_some());
        assert!(watcher.poll(&host).is_none());
    }
}
