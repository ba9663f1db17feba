//! Personal metric baselines
//!
//! A baseline is the mean and sample standard deviation of a metric over a
//! lookback window (30 days by default). It is only trusted once at least
//! [`MIN_SAMPLES`] readings back it; with fewer, no baseline is produced and the
//! previous one stays in place.
//!
//! Baselines are process-wide state held by [`BaselineStore`] and persisted as
//! named records (`baseline.hrv`, `baseline.resting_hr`) in a [`SettingsStore`].
//! Recomputation computes every metric first and only then replaces stored
//! baselines, so dropping a recomputation future part way leaves the prior
//! baselines untouched.

use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use statrs::statistics::Statistics;
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use tracing::{debug, info, warn};

use crate::cache::MetricCache;
use crate::error::StoreError;
use crate::models::MetricKind;

/// Fewest samples a baseline may be computed from
pub const MIN_SAMPLES: usize = 10;

/// Mean and spread of a metric over the lookback window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Baseline {
    pub metric: MetricKind,
    pub mean: f64,
    #[serde(rename = "stddev")]
    pub std_dev: f64,
    pub sample_count: usize,
    pub computed_at: DateTime<Utc>,
}

impl Baseline {
    /// Baseline over `values`, or `None` with fewer than [`MIN_SAMPLES`] values
    pub fn from_values(metric: MetricKind, values: &[f64], computed_at: DateTime<Utc>) -> Option<Self> {
        Self::with_min_samples(metric, values, MIN_SAMPLES, computed_at)
    }

    /// Like [`from_values`](Self::from_values) with a stricter minimum; never below [`MIN_SAMPLES`]
    pub fn with_min_samples(
        metric: MetricKind,
        values: &[f64],
        min_samples: usize,
        computed_at: DateTime<Utc>,
    ) -> Option<Self> {
        let finite: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
        if finite.len() < min_samples.max(MIN_SAMPLES) {
            return None;
        }

        Some(Baseline {
            metric,
            mean: finite.iter().mean(),
            std_dev: finite.iter().std_dev(),
            sample_count: finite.len(),
            computed_at,
        })
    }

    pub fn is_valid(&self) -> bool {
        self.sample_count >= MIN_SAMPLES && self.mean.is_finite() && self.std_dev.is_finite()
    }

    /// Standard score of `value`; `None` when the baseline has no spread
    pub fn z_score(&self, value: f64) -> Option<f64> {
        (self.std_dev > 0.0).then(|| (value - self.mean) / self.std_dev)
    }

    /// Settings key under which a metric's baseline is persisted
    pub fn settings_key(metric: MetricKind) -> String {
        format!("baseline.{}", metric.key())
    }
}

/// Baseline calculation configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BaselineConfig {
    /// Days of history read per metric
    pub lookback_days: u32,

    /// Fewest samples accepted
    pub min_samples: usize,

    /// Metrics that carry a baseline
    pub metrics: Vec<MetricKind>,
}

impl Default for BaselineConfig {
    fn default() -> Self {
        BaselineConfig {
            lookback_days: 30,
            min_samples: MIN_SAMPLES,
            metrics: vec![MetricKind::Hrv, MetricKind::RestingHeartRate],
        }
    }
}

/// Key-value settings storage
pub trait SettingsStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<Value>, StoreError>;

    fn set(&self, key: &str, value: Value) -> Result<(), StoreError>;

    /// Write several entries. The default writes them one at a time, so a
    /// failure part way leaves the earlier entries written; stores that can
    /// commit them together override it.
    fn set_many(&self, entries: Vec<(String, Value)>) -> Result<(), StoreError> {
        for (key, value) in entries {
            self.set(&key, value)?;
        }
        Ok(())
    }
}

/// Settings held in memory only
#[derive(Debug, Default)]
pub struct MemorySettingsStore {
    values: Mutex<HashMap<String, Value>>,
}

impl MemorySettingsStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SettingsStore for MemorySettingsStore {
    fn get(&self, key: &str) -> Result<Option<Value>, StoreError> {
        let values = self.values.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(values.get(key).cloned())
    }

    fn set(&self, key: &str, value: Value) -> Result<(), StoreError> {
        let mut values = self.values.lock().unwrap_or_else(PoisonError::into_inner);
        values.insert(key.to_string(), value);
        Ok(())
    }

    fn set_many(&self, entries: Vec<(String, Value)>) -> Result<(), StoreError> {
        let mut values = self.values.lock().unwrap_or_else(PoisonError::into_inner);
        values.extend(entries);
        Ok(())
    }
}

/// Settings persisted as one JSON object in a file
///
/// Writes go to a sibling temp file that is renamed over the original, so a
/// crash never leaves a half-written settings file behind.
#[derive(Debug)]
pub struct JsonSettingsStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonSettingsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        JsonSettingsStore {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> Result<BTreeMap<String, Value>, StoreError> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }

        let content = fs::read_to_string(&self.path).map_err(|e| StoreError::Unavailable {
            reason: format!("{}: {}", self.path.display(), e),
        })?;

        serde_json::from_str(&content).map_err(|e| StoreError::Corrupted {
            path: self.path.clone(),
            reason: e.to_string(),
        })
    }

    fn write_all(&self, key: &str, values: &BTreeMap<String, Value>) -> Result<(), StoreError> {
        let write_failed = |reason: String| StoreError::WriteFailed {
            key: key.to_string(),
            reason,
        };

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| write_failed(e.to_string()))?;
        }

        let content = serde_json::to_string_pretty(values).map_err(|e| write_failed(e.to_string()))?;
        let temp_path = self.path.with_extension("json.tmp");
        fs::write(&temp_path, content).map_err(|e| write_failed(e.to_string()))?;
        fs::rename(&temp_path, &self.path).map_err(|e| write_failed(e.to_string()))
    }
}

impl SettingsStore for JsonSettingsStore {
    fn get(&self, key: &str) -> Result<Option<Value>, StoreError> {
        Ok(self.read_all()?.remove(key))
    }

    fn set(&self, key: &str, value: Value) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut values = self.read_all()?;
        values.insert(key.to_string(), value);
        self.write_all(key, &values)
    }

    /// All entries land in a single file replacement
    fn set_many(&self, entries: Vec<(String, Value)>) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let keys = entries.iter().map(|(key, _)| key.as_str()).collect::<Vec<_>>().join(", ");
        let mut values = self.read_all()?;
        values.extend(entries);
        self.write_all(&keys, &values)
    }
}

/// Current baselines, shared across the process
pub struct BaselineStore {
    settings: Arc<dyn SettingsStore>,
    current: RwLock<HashMap<MetricKind, Baseline>>,
}

impl BaselineStore {
    /// Load persisted baselines for `metrics`; unreadable or invalid records are skipped
    pub fn load(settings: Arc<dyn SettingsStore>, metrics: &[MetricKind]) -> Self {
        let mut current = HashMap::new();

        for &metric in metrics {
            let key = Baseline::settings_key(metric);
            match settings.get(&key) {
                Ok(Some(value)) => match serde_json::from_value::<Baseline>(value) {
                    Ok(baseline) if baseline.metric == metric && baseline.is_valid() => {
                        debug!(metric = %metric, mean = baseline.mean, "Loaded stored baseline");
                        current.insert(metric, baseline);
                    }
                    Ok(_) => warn!(key = %key, "Ignoring invalid stored baseline"),
                    Err(e) => warn!(key = %key, error = %e, "Ignoring unreadable stored baseline"),
                },
                Ok(None) => debug!(key = %key, "No stored baseline"),
                Err(e) => warn!(key = %key, error = %e, "Could not read stored baseline"),
            }
        }

        BaselineStore {
            settings,
            current: RwLock::new(current),
        }
    }

    /// Store without persisted history
    pub fn in_memory() -> Self {
        Self::load(Arc::new(MemorySettingsStore::new()), &[])
    }

    pub fn get(&self, metric: MetricKind) -> Option<Baseline> {
        let current = self.current.read().unwrap_or_else(PoisonError::into_inner);
        current.get(&metric).cloned()
    }

    /// All current baselines, ordered by metric
    pub fn snapshot(&self) -> Vec<Baseline> {
        let current = self.current.read().unwrap_or_else(PoisonError::into_inner);
        let mut baselines: Vec<Baseline> = current.values().cloned().collect();
        baselines.sort_by_key(|b| b.metric);
        baselines
    }

    /// Persist `baselines` in one settings write, then swap them in under one
    /// write lock.
    ///
    /// Nothing in memory changes if persisting fails. With a settings store
    /// that cannot write entries together, a failure part way may still leave
    /// some records on disk that the next [`load`](Self::load) picks up.
    pub fn replace(&self, baselines: Vec<Baseline>) -> Result<(), StoreError> {
        if baselines.is_empty() {
            return Ok(());
        }

        let entries = baselines
            .iter()
            .map(|baseline| {
                let key = Baseline::settings_key(baseline.metric);
                serde_json::to_value(baseline)
                    .map(|value| (key.clone(), value))
                    .map_err(|e| StoreError::WriteFailed {
                        key,
                        reason: e.to_string(),
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;
        self.settings.set_many(entries)?;

        let mut current = self.current.write().unwrap_or_else(PoisonError::into_inner);
        for baseline in baselines {
            info!(
                metric = %baseline.metric,
                mean = baseline.mean,
                std_dev = baseline.std_dev,
                samples = baseline.sample_count,
                "Baseline replaced"
            );
            current.insert(baseline.metric, baseline);
        }
        Ok(())
    }
}

/// Outcome of a recomputation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecomputeSummary {
    /// Metrics whose baseline was replaced
    pub updated: Vec<MetricKind>,

    /// Metrics with too few samples; their previous baseline is kept
    pub insufficient: Vec<MetricKind>,
}

/// Computes baselines from cached biometric history
pub struct BaselineCalculator {
    cache: Arc<MetricCache>,
    store: Arc<BaselineStore>,
    config: BaselineConfig,
}

impl BaselineCalculator {
    pub fn new(cache: Arc<MetricCache>, store: Arc<BaselineStore>) -> Self {
        Self::with_config(cache, store, BaselineConfig::default())
    }

    pub fn with_config(cache: Arc<MetricCache>, store: Arc<BaselineStore>, config: BaselineConfig) -> Self {
        BaselineCalculator { cache, store, config }
    }

    pub fn config(&self) -> &BaselineConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<BaselineStore> {
        &self.store
    }

    /// Baseline of one metric over the lookback window, without storing it
    pub async fn compute(&self, metric: MetricKind) -> Option<Baseline> {
        let samples = self.cache.history(metric, self.config.lookback_days).await;
        let values: Vec<f64> = samples.iter().map(|s| s.value).collect();

        let baseline = Baseline::with_min_samples(metric, &values, self.config.min_samples, Utc::now());
        if baseline.is_none() {
            debug!(
                metric = %metric,
                samples = values.len(),
                required = self.config.min_samples,
                "Not enough samples for a baseline"
            );
        }
        baseline
    }

    /// Recompute every configured metric and replace the stored baselines
    pub async fn recompute(&self) -> Result<RecomputeSummary, StoreError> {
        let computed = join_all(self.config.metrics.iter().map(|&metric| async move {
            (metric, self.compute(metric).await)
        }))
        .await;

        self.apply(computed)
    }

    /// Recompute and replace a single metric's baseline
    pub async fn recompute_metric(&self, metric: MetricKind) -> Result<RecomputeSummary, StoreError> {
        let baseline = self.compute(metric).await;
        self.apply(vec![(metric, baseline)])
    }

    fn apply(&self, computed: Vec<(MetricKind, Option<Baseline>)>) -> Result<RecomputeSummary, StoreError> {
        let mut summary = RecomputeSummary::default();
        let mut fresh = Vec::new();

        for (metric, baseline) in computed {
            match baseline {
                Some(baseline) => {
                    summary.updated.push(metric);
                    fresh.push(baseline);
                }
                None => summary.insufficient.push(metric),
            }
        }

        self.store.replace(fresh)?;
        Ok(summary)
    }
}
