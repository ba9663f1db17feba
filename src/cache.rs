//! TTL cache with single-flight loading in front of the biometric source
//!
//! Features:
//! - Per-metric time-to-live
//! - Concurrent misses for the same key coalesce into one source query
//! - Forced refresh that ignores the TTL
//! - Failures are shared with every waiting caller but never cached
//! - Hit/miss/coalesced/failure metrics
//!
//! Cache state sits behind a synchronous mutex that is never held across an
//! await. A pending query is a shared future; the in-flight map keeps a weak
//! handle to it so later callers can join. The future itself writes the result
//! back and clears its in-flight entry, so that bookkeeping runs exactly once
//! however many callers await it. Dropping every waiter drops the query, which
//! clears the in-flight entry and leaves the previous cache entry in place.

use chrono::Utc;
use futures::future::{BoxFuture, FutureExt, Shared, WeakShared};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::biometrics::BiometricSource;
use crate::error::SourceError;
use crate::models::{BiometricSample, DateRange, MetricKind};

/// Samples of one cached query, newest first
pub type SampleSet = Arc<Vec<BiometricSample>>;

type FlightResult = Result<SampleSet, SourceError>;
type Flight = Shared<BoxFuture<'static, FlightResult>>;
type WeakFlight = WeakShared<BoxFuture<'static, FlightResult>>;

/// Cache configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheConfig {
    pub hrv_ttl_secs: u64,
    pub resting_hr_ttl_secs: u64,
    pub sleep_ttl_secs: u64,
    pub workout_ttl_secs: u64,
    pub cycle_ttl_secs: u64,

    /// Days searched when asking for the latest value of a metric
    pub latest_lookback_days: u32,

    /// Maximum samples requested per query (None for no limit)
    pub sample_limit: Option<usize>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        CacheConfig {
            hrv_ttl_secs: 30 * 60,
            resting_hr_ttl_secs: 60 * 60,
            sleep_ttl_secs: 6 * 60 * 60,
            workout_ttl_secs: 6 * 60 * 60,
            cycle_ttl_secs: 6 * 60 * 60,
            latest_lookback_days: 7,
            sample_limit: None,
        }
    }
}

impl CacheConfig {
    pub fn ttl_for(&self, metric: MetricKind) -> Duration {
        let secs = match metric {
            MetricKind::Hrv => self.hrv_ttl_secs,
            MetricKind::RestingHeartRate => self.resting_hr_ttl_secs,
            MetricKind::SleepHours => self.sleep_ttl_secs,
            MetricKind::WorkoutMinutes => self.workout_ttl_secs,
            MetricKind::CycleDay => self.cycle_ttl_secs,
        };
        Duration::from_secs(secs)
    }
}

/// What a cache entry holds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CacheKey {
    /// Recent samples, used to answer "latest value"
    Latest(MetricKind),
    /// A longer history window, used for baselines
    History { metric: MetricKind, days: u32 },
}

impl CacheKey {
    pub fn metric(&self) -> MetricKind {
        match self {
            CacheKey::Latest(metric) => *metric,
            CacheKey::History { metric, .. } => *metric,
        }
    }

    fn lookback_days(&self, config: &CacheConfig) -> u32 {
        match self {
            CacheKey::Latest(_) => config.latest_lookback_days,
            CacheKey::History { days, .. } => *days,
        }
    }
}

/// Cache statistics and metrics
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CacheMetrics {
    pub total_lookups: u64,
    pub cache_hits: u64,
    /// Lookups that started a source query
    pub cache_misses: u64,
    /// Lookups that joined a query already in flight
    pub coalesced: u64,
    pub forced_refreshes: u64,
    pub failures: u64,
}

impl CacheMetrics {
    /// Get hit rate as percentage
    pub fn hit_rate(&self) -> f64 {
        if self.total_lookups == 0 {
            return 0.0;
        }
        (self.cache_hits as f64 / self.total_lookups as f64) * 100.0
    }

    /// Source queries actually issued
    pub fn queries_issued(&self) -> u64 {
        self.cache_misses + self.forced_refreshes
    }
}

struct CacheEntry {
    samples: SampleSet,
    fetched_at: Instant,
    generation: u64,
}

/// Only waiters hold the query alive; the map keeps a weak handle
struct InFlight {
    generation: u64,
    started_at: Instant,
    flight: WeakFlight,
}

#[derive(Default)]
struct CacheState {
    entries: HashMap<CacheKey, CacheEntry>,
    in_flight: HashMap<CacheKey, InFlight>,
    next_generation: u64,
    metrics: CacheMetrics,
}

fn lock(state: &Mutex<CacheState>) -> MutexGuard<'_, CacheState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Diagnostic view of a query in flight
#[derive(Debug, Clone, PartialEq)]
pub struct InFlightQuery {
    pub key: CacheKey,
    pub generation: u64,
    pub elapsed: Duration,
}

/// Removes the in-flight entry if the query is dropped before it completes
struct FlightGuard {
    state: Arc<Mutex<CacheState>>,
    key: CacheKey,
    generation: u64,
    completed: bool,
}

impl FlightGuard {
    fn complete(mut self, result: &FlightResult) {
        let mut state = lock(&self.state);

        if state
            .in_flight
            .get(&self.key)
            .is_some_and(|f| f.generation == self.generation)
        {
            state.in_flight.remove(&self.key);
        }

        match result {
            Ok(samples) => {
                let newer_cached = state
                    .entries
                    .get(&self.key)
                    .is_some_and(|e| e.generation > self.generation);
                if !newer_cached {
                    state.entries.insert(
                        self.key,
                        CacheEntry {
                            samples: Arc::clone(samples),
                            fetched_at: Instant::now(),
                            generation: self.generation,
                        },
                    );
                }
                debug!(key = ?self.key, samples = samples.len(), "Cache populated");
            }
            Err(e) => {
                state.metrics.failures += 1;
                warn!(key = ?self.key, error = %e, "Biometric query failed; nothing cached");
            }
        }

        self.completed = true;
    }
}

impl Drop for FlightGuard {
    fn drop(&mut self) {
        if self.completed {
            return;
        }
        let mut state = lock(&self.state);
        if state
            .in_flight
            .get(&self.key)
            .is_some_and(|f| f.generation == self.generation)
        {
            state.in_flight.remove(&self.key);
            debug!(key = ?self.key, "Cancelled query removed from in-flight set");
        }
    }
}

/// TTL, single-flight cache over a biometric source
pub struct MetricCache {
    source: Arc<dyn BiometricSource>,
    config: CacheConfig,
    state: Arc<Mutex<CacheState>>,
}

impl MetricCache {
    pub fn new(source: Arc<dyn BiometricSource>) -> Self {
        Self::with_config(source, CacheConfig::default())
    }

    pub fn with_config(source: Arc<dyn BiometricSource>, config: CacheConfig) -> Self {
        MetricCache {
            source,
            config,
            state: Arc::new(Mutex::new(CacheState::default())),
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Most recent sample of `metric` within its lookback window
    pub async fn latest(&self, metric: MetricKind) -> Option<BiometricSample> {
        let samples = self.fetch(CacheKey::Latest(metric), false).await?;
        samples.first().cloned()
    }

    /// Like [`latest`](Self::latest) but always queries the source
    pub async fn refresh(&self, metric: MetricKind) -> Option<BiometricSample> {
        let samples = self.fetch(CacheKey::Latest(metric), true).await?;
        samples.first().cloned()
    }

    /// Samples of `metric` over the last `days` days, newest first; empty on failure
    pub async fn history(&self, metric: MetricKind, days: u32) -> SampleSet {
        self.fetch(CacheKey::History { metric, days }, false)
            .await
            .unwrap_or_default()
    }

    /// Like [`history`](Self::history) but always queries the source
    pub async fn refresh_history(&self, metric: MetricKind, days: u32) -> SampleSet {
        self.fetch(CacheKey::History { metric, days }, true)
            .await
            .unwrap_or_default()
    }

    /// Look up `key`, joining or starting a query on a miss.
    ///
    /// Returns `None` when the source fails; the failure is not cached.
    pub async fn fetch(&self, key: CacheKey, force: bool) -> Option<SampleSet> {
        let flight = {
            let mut state = lock(&self.state);
            state.metrics.total_lookups += 1;

            if force {
                state.metrics.forced_refreshes += 1;
                debug!(key = ?key, "Forced refresh");
                self.start_flight(&mut state, key)
            } else if let Some(samples) = self.fresh_entry(&state, key) {
                state.metrics.cache_hits += 1;
                debug!(key = ?key, "Cache hit");
                return Some(samples);
            } else if let Some(flight) = state.in_flight.get(&key).and_then(|p| p.flight.upgrade()) {
                state.metrics.coalesced += 1;
                debug!(key = ?key, "Joining query in flight");
                flight
            } else {
                state.metrics.cache_misses += 1;
                debug!(key = ?key, "Cache miss");
                self.start_flight(&mut state, key)
            }
        };

        flight.await.ok()
    }

    fn fresh_entry(&self, state: &CacheState, key: CacheKey) -> Option<SampleSet> {
        let entry = state.entries.get(&key)?;
        let ttl = self.config.ttl_for(key.metric());
        (entry.fetched_at.elapsed() < ttl).then(|| Arc::clone(&entry.samples))
    }

    fn start_flight(&self, state: &mut CacheState, key: CacheKey) -> Flight {
        state.next_generation += 1;
        let generation = state.next_generation;

        let source = Arc::clone(&self.source);
        let range = DateRange::trailing_days(Utc::now(), key.lookback_days(&self.config));
        let limit = self.config.sample_limit;
        let guard = FlightGuard {
            state: Arc::clone(&self.state),
            key,
            generation,
            completed: false,
        };

        let flight = async move {
            let result = source
                .query(key.metric(), range, limit)
                .await
                .map(|mut samples| {
                    samples.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
                    Arc::new(samples)
                });
            guard.complete(&result);
            result
        }
        .boxed()
        .shared();

        if let Some(weak) = flight.downgrade() {
            state.in_flight.insert(
                key,
                InFlight {
                    generation,
                    started_at: Instant::now(),
                    flight: weak,
                },
            );
        }
        flight
    }

    /// Queries currently in flight
    pub fn in_flight(&self) -> Vec<InFlightQuery> {
        let state = lock(&self.state);
        let mut queries: Vec<InFlightQuery> = state
            .in_flight
            .iter()
            .map(|(key, pending)| InFlightQuery {
                key: *key,
                generation: pending.generation,
                elapsed: pending.started_at.elapsed(),
            })
            .collect();
        queries.sort_by_key(|q| q.generation);
        queries
    }

    /// Drop every cached entry for `metric`
    pub fn invalidate(&self, metric: MetricKind) {
        let mut state = lock(&self.state);
        state.entries.retain(|key, _| key.metric() != metric);
        debug!(metric = %metric, "Cache entries invalidated");
    }

    /// Clear entire cache
    pub fn clear(&self) {
        let mut state = lock(&self.state);
        state.entries.clear();
        info!("Metric cache cleared");
    }

    /// Get cache metrics
    pub fn metrics(&self) -> CacheMetrics {
        lock(&self.state).metrics.clone()
    }

    /// Number of cached entries
    pub fn len(&self) -> usize {
        lock(&self.state).entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
