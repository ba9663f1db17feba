//! Wiring and startup
//!
//! [`Pacetrack`] owns the long-lived services built from an [`AppConfig`].
//! [`Pacetrack::initialize`] recomputes baselines under a hard wall-clock
//! limit: if the biometric source hangs, startup continues in a degraded mode
//! with whatever baselines were persisted last time.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

use crate::analysis::AnalysisEngine;
use crate::baseline::{BaselineCalculator, BaselineStore, RecomputeSummary, SettingsStore};
use crate::biometrics::BiometricSource;
use crate::cache::MetricCache;
use crate::config::AppConfig;
use crate::load::LoadCalculator;
use crate::store::EventStore;

/// How startup went
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum BootstrapStatus {
    /// Baselines recomputed
    Ready(RecomputeSummary),

    /// Recomputation failed or timed out; persisted baselines remain in use
    Degraded { reason: String },
}

impl BootstrapStatus {
    pub fn is_ready(&self) -> bool {
        matches!(self, BootstrapStatus::Ready(_))
    }
}

/// The analytics services of one process
pub struct Pacetrack {
    pub store: Arc<dyn EventStore>,
    pub cache: Arc<MetricCache>,
    pub baselines: Arc<BaselineStore>,
    pub baseline_calculator: BaselineCalculator,
    pub analysis: AnalysisEngine,
    pub load: LoadCalculator,
    bootstrap_timeout: Duration,
}

impl Pacetrack {
    pub fn new(
        config: &AppConfig,
        store: Arc<dyn EventStore>,
        source: Arc<dyn BiometricSource>,
        settings: Arc<dyn SettingsStore>,
    ) -> Self {
        let cache = Arc::new(MetricCache::with_config(source, config.cache.clone()));
        let baselines = Arc::new(BaselineStore::load(settings, &config.baseline.metrics));
        let baseline_calculator =
            BaselineCalculator::with_config(Arc::clone(&cache), Arc::clone(&baselines), config.baseline.clone());
        let analysis = AnalysisEngine::with_config(Arc::clone(&store), config.analysis.clone())
            .with_baselines(Arc::clone(&baselines));

        Pacetrack {
            store,
            cache,
            baselines,
            baseline_calculator,
            analysis,
            load: LoadCalculator::with_config(config.load.clone()),
            bootstrap_timeout: config.bootstrap_timeout(),
        }
    }

    pub fn bootstrap_timeout(&self) -> Duration {
        self.bootstrap_timeout
    }

    /// Recompute baselines within the configured timeout
    pub async fn initialize(&self) -> BootstrapStatus {
        initialize(&self.baseline_calculator, self.bootstrap_timeout).await
    }
}

/// Recompute baselines, giving up after `limit`.
///
/// On timeout the recomputation future is dropped before it replaces anything,
/// so the stored baselines are exactly those loaded at construction.
pub async fn initialize(calculator: &BaselineCalculator, limit: Duration) -> BootstrapStatus {
    let started = Instant::now();

    match tokio::time::timeout(limit, calculator.recompute()).await {
        Ok(Ok(summary)) => {
            info!(
                updated = summary.updated.len(),
                insufficient = summary.insufficient.len(),
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Baselines ready"
            );
            BootstrapStatus::Ready(summary)
        }
        Ok(Err(e)) => {
            warn!(error = %e, "Baseline recomputation failed; continuing with stored baselines");
            BootstrapStatus::Degraded {
                reason: e.to_string(),
            }
        }
        Err(_) => {
            warn!(
                timeout_secs = limit.as_secs_f64(),
                "Baseline recomputation timed out; continuing with stored baselines"
            );
            BootstrapStatus::Degraded {
                reason: format!("timed out after {:.1}s", limit.as_secs_f64()),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::baseline::MemorySettingsStore;
    use crate::biometrics::StaticBiometricSource;
    use crate::error::SourceError;
    use crate::models::{BiometricSample, DateRange, MetricKind};
    use crate::store::MemoryEventStore;
    use async_trait::async_trait;
    use chrono::Utc;

    struct HangingSource;

    #[async_trait]
    impl BiometricSource for HangingSource {
        async fn query(
            &self,
            _metric: MetricKind,
            _range: DateRange,
            _limit: Option<usize>,
        ) -> Result<Vec<BiometricSample>, SourceError> {
            std::future::pending().await
        }
    }

    fn services(source: Arc<dyn BiometricSource>) -> Pacetrack {
        let mut config = AppConfig::default();
        config.bootstrap_timeout_secs = 2;
        Pacetrack::new(
            &config,
            Arc::new(MemoryEventStore::default()),
            source,
            Arc::new(MemorySettingsStore::new()),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_hanging_source_degrades() {
        let pacetrack = services(Arc::new(HangingSource));

        let status = pacetrack.initialize().await;
        assert!(matches!(status, BootstrapStatus::Degraded { .. }));
        assert!(pacetrack.baselines.snapshot().is_empty());
        assert!(pacetrack.cache.in_flight().is_empty());
    }

    #[tokio::test]
    async fn test_ready_with_samples() {
        let now = Utc::now();
        let samples = (0..12)
            .map(|i| BiometricSample::new(MetricKind::Hrv, now - chrono::Duration::hours(i * 6 + 1), 50.0 + i as f64))
            .collect();
        let pacetrack = services(Arc::new(StaticBiometricSource::new(samples)));

        let status = pacetrack.initialize().await;
        assert!(status.is_ready());
        assert!(pacetrack.baselines.get(MetricKind::Hrv).is_some());
        assert!(pacetrack.baselines.get(MetricKind::RestingHeartRate).is_none());
    }
}
