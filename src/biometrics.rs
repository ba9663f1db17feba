//! Biometric source seam
//!
//! Physiological samples come from an external, asynchronous provider (a health
//! platform or wearable). Everything in this crate reaches it through
//! [`crate::cache::MetricCache`].

use async_trait::async_trait;
use std::fs;
use std::path::Path;
use tracing::debug;

use crate::error::SourceError;
use crate::models::{BiometricSample, DateRange, MetricKind};

/// Asynchronous, read-only provider of physiological samples
#[async_trait]
pub trait BiometricSource: Send + Sync {
    /// Samples of `metric` inside `range`, at most `limit` of them (newest first when limited)
    async fn query(
        &self,
        metric: MetricKind,
        range: DateRange,
        limit: Option<usize>,
    ) -> Result<Vec<BiometricSample>, SourceError>;
}

/// Source serving a fixed set of samples
#[derive(Debug, Clone, Default)]
pub struct StaticBiometricSource {
    samples: Vec<BiometricSample>,
}

impl StaticBiometricSource {
    pub fn new(samples: Vec<BiometricSample>) -> Self {
        StaticBiometricSource { samples }
    }

    /// Load samples from a JSON array export
    pub fn from_json_file(path: &Path) -> anyhow::Result<Self> {
        let content = fs::read_to_string(path)?;
        let samples: Vec<BiometricSample> = serde_json::from_str(&content)?;
        debug!(path = %path.display(), count = samples.len(), "Biometric samples loaded");
        Ok(Self::new(samples))
    }
}

#[async_trait]
impl BiometricSource for StaticBiometricSource {
    async fn query(
        &self,
        metric: MetricKind,
        range: DateRange,
        limit: Option<usize>,
    ) -> Result<Vec<BiometricSample>, SourceError> {
        let mut matching: Vec<BiometricSample> = self
            .samples
            .iter()
            .filter(|s| s.metric == metric && range.contains(s.timestamp))
            .cloned()
            .collect();

        matching.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        if let Some(limit) = limit {
            matching.truncate(limit);
        }
        Ok(matching)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    #[tokio::test]
    async fn test_static_source_filters_and_limits() {
        let now = Utc::now();
        let source = StaticBiometricSource::new(vec![
            BiometricSample::new(MetricKind::Hrv, now - Duration::hours(1), 40.0),
            BiometricSample::new(MetricKind::Hrv, now - Duration::hours(5), 42.0),
            BiometricSample::new(MetricKind::Hrv, now - Duration::days(40), 50.0),
            BiometricSample::new(MetricKind::RestingHeartRate, now - Duration::hours(1), 58.0),
        ]);

        let range = DateRange::trailing_days(now, 7);
        let hrv = source.query(MetricKind::Hrv, range, None).await.unwrap();
        assert_eq!(hrv.len(), 2);
        assert_eq!(hrv[0].value, 40.0);

        let limited = source.query(MetricKind::Hrv, range, Some(1)).await.unwrap();
        assert_eq!(limited.len(), 1);
    }
}
