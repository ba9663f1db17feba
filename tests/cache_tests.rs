//! Metric cache behaviour under concurrency and failure

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use futures::future::join_all;
use pacetrack::biometrics::StaticBiometricSource;
use pacetrack::cache::{CacheConfig, MetricCache};
use pacetrack::error::SourceError;
use pacetrack::models::{BiometricSample, DateRange, MetricKind};
use pacetrack::BiometricSource;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Source that answers after a delay and counts its queries
struct SlowSource {
    calls: AtomicUsize,
    delay: Duration,
    fail: bool,
}

impl SlowSource {
    fn new(delay: Duration, fail: bool) -> Arc<Self> {
        Arc::new(SlowSource {
            calls: AtomicUsize::new(0),
            delay,
            fail,
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BiometricSource for SlowSource {
    async fn query(
        &self,
        metric: MetricKind,
        _range: DateRange,
        _limit: Option<usize>,
    ) -> Result<Vec<BiometricSample>, SourceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;

        if self.fail {
            return Err(SourceError::Unavailable {
                reason: "permission denied".to_string(),
            });
        }
        Ok(vec![BiometricSample::new(
            metric,
            Utc::now() - ChronoDuration::minutes(5),
            52.0,
        )])
    }
}

#[tokio::test(start_paused = true)]
async fn test_no_query_within_ttl() {
    let source = SlowSource::new(Duration::from_millis(50), false);
    let cache = MetricCache::new(source.clone());

    cache.latest(MetricKind::Hrv).await;
    for _ in 0..10 {
        tokio::time::advance(Duration::from_secs(60)).await;
        assert!(cache.latest(MetricKind::Hrv).await.is_some());
    }

    // Ten minutes is well inside the thirty minute HRV TTL
    assert_eq!(source.calls(), 1);
    assert_eq!(cache.metrics().cache_hits, 10);
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_readers_after_expiry_share_one_query() {
    let source = SlowSource::new(Duration::from_millis(200), false);
    let cache = Arc::new(MetricCache::new(source.clone()));

    cache.latest(MetricKind::Hrv).await;
    assert_eq!(source.calls(), 1);

    tokio::time::advance(Duration::from_secs(31 * 60)).await;

    let readers: Vec<_> = (0..8)
        .map(|_| {
            let cache = Arc::clone(&cache);
            tokio::spawn(async move { cache.latest(MetricKind::Hrv).await })
        })
        .collect();

    for reader in join_all(readers).await {
        assert_eq!(reader.unwrap().map(|s| s.value), Some(52.0));
    }

    assert_eq!(source.calls(), 2);
    let metrics = cache.metrics();
    assert_eq!(metrics.cache_misses + metrics.coalesced, 8 + 1);
    assert!(metrics.coalesced >= 1);
    assert!(cache.in_flight().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_failure_shared_then_retried() {
    let source = SlowSource::new(Duration::from_millis(100), true);
    let cache = MetricCache::new(source.clone());

    let results = join_all((0..5).map(|_| cache.latest(MetricKind::RestingHeartRate))).await;
    assert!(results.iter().all(Option::is_none));
    assert_eq!(source.calls(), 1);
    assert_eq!(cache.metrics().failures, 1);

    // A failure is not cached: the next lookup asks again
    assert!(cache.latest(MetricKind::RestingHeartRate).await.is_none());
    assert_eq!(source.calls(), 2);
    assert!(cache.is_empty());
}

#[tokio::test]
async fn test_latest_is_most_recent_sample() {
    let now = Utc::now();
    let source = StaticBiometricSource::new(vec![
        BiometricSample::new(MetricKind::Hrv, now - ChronoDuration::hours(20), 38.0),
        BiometricSample::new(MetricKind::Hrv, now - ChronoDuration::hours(2), 47.5),
        BiometricSample::new(MetricKind::Hrv, now - ChronoDuration::hours(9), 44.0),
        BiometricSample::new(MetricKind::RestingHeartRate, now - ChronoDuration::hours(1), 61.0),
    ]);
    let cache = MetricCache::new(Arc::new(source));

    let latest = cache.latest(MetricKind::Hrv).await.unwrap();
    assert_eq!(latest.value, 47.5);
    assert!(cache.latest(MetricKind::SleepHours).await.is_none());
}

#[tokio::test]
async fn test_history_respects_lookback() {
    let now = Utc::now();
    let samples = (0..40)
        .map(|day| BiometricSample::new(MetricKind::Hrv, now - ChronoDuration::days(day) - ChronoDuration::hours(1), 50.0))
        .collect();
    let cache = MetricCache::with_config(
        Arc::new(StaticBiometricSource::new(samples)),
        CacheConfig::default(),
    );

    let history = cache.history(MetricKind::Hrv, 30).await;
    assert_eq!(history.len(), 30);
    assert!(history.windows(2).all(|w| w[0].timestamp > w[1].timestamp));
}
