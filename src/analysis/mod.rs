//! Statistical analysis over logged symptoms and activities
//!
//! Every analysis runs over an [`AnalysisWindow`] of whole days ending at a
//! reference instant. The engine is synchronous: it reads from the event store,
//! computes, and returns. A failed store read is logged and treated as an empty
//! history, so callers always get a (possibly empty) result.

pub mod correlation;
pub mod patterns;
pub mod physiological;
pub mod trend;

pub use correlation::{activity_correlations, CorrelationResult, CorrelationSubject};
pub use patterns::{time_patterns, TimePattern};
pub use physiological::{pearson, physiological_correlations, BiometricReading, BiometricStatus};
pub use trend::{detect_trends, TrendDirection, TrendResult};

use chrono::{DateTime, Duration, FixedOffset, Offset, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::baseline::BaselineStore;
use crate::error::{RangeError, StoreError};
use crate::models::{DateRange, MetricKind};
use crate::store::EventStore;

/// Analysis tuning
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Smallest change in mean severity between halves that counts as a trend
    pub trend_epsilon: f64,

    /// Hours after an activity during which symptoms count as following it
    pub correlation_window_hours: u32,

    /// Fewest followed occurrences for an activity correlation
    pub min_correlation_occurrences: usize,

    /// Fewest records of a symptom for a time pattern
    pub min_pattern_occurrences: usize,

    /// Fewest severity/metric pairs for a physiological correlation
    pub min_physiological_pairs: usize,

    /// Physiological correlations weaker than this are dropped
    pub physiological_noise_floor: f64,

    /// |z| at or above which a reading is outside its baseline
    pub status_z_threshold: f64,

    /// Default windows in days
    pub trend_days: u32,
    pub correlation_days: u32,
    pub pattern_days: u32,
    pub physiological_days: u32,

    /// Offset of the active time zone from UTC, in minutes
    pub utc_offset_minutes: i32,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        AnalysisConfig {
            trend_epsilon: 0.25,
            correlation_window_hours: 24,
            min_correlation_occurrences: 2,
            min_pattern_occurrences: 5,
            min_physiological_pairs: 3,
            physiological_noise_floor: 0.15,
            status_z_threshold: 1.0,
            trend_days: 30,
            correlation_days: 30,
            pattern_days: 60,
            physiological_days: 30,
            utc_offset_minutes: 0,
        }
    }
}

impl AnalysisConfig {
    pub fn time_zone(&self) -> FixedOffset {
        FixedOffset::east_opt(self.utc_offset_minutes * 60).unwrap_or_else(|| Utc.fix())
    }

    pub fn correlation_window(&self) -> Duration {
        Duration::hours(self.correlation_window_hours as i64)
    }
}

/// `days` whole days ending at `end`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisWindow {
    pub end: DateTime<Utc>,
    pub days: u32,
}

impl AnalysisWindow {
    pub fn new(end: DateTime<Utc>, days: u32) -> Result<Self, RangeError> {
        if days == 0 {
            return Err(RangeError::EmptyWindow);
        }
        Ok(AnalysisWindow { end, days })
    }

    pub fn ending_now(days: u32) -> Result<Self, RangeError> {
        Self::new(Utc::now(), days)
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.end - Duration::days(self.days as i64)
    }

    /// Boundary between the older and the recent half
    pub fn midpoint(&self) -> DateTime<Utc> {
        self.start() + (self.end - self.start()) / 2
    }

    pub fn range(&self) -> DateRange {
        DateRange::trailing_days(self.end, self.days)
    }
}

/// All four analyses over one window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub window: AnalysisWindow,
    pub generated_at: DateTime<Utc>,
    pub trends: Vec<TrendResult>,
    pub correlations: Vec<CorrelationResult>,
    pub patterns: Vec<TimePattern>,
    pub physiological: Vec<CorrelationResult>,
}

impl AnalysisReport {
    pub fn is_empty(&self) -> bool {
        self.trends.is_empty()
            && self.correlations.is_empty()
            && self.patterns.is_empty()
            && self.physiological.is_empty()
    }
}

/// Runs analyses against an event store
pub struct AnalysisEngine {
    store: Arc<dyn EventStore>,
    baselines: Option<Arc<BaselineStore>>,
    config: AnalysisConfig,
}

impl AnalysisEngine {
    pub fn new(store: Arc<dyn EventStore>) -> Self {
        Self::with_config(store, AnalysisConfig::default())
    }

    pub fn with_config(store: Arc<dyn EventStore>, config: AnalysisConfig) -> Self {
        AnalysisEngine {
            store,
            baselines: None,
            config,
        }
    }

    /// Attach the baselines used by [`biometric_status`](Self::biometric_status)
    pub fn with_baselines(mut self, baselines: Arc<BaselineStore>) -> Self {
        self.baselines = Some(baselines);
        self
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    /// Symptom trends over the last `days_back` days
    pub fn trends(&self, days_back: u32) -> Result<Vec<TrendResult>, RangeError> {
        Ok(self.trends_in(&AnalysisWindow::ending_now(days_back)?))
    }

    pub fn trends_in(&self, window: &AnalysisWindow) -> Vec<TrendResult> {
        let symptoms = degrade("symptoms", self.store.symptoms(&window.range()));
        detect_trends(&symptoms, window, self.config.trend_epsilon)
    }

    /// Activity/symptom correlations over the last `days_back` days
    pub fn correlations(&self, days_back: u32) -> Result<Vec<CorrelationResult>, RangeError> {
        Ok(self.correlations_in(&AnalysisWindow::ending_now(days_back)?))
    }

    pub fn correlations_in(&self, window: &AnalysisWindow) -> Vec<CorrelationResult> {
        let range = window.range();
        let activities = degrade("activities", self.store.activities(&range));
        let symptoms = degrade("symptoms", self.store.symptoms(&range));
        activity_correlations(
            &activities,
            &symptoms,
            self.config.correlation_window(),
            self.config.min_correlation_occurrences,
        )
    }

    /// Time-of-day and day-of-week patterns over the last `days_back` days
    pub fn patterns(&self, days_back: u32) -> Result<Vec<TimePattern>, RangeError> {
        Ok(self.patterns_in(&AnalysisWindow::ending_now(days_back)?))
    }

    pub fn patterns_in(&self, window: &AnalysisWindow) -> Vec<TimePattern> {
        let symptoms = degrade("symptoms", self.store.symptoms(&window.range()));
        time_patterns(
            &symptoms,
            self.config.time_zone(),
            self.config.min_pattern_occurrences,
        )
    }

    /// Severity/biometric correlations over the last `days_back` days
    pub fn physiological(&self, days_back: u32) -> Result<Vec<CorrelationResult>, RangeError> {
        Ok(self.physiological_in(&AnalysisWindow::ending_now(days_back)?))
    }

    pub fn physiological_in(&self, window: &AnalysisWindow) -> Vec<CorrelationResult> {
        let symptoms = degrade("symptoms", self.store.symptoms(&window.range()));
        physiological_correlations(
            &symptoms,
            self.config.min_physiological_pairs,
            self.config.physiological_noise_floor,
        )
    }

    /// Where `value` sits relative to the stored baseline of `metric`
    pub fn biometric_status(&self, metric: MetricKind, value: f64) -> BiometricReading {
        let baseline = self.baselines.as_ref().and_then(|store| store.get(metric));
        BiometricReading::assess(metric, value, baseline.as_ref(), self.config.status_z_threshold)
    }

    /// Every analysis over the last `days_back` days
    pub fn report(&self, days_back: u32) -> Result<AnalysisReport, RangeError> {
        Ok(self.report_in(&AnalysisWindow::ending_now(days_back)?))
    }

    pub fn report_in(&self, window: &AnalysisWindow) -> AnalysisReport {
        let report = AnalysisReport {
            window: *window,
            generated_at: Utc::now(),
            trends: self.trends_in(window),
            correlations: self.correlations_in(window),
            patterns: self.patterns_in(window),
            physiological: self.physiological_in(window),
        };
        debug!(
            days = window.days,
            trends = report.trends.len(),
            correlations = report.correlations.len(),
            patterns = report.patterns.len(),
            physiological = report.physiological.len(),
            "Analysis report generated"
        );
        report
    }
}

/// Store failures become empty history
fn degrade<T>(what: &'static str, result: Result<Vec<T>, StoreError>) -> Vec<T> {
    result.unwrap_or_else(|e| {
        warn!(records = what, error = %e, "Event store read failed; analysing empty history");
        Vec::new()
    })
}
