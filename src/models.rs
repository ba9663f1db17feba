use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::RangeError;

/// Lowest value on every 1-5 rating scale
pub const SCALE_MIN: u8 = 1;

/// Highest value on every 1-5 rating scale
pub const SCALE_MAX: u8 = 5;

/// Clamp an arbitrary rating into the 1-5 scale
pub fn clamp_level(raw: i64) -> u8 {
    raw.clamp(SCALE_MIN as i64, SCALE_MAX as i64) as u8
}

/// Common capability of every timestamped record in the event store
pub trait Event {
    /// When the record was created
    fn created_at(&self) -> DateTime<Utc>;

    /// User-supplied timestamp when the record was logged after the fact
    fn backdated_at(&self) -> Option<DateTime<Utc>>;

    /// Optional free-text note
    fn note(&self) -> Option<&str>;

    /// Timestamp the record counts against: the backdated time if present, else creation time
    fn effective_date(&self) -> DateTime<Utc> {
        self.backdated_at().unwrap_or_else(|| self.created_at())
    }
}

/// Symptom severity on a 1-5 scale.
///
/// Construction always clamps, so a `Severity` can never hold an out-of-range value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "i64", into = "u8")]
pub struct Severity(u8);

impl Severity {
    pub fn new(raw: i64) -> Self {
        Severity(clamp_level(raw))
    }

    pub fn value(&self) -> u8 {
        self.0
    }

    pub fn as_f64(&self) -> f64 {
        self.0 as f64
    }

    /// Human label for this severity on the positive or negative scale
    pub fn descriptor(&self, is_positive: bool) -> &'static str {
        if is_positive {
            match self.0 {
                1 => "Very low",
                2 => "Low",
                3 => "Moderate",
                4 => "Good",
                _ => "Excellent",
            }
        } else {
            match self.0 {
                1 => "Very mild",
                2 => "Mild",
                3 => "Moderate",
                4 => "Severe",
                _ => "Extreme",
            }
        }
    }
}

impl From<i64> for Severity {
    fn from(raw: i64) -> Self {
        Severity::new(raw)
    }
}

impl From<Severity> for u8 {
    fn from(severity: Severity) -> Self {
        severity.0
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Label for a raw severity value; out-of-range input is clamped first
pub fn descriptor(raw: i64, is_positive: bool) -> &'static str {
    Severity::new(raw).descriptor(is_positive)
}

/// Biometric values captured alongside a symptom entry
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BiometricSnapshot {
    /// Heart rate variability (SDNN/RMSSD, milliseconds)
    pub hrv: Option<f64>,

    /// Resting heart rate (beats per minute)
    pub resting_hr: Option<f64>,

    /// Sleep duration of the preceding night (hours)
    pub sleep_hours: Option<f64>,
}

impl BiometricSnapshot {
    /// Value recorded for a metric, if that metric is part of snapshots
    pub fn value_for(&self, metric: MetricKind) -> Option<f64> {
        match metric {
            MetricKind::Hrv => self.hrv,
            MetricKind::RestingHeartRate => self.resting_hr,
            MetricKind::SleepHours => self.sleep_hours,
            MetricKind::WorkoutMinutes | MetricKind::CycleDay => None,
        }
    }
}

/// A logged symptom
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymptomRecord {
    pub id: Uuid,

    /// Symptom name, e.g. "Fatigue" or "Energy"
    pub name: String,

    pub severity: Severity,

    /// True when the symptom measures wellbeing (higher is better)
    #[serde(default)]
    pub is_positive: bool,

    #[serde(default)]
    pub biometrics: Option<BiometricSnapshot>,

    pub created_at: DateTime<Utc>,

    #[serde(default)]
    pub backdated_at: Option<DateTime<Utc>>,

    #[serde(default)]
    pub note: Option<String>,
}

impl SymptomRecord {
    pub fn new(name: impl Into<String>, severity: i64, is_positive: bool, at: DateTime<Utc>) -> Self {
        SymptomRecord {
            id: Uuid::new_v4(),
            name: name.into(),
            severity: Severity::new(severity),
            is_positive,
            biometrics: None,
            created_at: at,
            backdated_at: None,
            note: None,
        }
    }

    pub fn with_biometrics(mut self, snapshot: BiometricSnapshot) -> Self {
        self.biometrics = Some(snapshot);
        self
    }
}

impl Event for SymptomRecord {
    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    fn backdated_at(&self) -> Option<DateTime<Utc>> {
        self.backdated_at
    }

    fn note(&self) -> Option<&str> {
        self.note.as_deref()
    }
}

/// Category of an exertion record; decides its type weight
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExertionKind {
    Activity,
    Meal,
}

impl ExertionKind {
    /// Weight applied to the load of this kind of record
    pub fn type_weight(&self) -> f64 {
        match self {
            ExertionKind::Activity => 1.0,
            ExertionKind::Meal => 0.5,
        }
    }
}

/// An activity or meal with physical, cognitive and emotional exertion ratings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExertionRecord {
    pub id: Uuid,
    pub name: String,
    pub kind: ExertionKind,

    /// Physical exertion, 1-5
    pub physical: u8,

    /// Cognitive exertion, 1-5
    pub cognitive: u8,

    /// Emotional exertion, 1-5
    pub emotional: u8,

    #[serde(default)]
    pub duration_minutes: Option<u32>,

    pub created_at: DateTime<Utc>,

    #[serde(default)]
    pub backdated_at: Option<DateTime<Utc>>,

    #[serde(default)]
    pub note: Option<String>,
}

impl ExertionRecord {
    pub fn activity(name: impl Into<String>, levels: (u8, u8, u8), at: DateTime<Utc>) -> Self {
        Self::with_kind(ExertionKind::Activity, name, levels, at)
    }

    pub fn meal(name: impl Into<String>, levels: (u8, u8, u8), at: DateTime<Utc>) -> Self {
        Self::with_kind(ExertionKind::Meal, name, levels, at)
    }

    fn with_kind(
        kind: ExertionKind,
        name: impl Into<String>,
        (physical, cognitive, emotional): (u8, u8, u8),
        at: DateTime<Utc>,
    ) -> Self {
        ExertionRecord {
            id: Uuid::new_v4(),
            name: name.into(),
            kind,
            physical,
            cognitive,
            emotional,
            duration_minutes: None,
            created_at: at,
            backdated_at: None,
            note: None,
        }
    }

    pub fn with_duration(mut self, minutes: u32) -> Self {
        self.duration_minutes = Some(minutes);
        self
    }
}

impl Event for ExertionRecord {
    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    fn backdated_at(&self) -> Option<DateTime<Utc>> {
        self.backdated_at
    }

    fn note(&self) -> Option<&str> {
        self.note.as_deref()
    }
}

/// A sleep period
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SleepRecord {
    pub id: Uuid,

    /// Subjective quality, 1-5
    pub quality: u8,

    pub duration_hours: f64,

    /// Overnight sleep rather than a nap
    pub is_main_period: bool,

    pub created_at: DateTime<Utc>,

    #[serde(default)]
    pub backdated_at: Option<DateTime<Utc>>,

    #[serde(default)]
    pub note: Option<String>,
}

impl SleepRecord {
    pub fn main_period(quality: u8, duration_hours: f64, at: DateTime<Utc>) -> Self {
        Self::new(quality, duration_hours, true, at)
    }

    pub fn nap(quality: u8, duration_hours: f64, at: DateTime<Utc>) -> Self {
        Self::new(quality, duration_hours, false, at)
    }

    fn new(quality: u8, duration_hours: f64, is_main_period: bool, at: DateTime<Utc>) -> Self {
        SleepRecord {
            id: Uuid::new_v4(),
            quality,
            duration_hours,
            is_main_period,
            created_at: at,
            backdated_at: None,
            note: None,
        }
    }
}

impl Event for SleepRecord {
    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    fn backdated_at(&self) -> Option<DateTime<Utc>> {
        self.backdated_at
    }

    fn note(&self) -> Option<&str> {
        self.note.as_deref()
    }
}

/// Physiological metrics provided by the biometric source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricKind {
    Hrv,
    RestingHeartRate,
    SleepHours,
    WorkoutMinutes,
    CycleDay,
}

impl MetricKind {
    pub const ALL: [MetricKind; 5] = [
        MetricKind::Hrv,
        MetricKind::RestingHeartRate,
        MetricKind::SleepHours,
        MetricKind::WorkoutMinutes,
        MetricKind::CycleDay,
    ];

    /// Metrics co-recorded with symptoms and eligible for physiological correlation
    pub const SNAPSHOT: [MetricKind; 3] = [
        MetricKind::Hrv,
        MetricKind::RestingHeartRate,
        MetricKind::SleepHours,
    ];

    /// Stable identifier used in settings keys and on the command line
    pub fn key(&self) -> &'static str {
        match self {
            MetricKind::Hrv => "hrv",
            MetricKind::RestingHeartRate => "resting_hr",
            MetricKind::SleepHours => "sleep_hours",
            MetricKind::WorkoutMinutes => "workout_minutes",
            MetricKind::CycleDay => "cycle_day",
        }
    }
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetricKind::Hrv => write!(f, "HRV"),
            MetricKind::RestingHeartRate => write!(f, "Resting HR"),
            MetricKind::SleepHours => write!(f, "Sleep hours"),
            MetricKind::WorkoutMinutes => write!(f, "Workout minutes"),
            MetricKind::CycleDay => write!(f, "Cycle day"),
        }
    }
}

impl FromStr for MetricKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "hrv" => Ok(MetricKind::Hrv),
            "resting_hr" | "resting-hr" | "rhr" => Ok(MetricKind::RestingHeartRate),
            "sleep_hours" | "sleep" => Ok(MetricKind::SleepHours),
            "workout_minutes" | "workout" => Ok(MetricKind::WorkoutMinutes),
            "cycle_day" | "cycle" => Ok(MetricKind::CycleDay),
            _ => Err(format!("Invalid metric: {}", s)),
        }
    }
}

/// One physiological sample from the biometric source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BiometricSample {
    pub metric: MetricKind,
    pub timestamp: DateTime<Utc>,
    pub value: f64,
}

impl BiometricSample {
    pub fn new(metric: MetricKind, timestamp: DateTime<Utc>, value: f64) -> Self {
        BiometricSample {
            metric,
            timestamp,
            value,
        }
    }
}

/// Half-open time range `[start, end)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl DateRange {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self, RangeError> {
        if start > end {
            return Err(RangeError::Inverted {
                start: start.to_rfc3339(),
                end: end.to_rfc3339(),
            });
        }
        Ok(DateRange { start, end })
    }

    /// The `days` days leading up to `end`
    pub fn trailing_days(end: DateTime<Utc>, days: u32) -> Self {
        DateRange {
            start: end - Duration::days(days as i64),
            end,
        }
    }

    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        instant >= self.start && instant < self.end
    }

    pub fn duration(&self) -> Duration {
        self.end - self.start
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_severity_clamping() {
        assert_eq!(Severity::new(0).value(), 1);
        assert_eq!(Severity::new(-3).value(), 1);
        assert_eq!(Severity::new(6).value(), 5);
        assert_eq!(Severity::new(3).value(), 3);
    }

    #[test]
    fn test_descriptor_clamps_both_scales() {
        for is_positive in [true, false] {
            assert_eq!(descriptor(0, is_positive), descriptor(1, is_positive));
            assert_eq!(descriptor(6, is_positive), descriptor(5, is_positive));
        }
        assert_eq!(descriptor(5, false), "Extreme");
        assert_eq!(descriptor(5, true), "Excellent");
    }

    #[test]
    fn test_severity_deserializes_clamped() {
        let severity: Severity = serde_json::from_str("9").unwrap();
        assert_eq!(severity.value(), 5);
        assert_eq!(serde_json::to_string(&severity).unwrap(), "5");
    }

    #[test]
    fn test_effective_date_prefers_backdated() {
        let created = Utc.with_ymd_and_hms(2024, 3, 10, 12, 0, 0).unwrap();
        let backdated = Utc.with_ymd_and_hms(2024, 3, 9, 20, 0, 0).unwrap();

        let mut symptom = SymptomRecord::new("Fatigue", 3, false, created);
        assert_eq!(symptom.effective_date(), created);

        symptom.backdated_at = Some(backdated);
        assert_eq!(symptom.effective_date(), backdated);
    }

    #[test]
    fn test_metric_kind_parsing() {
        assert_eq!("hrv".parse::<MetricKind>().unwrap(), MetricKind::Hrv);
        assert_eq!("RHR".parse::<MetricKind>().unwrap(), MetricKind::RestingHeartRate);
        assert!("steps".parse::<MetricKind>().is_err());
    }

    #[test]
    fn test_inverted_range_rejected() {
        let start = Utc.with_ymd_and_hms(2024, 3, 10, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        assert!(DateRange::new(start, end).is_err());
        assert!(DateRange::new(end, start).is_ok());
    }
}
