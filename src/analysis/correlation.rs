//! Activity/symptom correlation
//!
//! For each activity name and symptom name, severities logged within the
//! follow window after an occurrence of the activity are contrasted with the
//! severities of that symptom at other times:
//!
//! ```text
//! strength = (mean_following - mean_baseline) / 4     clamped to [-1, 1]
//! ```
//!
//! 4 is the width of the severity scale, so a move from 1 to 5 saturates. The
//! sign is flipped for positive symptoms, so a positive strength always means
//! the activity is followed by feeling worse.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::models::{Event, ExertionRecord, MetricKind, SymptomRecord, SCALE_MAX, SCALE_MIN};

/// What a symptom is correlated with
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "kind", content = "name", rename_all = "lowercase")]
pub enum CorrelationSubject {
    Activity(String),
    Metric(MetricKind),
}

impl fmt::Display for CorrelationSubject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CorrelationSubject::Activity(name) => write!(f, "{}", name),
            CorrelationSubject::Metric(metric) => write!(f, "{}", metric),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrelationResult {
    pub subject: CorrelationSubject,
    pub symptom: String,

    /// In [-1, 1]
    pub strength: f64,

    /// Followed activity occurrences, or severity/metric pairs
    pub occurrences: usize,
}

impl CorrelationResult {
    pub fn describe_strength(&self) -> &'static str {
        match self.strength.abs() {
            s if s >= 0.7 => "strong",
            s if s >= 0.4 => "moderate",
            s if s >= 0.15 => "weak",
            _ => "negligible",
        }
    }
}

/// Clamp a correlation strength into [-1, 1]; NaN becomes 0
pub fn clamp_strength(strength: f64) -> f64 {
    if strength.is_nan() {
        0.0
    } else {
        strength.clamp(-1.0, 1.0)
    }
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

fn follows(occurrence: DateTime<Utc>, at: DateTime<Utc>, window: Duration) -> bool {
    at >= occurrence && at < occurrence + window
}

/// Fewest followed occurrences any activity correlation may rest on
pub const MIN_OCCURRENCES: usize = 2;

/// Correlations between every activity and symptom pair with enough evidence,
/// strongest first. `min_occurrences` is raised to [`MIN_OCCURRENCES`].
pub fn activity_correlations(
    activities: &[ExertionRecord],
    symptoms: &[SymptomRecord],
    follow_window: Duration,
    min_occurrences: usize,
) -> Vec<CorrelationResult> {
    let mut occurrences: BTreeMap<&str, Vec<DateTime<Utc>>> = BTreeMap::new();
    for activity in activities {
        occurrences
            .entry(activity.name.as_str())
            .or_default()
            .push(Event::effective_date(activity));
    }

    let mut by_symptom: BTreeMap<&str, Vec<&SymptomRecord>> = BTreeMap::new();
    for symptom in symptoms {
        by_symptom.entry(symptom.name.as_str()).or_default().push(symptom);
    }

    let scale_width = (SCALE_MAX - SCALE_MIN) as f64;
    let mut results = Vec::new();

    for (activity, times) in &occurrences {
        for (symptom, records) in &by_symptom {
            let followed = times
                .iter()
                .filter(|&&t| records.iter().any(|r| follows(t, r.effective_date(), follow_window)))
                .count();
            if followed < min_occurrences.max(MIN_OCCURRENCES) {
                continue;
            }

            let (following, baseline): (Vec<&SymptomRecord>, Vec<&SymptomRecord>) = records
                .iter()
                .copied()
                .partition(|r| times.iter().any(|&t| follows(t, r.effective_date(), follow_window)));
            if baseline.is_empty() {
                continue;
            }

            let severities = |records: &[&SymptomRecord]| -> Vec<f64> {
                records.iter().map(|r| r.severity.as_f64()).collect()
            };
            let difference = mean(&severities(&following)) - mean(&severities(&baseline));
            let is_positive = records.iter().any(|r| r.is_positive);
            let signed = if is_positive { -difference } else { difference };

            results.push(CorrelationResult {
                subject: CorrelationSubject::Activity(activity.to_string()),
                symptom: symptom.to_string(),
                strength: clamp_strength(signed / scale_width),
                occurrences: followed,
            });
        }
    }

    results.sort_by(|a, b| {
        b.strength
            .abs()
            .total_cmp(&a.strength.abs())
            .then_with(|| a.subject.cmp(&b.subject))
            .then_with(|| a.symptom.cmp(&b.symptom))
    });
    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(day: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 8, day, hour, 0, 0).unwrap()
    }

    fn walk(day: u32) -> ExertionRecord {
        ExertionRecord::activity("Walk", (3, 1, 1), at(day, 10))
    }

    #[test]
    fn test_followed_symptoms_raise_strength() {
        let activities = vec![walk(1), walk(5), walk(9)];
        let symptoms = vec![
            SymptomRecord::new("Fatigue", 5, false, at(1, 18)),
            SymptomRecord::new("Fatigue", 5, false, at(5, 20)),
            SymptomRecord::new("Fatigue", 4, false, at(9, 15)),
            SymptomRecord::new("Fatigue", 1, false, at(3, 12)),
            SymptomRecord::new("Fatigue", 2, false, at(7, 12)),
        ];

        let results = activity_correlations(&activities, &symptoms, Duration::hours(24), 2);
        assert_eq!(results.len(), 1);

        let result = &results[0];
        assert_eq!(result.subject, CorrelationSubject::Activity("Walk".to_string()));
        assert_eq!(result.occurrences, 3);
        // (14/3 - 1.5) / 4
        assert!((result.strength - (14.0 / 3.0 - 1.5) / 4.0).abs() < 1e-9);
        assert_eq!(result.describe_strength(), "strong");
    }

    #[test]
    fn test_pair_observed_once_is_excluded() {
        let activities = vec![walk(1), walk(5)];
        let symptoms = vec![
            SymptomRecord::new("Fatigue", 5, false, at(1, 18)),
            SymptomRecord::new("Fatigue", 1, false, at(3, 12)),
        ];

        assert!(activity_correlations(&activities, &symptoms, Duration::hours(24), 2).is_empty());
        assert!(activity_correlations(&activities, &symptoms, Duration::hours(24), 1).is_empty());
        assert!(activity_correlations(&activities, &symptoms, Duration::hours(24), 0).is_empty());
    }

    #[test]
    fn test_no_baseline_is_excluded() {
        let activities = vec![walk(1), walk(2)];
        let symptoms = vec![
            SymptomRecord::new("Fatigue", 4, false, at(1, 18)),
            SymptomRecord::new("Fatigue", 4, false, at(2, 18)),
        ];

        assert!(activity_correlations(&activities, &symptoms, Duration::hours(24), 2).is_empty());
    }

    #[test]
    fn test_positive_symptom_sign_flipped() {
        let activities = vec![walk(1), walk(5)];
        let symptoms = vec![
            SymptomRecord::new("Energy", 5, true, at(1, 18)),
            SymptomRecord::new("Energy", 5, true, at(5, 18)),
            SymptomRecord::new("Energy", 1, true, at(3, 12)),
        ];

        let results = activity_correlations(&activities, &symptoms, Duration::hours(24), 2);
        assert_eq!(results.len(), 1);
        assert!((results[0].strength + 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_symptom_before_activity_does_not_follow() {
        assert!(!follows(at(2, 10), at(2, 9), Duration::hours(24)));
        assert!(follows(at(2, 10), at(3, 9), Duration::hours(24)));
        assert!(!follows(at(2, 10), at(3, 10), Duration::hours(24)));
    }

    #[test]
    fn test_clamp_strength() {
        assert_eq!(clamp_strength(1.7), 1.0);
        assert_eq!(clamp_strength(-3.0), -1.0);
        assert_eq!(clamp_strength(f64::NAN), 0.0);
    }
}
