//! Severity against co-recorded biometrics, and readings against baselines

use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;
use std::collections::BTreeMap;
use std::fmt;

use super::correlation::{clamp_strength, CorrelationResult, CorrelationSubject};
use crate::baseline::Baseline;
use crate::models::{MetricKind, SymptomRecord};

/// Pearson correlation coefficient of paired samples.
///
/// `None` for fewer than three pairs, mismatched lengths, or when either side
/// has no variance.
pub fn pearson(xs: &[f64], ys: &[f64]) -> Option<f64> {
    if xs.len() != ys.len() || xs.len() < 3 {
        return None;
    }

    let sx = xs.iter().std_dev();
    let sy = ys.iter().std_dev();
    if !(sx > 0.0 && sy > 0.0) {
        return None;
    }

    let r = xs.iter().covariance(ys.iter()) / (sx * sy);
    r.is_finite().then(|| clamp_strength(r))
}

/// Weakest |r| a physiological correlation is ever reported at
pub const MIN_NOISE_FLOOR: f64 = 0.15;

/// Whether `r` is strong enough to report
pub fn passes_noise_floor(r: f64, noise_floor: f64) -> bool {
    r.abs() >= noise_floor
}

/// Correlations of each symptom's severity with HRV, resting HR and sleep hours
/// recorded alongside it. `noise_floor` is raised to [`MIN_NOISE_FLOOR`].
pub fn physiological_correlations(
    symptoms: &[SymptomRecord],
    min_pairs: usize,
    noise_floor: f64,
) -> Vec<CorrelationResult> {
    let noise_floor = noise_floor.max(MIN_NOISE_FLOOR);
    let mut pairs: BTreeMap<(&str, MetricKind), (Vec<f64>, Vec<f64>)> = BTreeMap::new();

    for symptom in symptoms {
        let Some(snapshot) = &symptom.biometrics else {
            continue;
        };
        for metric in MetricKind::SNAPSHOT {
            if let Some(value) = snapshot.value_for(metric).filter(|v| v.is_finite()) {
                let (severities, values) = pairs.entry((symptom.name.as_str(), metric)).or_default();
                severities.push(symptom.severity.as_f64());
                values.push(value);
            }
        }
    }

    let mut results: Vec<CorrelationResult> = pairs
        .into_iter()
        .filter(|(_, (severities, _))| severities.len() >= min_pairs.max(3))
        .filter_map(|((symptom, metric), (severities, values))| {
            let r = pearson(&severities, &values)?;
            passes_noise_floor(r, noise_floor).then(|| CorrelationResult {
                subject: CorrelationSubject::Metric(metric),
                symptom: symptom.to_string(),
                strength: r,
                occurrences: severities.len(),
            })
        })
        .collect();

    results.sort_by(|a, b| b.strength.abs().total_cmp(&a.strength.abs()));
    results
}

/// Position of a reading relative to its baseline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BiometricStatus {
    WithinBaseline,
    Elevated,
    Depressed,
    NoBaseline,
}

impl BiometricStatus {
    pub fn classify(z_score: Option<f64>, threshold: f64) -> Self {
        match z_score {
            None => BiometricStatus::NoBaseline,
            Some(z) if z >= threshold => BiometricStatus::Elevated,
            Some(z) if z <= -threshold => BiometricStatus::Depressed,
            Some(_) => BiometricStatus::WithinBaseline,
        }
    }
}

impl fmt::Display for BiometricStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BiometricStatus::WithinBaseline => write!(f, "Within baseline"),
            BiometricStatus::Elevated => write!(f, "Elevated"),
            BiometricStatus::Depressed => write!(f, "Depressed"),
            BiometricStatus::NoBaseline => write!(f, "No baseline"),
        }
    }
}

/// A reading assessed against its baseline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BiometricReading {
    pub metric: MetricKind,
    pub value: f64,
    pub baseline_mean: Option<f64>,
    pub z_score: Option<f64>,
    pub status: BiometricStatus,
}

impl BiometricReading {
    pub fn assess(metric: MetricKind, value: f64, baseline: Option<&Baseline>, threshold: f64) -> Self {
        let baseline = baseline.filter(|b| b.is_valid());
        let z_score = baseline.and_then(|b| b.z_score(value));

        BiometricReading {
            metric,
            value,
            baseline_mean: baseline.map(|b| b.mean),
            z_score,
            status: BiometricStatus::classify(z_score, threshold),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::BiometricSnapshot;
    use chrono::Utc;

    fn with_hrv(severity: i64, hrv: f64) -> SymptomRecord {
        SymptomRecord::new("Fatigue", severity, false, Utc::now()).with_biometrics(BiometricSnapshot {
            hrv: Some(hrv),
            resting_hr: None,
            sleep_hours: None,
        })
    }

    #[test]
    fn test_pearson_perfect() {
        let xs = [1.0, 2.0, 3.0, 4.0];
        assert!((pearson(&xs, &[2.0, 4.0, 6.0, 8.0]).unwrap() - 1.0).abs() < 1e-9);
        assert!((pearson(&xs, &[8.0, 6.0, 4.0, 2.0]).unwrap() + 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_pearson_requires_variance_and_pairs() {
        assert_eq!(pearson(&[1.0, 2.0], &[3.0, 4.0]), None);
        assert_eq!(pearson(&[3.0, 3.0, 3.0], &[1.0, 2.0, 3.0]), None);
        assert_eq!(pearson(&[1.0, 2.0, 3.0], &[1.0, 2.0]), None);
    }

    #[test]
    fn test_noise_floor() {
        assert!(!passes_noise_floor(0.1, 0.15));
        assert!(!passes_noise_floor(-0.1, 0.15));
        assert!(passes_noise_floor(0.2, 0.15));
        assert!(passes_noise_floor(-0.2, 0.15));
    }

    #[test]
    fn test_lower_hrv_with_worse_fatigue() {
        let symptoms = vec![
            with_hrv(1, 62.0),
            with_hrv(2, 55.0),
            with_hrv(3, 49.0),
            with_hrv(4, 41.0),
            with_hrv(5, 35.0),
            SymptomRecord::new("Fatigue", 5, false, Utc::now()),
        ];

        let results = physiological_correlations(&symptoms, 3, 0.15);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].subject, CorrelationSubject::Metric(MetricKind::Hrv));
        assert_eq!(results[0].occurrences, 5);
        assert!(results[0].strength < -0.9);
    }

    #[test]
    fn test_noise_floor_cannot_be_lowered() {
        // Severity 1..=5 against a symmetric dip: r = 0
        let symptoms = vec![
            with_hrv(1, 50.0),
            with_hrv(2, 10.0),
            with_hrv(3, 10.0),
            with_hrv(4, 10.0),
            with_hrv(5, 50.0),
        ];

        assert!(physiological_correlations(&symptoms, 3, 0.0).is_empty());
        assert!(physiological_correlations(&symptoms, 3, -1.0).is_empty());
    }

    #[test]
    fn test_too_few_pairs() {
        let symptoms = vec![with_hrv(1, 60.0), with_hrv(5, 30.0)];
        assert!(physiological_correlations(&symptoms, 3, 0.15).is_empty());
    }

    #[test]
    fn test_status_classification() {
        let baseline = Baseline::from_values(
            MetricKind::RestingHeartRate,
            &[58.0, 60.0, 62.0, 58.0, 60.0, 62.0, 58.0, 60.0, 62.0, 60.0],
            Utc::now(),
        )
        .unwrap();

        let high = BiometricReading::assess(MetricKind::RestingHeartRate, 70.0, Some(&baseline), 1.0);
        assert_eq!(high.status, BiometricStatus::Elevated);

        let low = BiometricReading::assess(MetricKind::RestingHeartRate, 50.0, Some(&baseline), 1.0);
        assert_eq!(low.status, BiometricStatus::Depressed);

        let normal = BiometricReading::assess(MetricKind::RestingHeartRate, 60.5, Some(&baseline), 1.0);
        assert_eq!(normal.status, BiometricStatus::WithinBaseline);

        let none = BiometricReading::assess(MetricKind::RestingHeartRate, 60.0, None, 1.0);
        assert_eq!(none.status, BiometricStatus::NoBaseline);
    }
}
