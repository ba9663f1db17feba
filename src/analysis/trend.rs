//! Symptom trend detection
//!
//! The window is split at its midpoint and the mean severity of each half is
//! compared. Direction is relative to wellbeing: for a negative symptom a rise
//! is worsening, for a positive one (energy, mood) a rise is improving.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use super::AnalysisWindow;
use crate::models::{Event, SymptomRecord};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrendDirection {
    Improving,
    Worsening,
    Stable,
}

impl TrendDirection {
    /// Direction of a change in mean severity for a symptom of the given polarity
    pub fn classify(difference: f64, is_positive: bool, epsilon: f64) -> Self {
        if !difference.is_finite() || difference.abs() < epsilon {
            return TrendDirection::Stable;
        }
        match (difference > 0.0, is_positive) {
            (true, false) | (false, true) => TrendDirection::Worsening,
            (true, true) | (false, false) => TrendDirection::Improving,
        }
    }
}

impl fmt::Display for TrendDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrendDirection::Improving => write!(f, "Improving"),
            TrendDirection::Worsening => write!(f, "Worsening"),
            TrendDirection::Stable => write!(f, "Stable"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendResult {
    pub symptom: String,
    pub direction: TrendDirection,
    pub is_positive: bool,

    /// Mean severity of the older half, if it has records
    pub older_mean: Option<f64>,

    /// Mean severity of the recent half, if it has records
    pub recent_mean: Option<f64>,

    pub older_count: usize,
    pub recent_count: usize,
}

impl TrendResult {
    /// `recent - older` when both halves have records
    pub fn change(&self) -> Option<f64> {
        Some(self.recent_mean? - self.older_mean?)
    }
}

#[derive(Default)]
struct Halves {
    older: Vec<f64>,
    recent: Vec<f64>,
    is_positive: bool,
}

fn mean(values: &[f64]) -> Option<f64> {
    (!values.is_empty()).then(|| values.iter().sum::<f64>() / values.len() as f64)
}

/// One trend per symptom name with records in `window`, ordered by name
pub fn detect_trends(symptoms: &[SymptomRecord], window: &AnalysisWindow, epsilon: f64) -> Vec<TrendResult> {
    let range = window.range();
    let midpoint = window.midpoint();

    let mut by_symptom: BTreeMap<&str, Halves> = BTreeMap::new();
    let mut ordered: Vec<&SymptomRecord> = symptoms
        .iter()
        .filter(|s| range.contains(s.effective_date()))
        .collect();
    ordered.sort_by_key(|s| s.effective_date());

    for symptom in ordered {
        let halves = by_symptom.entry(symptom.name.as_str()).or_default();
        // Polarity follows the most recent record
        halves.is_positive = symptom.is_positive;
        if symptom.effective_date() < midpoint {
            halves.older.push(symptom.severity.as_f64());
        } else {
            halves.recent.push(symptom.severity.as_f64());
        }
    }

    by_symptom
        .into_iter()
        .map(|(name, halves)| {
            let older_mean = mean(&halves.older);
            let recent_mean = mean(&halves.recent);
            let direction = match (older_mean, recent_mean) {
                (Some(older), Some(recent)) => {
                    TrendDirection::classify(recent - older, halves.is_positive, epsilon)
                }
                _ => TrendDirection::Stable,
            };

            TrendResult {
                symptom: name.to_string(),
                direction,
                is_positive: halves.is_positive,
                older_mean,
                recent_mean,
                older_count: halves.older.len(),
                recent_count: halves.recent.len(),
            }
        })
        .collect()
}
