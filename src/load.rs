use crate::contributor::LoadContributor;
use crate::error::RangeError;
use crate::models::{Event, SymptomRecord};
use chrono::{DateTime, Days, FixedOffset, NaiveDate, Offset, Utc};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Risk classification thresholds (lower bounds, inclusive)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskThresholds {
    /// Loads at or above this are at least `Caution`
    pub caution: f64,

    /// Loads at or above this are at least `High`
    pub high: f64,

    /// Loads at or above this are `Critical`
    pub critical: f64,
}

impl Default for RiskThresholds {
    fn default() -> Self {
        RiskThresholds {
            caution: 40.0,
            high: 70.0,
            critical: 90.0,
        }
    }
}

/// Load calculation configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoadConfig {
    /// Days for carried load to halve with neutral recovery (default: 3)
    pub half_life_days: f64,

    /// Days folded before the requested start at minimum; earlier aggregated days are always folded
    pub warmup_days: u16,

    /// Risk level boundaries
    pub thresholds: RiskThresholds,

    /// Decayed load below this is not worth displaying on an otherwise empty day
    pub display_epsilon: f64,

    /// Offset of the active time zone from UTC, in minutes
    pub utc_offset_minutes: i32,
}

impl Default for LoadConfig {
    fn default() -> Self {
        LoadConfig {
            half_life_days: 3.0,
            warmup_days: 14,
            thresholds: RiskThresholds::default(),
            display_epsilon: 0.5,
            utc_offset_minutes: 0,
        }
    }
}

impl LoadConfig {
    /// Per-day retention with neutral recovery: `0.5 ^ (1 / half_life)`
    pub fn base_decay(&self) -> f64 {
        0.5_f64.powf(1.0 / self.half_life_days.max(f64::EPSILON))
    }

    /// Active time zone; an out-of-range offset falls back to UTC
    pub fn time_zone(&self) -> FixedOffset {
        FixedOffset::east_opt(self.utc_offset_minutes * 60).unwrap_or_else(|| Utc.fix())
    }

    /// Calendar day of an instant in the active time zone
    pub fn local_day(&self, instant: DateTime<Utc>) -> NaiveDate {
        instant.with_timezone(&self.time_zone()).date_naive()
    }
}

/// Coarse classification of load magnitude
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Safe,
    Caution,
    High,
    Critical,
}

impl RiskLevel {
    /// Classify a load value against the thresholds
    pub fn classify(load: f64, thresholds: &RiskThresholds) -> Self {
        if load >= thresholds.critical {
            RiskLevel::Critical
        } else if load >= thresholds.high {
            RiskLevel::High
        } else if load >= thresholds.caution {
            RiskLevel::Caution
        } else {
            RiskLevel::Safe
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            RiskLevel::Safe => "Within capacity",
            RiskLevel::Caution => "Approaching capacity (pace yourself)",
            RiskLevel::High => "Over capacity (plan rest)",
            RiskLevel::Critical => "Well over capacity (rest needed)",
        }
    }
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RiskLevel::Safe => write!(f, "Safe"),
            RiskLevel::Caution => write!(f, "Caution"),
            RiskLevel::High => write!(f, "High"),
            RiskLevel::Critical => write!(f, "Critical"),
        }
    }
}

/// Subjective override of the calculated load
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeltLoad {
    MuchLighter,
    Lighter,
    AsCalculated,
    Heavier,
    MuchHeavier,
}

impl FeltLoad {
    pub fn multiplier(&self) -> f64 {
        match self {
            FeltLoad::MuchLighter => 0.6,
            FeltLoad::Lighter => 0.8,
            FeltLoad::AsCalculated => 1.0,
            FeltLoad::Heavier => 1.2,
            FeltLoad::MuchHeavier => 1.4,
        }
    }

    /// Map a multiplier from the fixed set back to its variant
    pub fn from_multiplier(multiplier: f64) -> Option<Self> {
        [
            FeltLoad::MuchLighter,
            FeltLoad::Lighter,
            FeltLoad::AsCalculated,
            FeltLoad::Heavier,
            FeltLoad::MuchHeavier,
        ]
        .into_iter()
        .find(|felt| (felt.multiplier() - multiplier).abs() < 1e-9)
    }
}

/// Aggregated inputs for one calendar day
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyLoad {
    pub date: NaiveDate,

    /// Sum of the day's load contributions
    pub raw_load: f64,

    /// Product of the day's recovery modifiers (1.0 when none)
    pub recovery_modifier: f64,

    /// Number of contributors assigned to the day
    pub contributor_count: u16,

    /// Number of symptom records on the day
    pub symptom_count: u16,

    /// Highest symptom severity recorded on the day
    pub peak_severity: Option<u8>,
}

impl DailyLoad {
    fn empty(date: NaiveDate) -> Self {
        DailyLoad {
            date,
            raw_load: 0.0,
            recovery_modifier: 1.0,
            contributor_count: 0,
            symptom_count: 0,
            peak_severity: None,
        }
    }
}

/// Capacity load for one day
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoadScore {
    pub date: NaiveDate,

    /// Sum of same-day contributions
    pub raw_load: f64,

    /// Raw load plus the carried, recovery-adjusted load of earlier days
    pub decayed_load: f64,

    /// User override of how heavy the day felt
    pub felt_override: Option<FeltLoad>,

    /// `decayed_load * multiplier` when an override is present
    pub felt_load: Option<f64>,

    /// Classification of the decayed load
    pub risk_level: RiskLevel,

    /// Classification of the felt load when present, else of the decayed load
    pub effective_risk_level: RiskLevel,

    /// Recovery modifier applied to the carried load on this day
    pub recovery_modifier: f64,

    pub contributor_count: u16,
    pub symptom_count: u16,
    pub peak_severity: Option<u8>,
}

impl LoadScore {
    /// Load to present to the user: felt load if overridden
    pub fn effective_load(&self) -> f64 {
        self.felt_load.unwrap_or(self.decayed_load)
    }
}

/// Summary of a load series
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoadSummary {
    pub days: usize,
    pub peak_date: NaiveDate,
    pub peak_load: f64,
    pub average_load: f64,
    pub latest_risk: RiskLevel,
    /// Days spent at each effective risk level
    pub days_by_risk: BTreeMap<RiskLevel, u16>,
}

/// Core load calculation engine
pub struct LoadCalculator {
    config: LoadConfig,
}

impl LoadCalculator {
    /// Create new load calculator with default configuration
    pub fn new() -> Self {
        LoadCalculator {
            config: LoadConfig::default(),
        }
    }

    /// Create new load calculator with custom configuration
    pub fn with_config(config: LoadConfig) -> Self {
        LoadCalculator { config }
    }

    pub fn config(&self) -> &LoadConfig {
        &self.config
    }

    /// Carry-over factor for a day.
    ///
    /// The recovery modifier divides the effective half life, so the factor is
    /// `0.5 ^ (modifier / half_life)`: a modifier above 1 sheds load faster.
    pub fn decay_factor(&self, recovery_modifier: f64) -> f64 {
        self.config.base_decay().powf(recovery_modifier.max(0.0))
    }

    /// Group contributors and symptoms by local calendar day.
    ///
    /// Days are aggregated independently of each other, so the per-day sums run
    /// in parallel.
    pub fn aggregate_daily<C>(
        &self,
        contributors: &[C],
        symptoms: &[SymptomRecord],
    ) -> BTreeMap<NaiveDate, DailyLoad>
    where
        C: LoadContributor + Sync,
    {
        let mut by_day: BTreeMap<NaiveDate, (Vec<&C>, Vec<&SymptomRecord>)> = BTreeMap::new();

        for contributor in contributors {
            let day = self.config.local_day(contributor.effective_date());
            by_day.entry(day).or_default().0.push(contributor);
        }
        for symptom in symptoms {
            let day = self.config.local_day(symptom.effective_date());
            by_day.entry(day).or_default().1.push(symptom);
        }

        by_day
            .into_par_iter()
            .map(|(date, (day_contributors, day_symptoms))| {
                let mut daily = DailyLoad::empty(date);

                for contributor in &day_contributors {
                    daily.raw_load += contributor.load_contribution();
                    if let Some(modifier) = contributor.recovery_modifier() {
                        daily.recovery_modifier *= modifier;
                    }
                }
                daily.contributor_count = saturating_count(day_contributors.len());
                daily.symptom_count = saturating_count(day_symptoms.len());
                daily.peak_severity = day_symptoms.iter().map(|s| s.severity.value()).max();

                (date, daily)
            })
            .collect()
    }

    /// Calculate load scores for every day of `start..=end`.
    ///
    /// The decay fold starts at the earliest aggregated day, or `warmup_days`
    /// before `start` if that is earlier, so a day's decayed load does not
    /// depend on the requested range. Each day depends on the previous day's
    /// decayed load, so this loop is inherently sequential.
    pub fn calculate_series(
        &self,
        daily: &BTreeMap<NaiveDate, DailyLoad>,
        overrides: &BTreeMap<NaiveDate, FeltLoad>,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<LoadScore>, RangeError> {
        if start_date > end_date {
            return Err(RangeError::Inverted {
                start: start_date.to_string(),
                end: end_date.to_string(),
            });
        }

        let warmup_start = start_date
            .checked_sub_days(Days::new(self.config.warmup_days as u64))
            .unwrap_or(start_date);
        let calculation_start = daily
            .keys()
            .next()
            .map_or(warmup_start, |&first| first.min(warmup_start));

        let mut scores = Vec::new();
        let mut carried = 0.0_f64;
        let mut current_date = calculation_start;

        while current_date <= end_date {
            let day = daily
                .get(&current_date)
                .cloned()
                .unwrap_or_else(|| DailyLoad::empty(current_date));

            let decayed = day.raw_load + carried * self.decay_factor(day.recovery_modifier);
            carried = decayed;

            if current_date >= start_date {
                let felt_override = overrides.get(&current_date).copied();
                let felt_load = felt_override.map(|felt| decayed * felt.multiplier());
                let risk_level = RiskLevel::classify(decayed, &self.config.thresholds);
                let effective_risk_level = felt_load
                    .map(|felt| RiskLevel::classify(felt, &self.config.thresholds))
                    .unwrap_or(risk_level);

                scores.push(LoadScore {
                    date: current_date,
                    raw_load: day.raw_load,
                    decayed_load: decayed,
                    felt_override,
                    felt_load,
                    risk_level,
                    effective_risk_level,
                    recovery_modifier: day.recovery_modifier,
                    contributor_count: day.contributor_count,
                    symptom_count: day.symptom_count,
                    peak_severity: day.peak_severity,
                });
            }

            current_date = match current_date.succ_opt() {
                Some(next) => next,
                None => break,
            };
        }

        Ok(scores)
    }

    /// Group, fold, and keep only days with something to show
    pub fn calculate<C>(
        &self,
        contributors: &[C],
        symptoms: &[SymptomRecord],
        overrides: &BTreeMap<NaiveDate, FeltLoad>,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<LoadScore>, RangeError>
    where
        C: LoadContributor + Sync,
    {
        let daily = self.aggregate_daily(contributors, symptoms);
        let series = self.calculate_series(&daily, overrides, start_date, end_date)?;
        Ok(self.display_scores(series))
    }

    /// Keep the days with contributors, symptoms, an override, or visible carried load
    pub fn display_scores(&self, series: Vec<LoadScore>) -> Vec<LoadScore> {
        series
            .into_iter()
            .filter(|score| {
                score.contributor_count > 0
                    || score.symptom_count > 0
                    || score.felt_override.is_some()
                    || score.decayed_load >= self.config.display_epsilon
            })
            .collect()
    }

    /// Summarize a load series
    pub fn summarize(&self, series: &[LoadScore]) -> Option<LoadSummary> {
        let latest = series.last()?;
        let peak = series
            .iter()
            .max_by(|a, b| a.effective_load().total_cmp(&b.effective_load()))?;

        let mut days_by_risk = BTreeMap::new();
        for score in series {
            *days_by_risk.entry(score.effective_risk_level).or_insert(0u16) += 1;
        }

        let average_load =
            series.iter().map(LoadScore::effective_load).sum::<f64>() / series.len() as f64;

        Some(LoadSummary {
            days: series.len(),
            peak_date: peak.date,
            peak_load: peak.effective_load(),
            average_load,
            latest_risk: latest.effective_risk_level,
            days_by_risk,
        })
    }

    /// Generate pacing recommendations for a day
    pub fn generate_recommendations(&self, score: &LoadScore) -> Vec<String> {
        let mut recommendations = vec![score.effective_risk_level.description().to_string()];

        if score.recovery_modifier < 1.0 {
            recommendations.push("Poor sleep is slowing recovery".to_string());
        }

        let felt_heavier = score
            .felt_override
            .is_some_and(|felt| felt.multiplier() > 1.0);
        if felt_heavier && score.effective_risk_level > score.risk_level {
            recommendations.push("The day felt heavier than calculated".to_string());
        }

        match score.effective_risk_level {
            RiskLevel::High | RiskLevel::Critical => {
                recommendations.push("Schedule rest before adding new activities".to_string());
            }
            RiskLevel::Caution => {
                recommendations.push("Keep tomorrow light".to_string());
            }
            RiskLevel::Safe => {}
        }

        recommendations
    }
}

fn saturating_count(len: usize) -> u16 {
    u16::try_from(len).unwrap_or(u16::MAX)
}

impl Default for LoadCalculator {
    fn default() -> Self {
        Self::new()
    }
}
