//! Load contributors
//!
//! Anything that exposes an effective date, a load contribution and an optional
//! recovery modifier can be folded into the daily load series. Exertion records
//! (activities, meals) add load; sleep records mostly change how fast load decays,
//! and only a poor main sleep adds load of its own.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{clamp_level, Event, ExertionRecord, SleepRecord};

/// Scale from average exertion (1-5) to load points per weighted hour
pub const EXERTION_SCALE: f64 = 6.0;

/// Duration weight is capped at two hours
pub const MAX_DURATION_WEIGHT: f64 = 2.0;

/// Load added per quality point below 3 for a poor main sleep
pub const POOR_SLEEP_LOAD_PER_POINT: f64 = 5.0;

/// Modifier for a restful nap (quality 4 or better)
pub const RESTFUL_NAP_MODIFIER: f64 = 1.1;

/// Modifier for any other nap
pub const RESTLESS_NAP_MODIFIER: f64 = 0.95;

/// Capability required by the load calculator
pub trait LoadContributor {
    /// Timestamp used to assign the contribution to a calendar day
    fn effective_date(&self) -> DateTime<Utc>;

    /// Direct addition to the day's raw load
    fn load_contribution(&self) -> f64;

    /// Multiplier on the day's decay rate; `None` leaves recovery unchanged.
    /// Values above 1 speed recovery, values below 1 slow it.
    fn recovery_modifier(&self) -> Option<f64>;
}

/// Exertion ratings and duration of an activity or meal
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExertionProfile {
    pub physical: u8,
    pub cognitive: u8,
    pub emotional: u8,
    pub duration_minutes: Option<u32>,
    pub type_weight: f64,
}

impl ExertionProfile {
    /// Average of the three clamped exertion levels
    pub fn average_level(&self) -> f64 {
        let total = clamp_level(self.physical as i64) as f64
            + clamp_level(self.cognitive as i64) as f64
            + clamp_level(self.emotional as i64) as f64;
        total / 3.0
    }

    /// `min(minutes / 60, 2.0)`, or 1.0 when the duration is unknown
    pub fn duration_weight(&self) -> f64 {
        match self.duration_minutes {
            Some(minutes) => (minutes as f64 / 60.0).min(MAX_DURATION_WEIGHT),
            None => 1.0,
        }
    }

    pub fn load(&self) -> f64 {
        self.average_level() * self.duration_weight() * self.type_weight * EXERTION_SCALE
    }
}

/// Quality and kind of a sleep period
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RecoveryProfile {
    pub quality: u8,
    pub duration_hours: f64,
    pub is_main_period: bool,
}

impl RecoveryProfile {
    fn quality(&self) -> u8 {
        clamp_level(self.quality as i64)
    }

    pub fn modifier(&self) -> f64 {
        let quality = self.quality();
        if self.is_main_period {
            match quality {
                1 => 0.5,
                2 => 0.7,
                3 => 1.0,
                4 => 1.2,
                _ => 1.4,
            }
        } else if quality >= 4 {
            RESTFUL_NAP_MODIFIER
        } else {
            RESTLESS_NAP_MODIFIER
        }
    }

    /// Quality 1 main sleep adds 10, quality 2 adds 5, everything else adds nothing
    pub fn load(&self) -> f64 {
        let quality = self.quality();
        if self.is_main_period && quality <= 2 {
            (3 - quality) as f64 * POOR_SLEEP_LOAD_PER_POINT
        } else {
            0.0
        }
    }
}

/// Per-category default behaviour, selected by variant
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ContributorStrategy {
    Exertion(ExertionProfile),
    Recovery(RecoveryProfile),
}

impl ContributorStrategy {
    pub fn load_contribution(&self) -> f64 {
        match self {
            ContributorStrategy::Exertion(profile) => profile.load(),
            ContributorStrategy::Recovery(profile) => profile.load(),
        }
    }

    pub fn recovery_modifier(&self) -> Option<f64> {
        match self {
            ContributorStrategy::Exertion(_) => None,
            ContributorStrategy::Recovery(profile) => Some(profile.modifier()),
        }
    }
}

impl From<&ExertionRecord> for ExertionProfile {
    fn from(record: &ExertionRecord) -> Self {
        ExertionProfile {
            physical: record.physical,
            cognitive: record.cognitive,
            emotional: record.emotional,
            duration_minutes: record.duration_minutes,
            type_weight: record.kind.type_weight(),
        }
    }
}

impl From<&SleepRecord> for RecoveryProfile {
    fn from(record: &SleepRecord) -> Self {
        RecoveryProfile {
            quality: record.quality,
            duration_hours: record.duration_hours,
            is_main_period: record.is_main_period,
        }
    }
}

impl LoadContributor for ExertionRecord {
    fn effective_date(&self) -> DateTime<Utc> {
        Event::effective_date(self)
    }

    fn load_contribution(&self) -> f64 {
        ExertionProfile::from(self).load()
    }

    fn recovery_modifier(&self) -> Option<f64> {
        None
    }
}

impl LoadContributor for SleepRecord {
    fn effective_date(&self) -> DateTime<Utc> {
        Event::effective_date(self)
    }

    fn load_contribution(&self) -> f64 {
        RecoveryProfile::from(self).load()
    }

    fn recovery_modifier(&self) -> Option<f64> {
        Some(RecoveryProfile::from(self).modifier())
    }
}

/// A normalized contributor as fed to the load calculator
#[derive(Debug, Clone, PartialEq)]
pub struct Contributor {
    pub effective_date: DateTime<Utc>,
    pub label: String,
    pub strategy: ContributorStrategy,
}

impl Contributor {
    pub fn from_exertion(record: &ExertionRecord) -> Self {
        Contributor {
            effective_date: Event::effective_date(record),
            label: record.name.clone(),
            strategy: ContributorStrategy::Exertion(ExertionProfile::from(record)),
        }
    }

    pub fn from_sleep(record: &SleepRecord) -> Self {
        Contributor {
            effective_date: Event::effective_date(record),
            label: if record.is_main_period {
                "Sleep".to_string()
            } else {
                "Nap".to_string()
            },
            strategy: ContributorStrategy::Recovery(RecoveryProfile::from(record)),
        }
    }
}

impl LoadContributor for Contributor {
    fn effective_date(&self) -> DateTime<Utc> {
        self.effective_date
    }

    fn load_contribution(&self) -> f64 {
        self.strategy.load_contribution()
    }

    fn recovery_modifier(&self) -> Option<f64> {
        self.strategy.recovery_modifier()
    }
}

/// Breakdown of one contributor, for display
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContributionDetail {
    pub label: String,
    pub effective_date: DateTime<Utc>,
    pub load: f64,
    pub recovery_modifier: Option<f64>,
}

impl From<&Contributor> for ContributionDetail {
    fn from(contributor: &Contributor) -> Self {
        ContributionDetail {
            label: contributor.label.clone(),
            effective_date: contributor.effective_date,
            load: contributor.load_contribution(),
            recovery_modifier: contributor.recovery_modifier(),
        }
    }
}
