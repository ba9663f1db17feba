//! Time-of-day and day-of-week patterns

use chrono::{Datelike, FixedOffset, Timelike, Weekday};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::models::{Event, SymptomRecord};

/// When a symptom most often shows up
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimePattern {
    pub symptom: String,

    /// Local hour (0-23) with the most records
    pub peak_hour: u32,

    /// Local weekday with the most records
    pub peak_weekday: Weekday,

    /// Records analysed
    pub occurrences: usize,

    /// Records in the peak hour
    pub peak_hour_count: usize,

    /// Records on the peak weekday
    pub peak_weekday_count: usize,
}

const WEEKDAYS: [Weekday; 7] = [
    Weekday::Mon,
    Weekday::Tue,
    Weekday::Wed,
    Weekday::Thu,
    Weekday::Fri,
    Weekday::Sat,
    Weekday::Sun,
];

/// Index and count of the largest bucket; ties go to the lowest index
fn mode(counts: &[usize]) -> (usize, usize) {
    counts
        .iter()
        .enumerate()
        .fold((0, 0), |best, (index, &count)| if count > best.1 { (index, count) } else { best })
}

/// Fewest records of a symptom a time pattern may rest on
pub const MIN_RECORDS: usize = 5;

/// One pattern per symptom with at least `min_occurrences` records (never fewer
/// than [`MIN_RECORDS`]), ordered by name
pub fn time_patterns(symptoms: &[SymptomRecord], time_zone: FixedOffset, min_occurrences: usize) -> Vec<TimePattern> {
    let mut by_symptom: BTreeMap<&str, ([usize; 24], [usize; 7], usize)> = BTreeMap::new();

    for symptom in symptoms {
        let local = symptom.effective_date().with_timezone(&time_zone);
        let (hours, weekdays, total) = by_symptom
            .entry(symptom.name.as_str())
            .or_insert(([0; 24], [0; 7], 0));
        hours[local.hour() as usize] += 1;
        weekdays[local.weekday().num_days_from_monday() as usize] += 1;
        *total += 1;
    }

    by_symptom
        .into_iter()
        .filter(|(_, (_, _, total))| *total >= min_occurrences.max(MIN_RECORDS))
        .map(|(name, (hours, weekdays, total))| {
            let (peak_hour, peak_hour_count) = mode(&hours);
            let (weekday_index, peak_weekday_count) = mode(&weekdays);

            TimePattern {
                symptom: name.to_string(),
                peak_hour: peak_hour as u32,
                peak_weekday: WEEKDAYS[weekday_index],
                occurrences: total,
                peak_hour_count,
                peak_weekday_count,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    fn utc() -> FixedOffset {
        FixedOffset::east_opt(0).unwrap()
    }

    // 2024-09-02 is a Monday
    fn record(name: &str, day: u32, hour: u32) -> SymptomRecord {
        SymptomRecord::new(name, 3, false, Utc.with_ymd_and_hms(2024, 9, day, hour, 30, 0).unwrap())
    }

    #[test]
    fn test_peak_hour_and_weekday() {
        let symptoms = vec![
            record("Migraine", 3, 15),
            record("Migraine", 10, 15),
            record("Migraine", 17, 15),
            record("Migraine", 4, 9),
            record("Migraine", 6, 21),
        ];

        let patterns = time_patterns(&symptoms, utc(), 5);
        assert_eq!(patterns.len(), 1);
        assert_eq!(patterns[0].peak_hour, 15);
        assert_eq!(patterns[0].peak_weekday, Weekday::Tue);
        assert_eq!(patterns[0].peak_hour_count, 3);
        assert_eq!(patterns[0].occurrences, 5);
    }

    #[test]
    fn test_below_minimum_excluded() {
        let symptoms: Vec<SymptomRecord> = (2..6).map(|d| record("Dizziness", d, 8)).collect();
        assert!(time_patterns(&symptoms, utc(), 5).is_empty());
        assert!(time_patterns(&symptoms, utc(), 1).is_empty());
    }

    #[test]
    fn test_ties_go_to_earliest() {
        let symptoms = vec![
            record("Fatigue", 6, 20),
            record("Fatigue", 2, 7),
            record("Fatigue", 6, 20),
            record("Fatigue", 2, 7),
            record("Fatigue", 4, 12),
        ];

        let pattern = &time_patterns(&symptoms, utc(), 5)[0];
        assert_eq!(pattern.peak_hour, 7);
        assert_eq!(pattern.peak_weekday, Weekday::Mon);
    }

    #[test]
    fn test_local_time_zone_shifts_hour_and_day() {
        // 02:30 UTC on Tuesday is 21:30 Monday at UTC-5
        let tuesday = Utc.with_ymd_and_hms(2024, 9, 3, 2, 30, 0).unwrap();
        let symptoms: Vec<SymptomRecord> = (0..5)
            .map(|w| SymptomRecord::new("Insomnia", 4, false, tuesday + Duration::weeks(w)))
            .collect();
        let tz = FixedOffset::west_opt(5 * 3600).unwrap();

        let pattern = &time_patterns(&symptoms, tz, 5)[0];
        assert_eq!(pattern.peak_hour, 21);
        assert_eq!(pattern.peak_weekday, Weekday::Mon);
    }
}
