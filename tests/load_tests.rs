//! Load calculation workflows through the public API

use chrono::{NaiveDate, NaiveTime};
use pacetrack::contributor::Contributor;
use pacetrack::load::{FeltLoad, LoadCalculator, LoadConfig, RiskLevel};
use pacetrack::models::{clamp_level, descriptor, ExertionRecord, Severity, SleepRecord, SymptomRecord};
use pacetrack::LoadContributor;
use proptest::prelude::*;
use std::collections::BTreeMap;

fn date(day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 3, day).unwrap()
}

fn at(day: u32, hour: u32) -> chrono::DateTime<chrono::Utc> {
    date(day).and_time(NaiveTime::from_hms_opt(hour, 0, 0).unwrap()).and_utc()
}

#[test]
fn test_exertion_scenario() {
    let walk = ExertionRecord::activity("Walk", (4, 2, 2), at(1, 9)).with_duration(90);
    assert!((walk.load_contribution() - 24.0).abs() < 0.01);
}

#[test]
fn test_week_of_events() {
    let calculator = LoadCalculator::new();

    let mut contributors = Vec::new();
    for day in 1..=7 {
        contributors.push(Contributor::from_exertion(
            &ExertionRecord::activity("Work", (2, 4, 3), at(day, 10)).with_duration(120),
        ));
        contributors.push(Contributor::from_exertion(
            &ExertionRecord::meal("Dinner", (1, 1, 1), at(day, 19)).with_duration(45),
        ));
        contributors.push(Contributor::from_sleep(&SleepRecord::main_period(
            if day % 2 == 0 { 2 } else { 4 },
            7.0,
            at(day, 7),
        )));
    }
    let symptoms = vec![
        SymptomRecord::new("Fatigue", 4, false, at(3, 15)),
        SymptomRecord::new("Fatigue", 9, false, at(6, 15)),
    ];

    let scores = calculator
        .calculate(&contributors, &symptoms, &BTreeMap::new(), date(1), date(10))
        .unwrap();

    // Seven active days plus carried load that is still visible afterwards
    assert!(scores.len() >= 7);
    assert!(scores.windows(2).all(|w| w[0].date < w[1].date));

    let day6 = scores.iter().find(|s| s.date == date(6)).unwrap();
    assert_eq!(day6.peak_severity, Some(5));
    assert!(day6.decayed_load > day6.raw_load);
    assert!(day6.risk_level >= RiskLevel::Caution);
}

#[test]
fn test_felt_load_override_changes_effective_risk_only() {
    let calculator = LoadCalculator::new();
    let contributors = vec![Contributor::from_exertion(
        &ExertionRecord::activity("Move house", (5, 5, 5), at(1, 9)).with_duration(120),
    )];
    let overrides = BTreeMap::from([(date(1), FeltLoad::MuchLighter)]);

    let scores = calculator
        .calculate(&contributors, &[], &overrides, date(1), date(1))
        .unwrap();

    assert_eq!(scores[0].risk_level, RiskLevel::Caution);
    assert_eq!(scores[0].effective_risk_level, RiskLevel::Safe);
    assert!((scores[0].effective_load() - 36.0).abs() < 1e-9);
}

#[test]
fn test_custom_thresholds_and_half_life() {
    let mut config = LoadConfig::default();
    config.half_life_days = 1.0;
    config.thresholds.caution = 10.0;
    let calculator = LoadCalculator::with_config(config);

    let contributors = vec![Contributor::from_exertion(
        &ExertionRecord::activity("Walk", (3, 3, 3), at(1, 9)),
    )];
    let scores = calculator
        .calculate(&contributors, &[], &BTreeMap::new(), date(1), date(2))
        .unwrap();

    assert_eq!(scores[0].risk_level, RiskLevel::Caution);
    assert!((scores[1].decayed_load - 9.0).abs() < 1e-9);
}

proptest! {
    #[test]
    fn prop_decay_is_monotonic_without_new_load(
        physical in 1u8..=5,
        cognitive in 1u8..=5,
        emotional in 1u8..=5,
        minutes in 1u32..=240,
    ) {
        let calculator = LoadCalculator::new();
        let contributors = vec![Contributor::from_exertion(
            &ExertionRecord::activity("Anything", (physical, cognitive, emotional), at(1, 9))
                .with_duration(minutes),
        )];
        let daily = calculator.aggregate_daily(&contributors, &[]);
        let series = calculator
            .calculate_series(&daily, &BTreeMap::new(), date(1), date(31))
            .unwrap();

        for pair in series.windows(2) {
            prop_assert!(pair[1].decayed_load <= pair[0].decayed_load);
        }

        // At most 60 load points with a 3 day half life: under 0.5 within 21 days
        prop_assert!(series[21].decayed_load < calculator.config().display_epsilon);
    }

    #[test]
    fn prop_clamped_levels_stay_on_scale(raw in any::<i64>()) {
        let level = clamp_level(raw);
        prop_assert!((1..=5).contains(&level));
        prop_assert_eq!(Severity::new(raw).value(), level);
    }

    #[test]
    fn prop_descriptor_matches_clamped_value(raw in -100i64..100, is_positive in any::<bool>()) {
        prop_assert_eq!(descriptor(raw, is_positive), descriptor(clamp_level(raw) as i64, is_positive));
    }

    #[test]
    fn prop_better_sleep_never_slows_recovery(quality in 1u8..=4) {
        let calculator = LoadCalculator::new();
        let worse = SleepRecord::main_period(quality, 7.0, at(2, 7)).recovery_modifier().unwrap();
        let better = SleepRecord::main_period(quality + 1, 7.0, at(2, 7)).recovery_modifier().unwrap();
        prop_assert!(calculator.decay_factor(better) < calculator.decay_factor(worse));
    }
}
