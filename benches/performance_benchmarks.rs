use chrono::{DateTime, Duration, NaiveTime, TimeZone, Utc};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use pacetrack::analysis::{activity_correlations, detect_trends, physiological_correlations, AnalysisWindow};
use pacetrack::models::{BiometricSnapshot, ExertionRecord, SleepRecord, SymptomRecord};
use pacetrack::{Contributor, LoadCalculator};
use std::collections::BTreeMap;

/// Performance benchmarks for load and analysis calculations
///
/// Each benchmark runs over a year or less of synthetic daily logging, the
/// largest history a single user is expected to analyse at once.

fn origin() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
}

static ACTIVITIES: [&str; 5] = ["Walk", "Work", "Shopping", "Cooking", "Social"];
static SYMPTOMS: [&str; 4] = ["Fatigue", "Pain", "Brain fog", "Energy"];

fn create_contributors(days: i64) -> Vec<Contributor> {
    let mut contributors = Vec::new();
    for day in 0..days {
        let base = origin() + Duration::days(day);
        for (i, name) in ACTIVITIES.iter().enumerate() {
            let levels = ((day % 5) as u8 + 1, (i % 5) as u8 + 1, 2);
            let record = ExertionRecord::activity(*name, levels, base + Duration::hours(8 + i as i64 * 2))
                .with_duration(30 + (i as u32 * 15));
            contributors.push(Contributor::from_exertion(&record));
        }
        contributors.push(Contributor::from_sleep(&SleepRecord::main_period(
            (day % 5) as u8 + 1,
            7.5,
            base + Duration::hours(7),
        )));
    }
    contributors
}

fn create_activities(days: i64) -> Vec<ExertionRecord> {
    (0..days)
        .flat_map(|day| {
            let base = origin() + Duration::days(day);
            ACTIVITIES
                .iter()
                .enumerate()
                .filter(move |(i, _)| (day + *i as i64) % 3 != 0)
                .map(move |(i, name)| ExertionRecord::activity(*name, (3, 2, 2), base + Duration::hours(9 + i as i64)))
        })
        .collect()
}

fn create_symptoms(days: i64) -> Vec<SymptomRecord> {
    (0..days)
        .flat_map(|day| {
            let base = origin() + Duration::days(day);
            SYMPTOMS.iter().enumerate().map(move |(i, name)| {
                let severity = (day + i as i64) % 5 + 1;
                SymptomRecord::new(*name, severity, *name == "Energy", base + Duration::hours(14 + i as i64))
                    .with_biometrics(BiometricSnapshot {
                        hrv: Some(60.0 - severity as f64 * 3.0 + (day % 7) as f64),
                        resting_hr: Some(55.0 + severity as f64),
                        sleep_hours: Some(6.0 + (day % 3) as f64),
                    })
            })
        })
        .collect()
}

fn bench_load_calculation(c: &mut Criterion) {
    let mut group = c.benchmark_group("Load Calculation");
    let calculator = LoadCalculator::new();

    for &days in &[7i64, 30, 90, 365] {
        let contributors = create_contributors(days);
        let symptoms = create_symptoms(days);
        let start = origin().date_naive();
        let end = (origin() + Duration::days(days - 1)).date_naive();

        group.throughput(Throughput::Elements(days as u64));
        group.bench_with_input(
            BenchmarkId::new("aggregate_daily", days),
            &(&contributors, &symptoms),
            |b, (contributors, symptoms)| {
                b.iter(|| calculator.aggregate_daily(black_box(contributors.as_slice()), black_box(symptoms.as_slice())));
            },
        );

        let daily = calculator.aggregate_daily(&contributors, &symptoms);
        group.bench_with_input(BenchmarkId::new("calculate_series", days), &daily, |b, daily| {
            b.iter(|| calculator.calculate_series(black_box(daily), &BTreeMap::new(), start, end));
        });
    }

    group.finish();
}

fn bench_correlations(c: &mut Criterion) {
    let mut group = c.benchmark_group("Correlations");

    for &days in &[30i64, 90, 365] {
        let activities = create_activities(days);
        let symptoms = create_symptoms(days);

        group.throughput(Throughput::Elements((activities.len() + symptoms.len()) as u64));
        group.bench_with_input(
            BenchmarkId::new("activity_correlations", days),
            &(&activities, &symptoms),
            |b, (activities, symptoms)| {
                b.iter(|| activity_correlations(black_box(activities), black_box(symptoms), Duration::hours(24), 2));
            },
        );
        group.bench_with_input(BenchmarkId::new("physiological_correlations", days), &symptoms, |b, symptoms| {
            b.iter(|| physiological_correlations(black_box(symptoms), 3, 0.15));
        });
    }

    group.finish();
}

fn bench_trends(c: &mut Criterion) {
    let mut group = c.benchmark_group("Trends");

    for &days in &[30u32, 90, 365] {
        let symptoms = create_symptoms(days as i64);
        let end = (origin() + Duration::days(days as i64)).date_naive().and_time(NaiveTime::MIN).and_utc();
        let window = AnalysisWindow::new(end, days).unwrap();

        group.throughput(Throughput::Elements(symptoms.len() as u64));
        group.bench_with_input(BenchmarkId::new("detect_trends", days), &symptoms, |b, symptoms| {
            b.iter(|| detect_trends(black_box(symptoms), &window, 0.25));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_load_calculation, bench_correlations, bench_trends);
criterion_main!(benches);
