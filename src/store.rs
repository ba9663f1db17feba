//! Read-only event store seam
//!
//! The store itself lives outside this crate; analytics only read from it.
//! `MemoryEventStore` backs tests and embedding, `JsonEventStore` backs the CLI.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::contributor::Contributor;
use crate::error::StoreError;
use crate::load::FeltLoad;
use crate::models::{DateRange, Event, ExertionKind, ExertionRecord, SleepRecord, SymptomRecord};

/// Read-only access to logged events
pub trait EventStore: Send + Sync {
    fn symptoms(&self, range: &DateRange) -> Result<Vec<SymptomRecord>, StoreError>;

    fn activities(&self, range: &DateRange) -> Result<Vec<ExertionRecord>, StoreError>;

    fn meals(&self, range: &DateRange) -> Result<Vec<ExertionRecord>, StoreError>;

    fn sleep(&self, range: &DateRange) -> Result<Vec<SleepRecord>, StoreError>;

    /// Felt-load overrides keyed by local calendar day
    fn felt_load_overrides(
        &self,
        _start: NaiveDate,
        _end: NaiveDate,
    ) -> Result<BTreeMap<NaiveDate, FeltLoad>, StoreError> {
        Ok(BTreeMap::new())
    }

    /// Every load contributor in the range
    fn contributors(&self, range: &DateRange) -> Result<Vec<Contributor>, StoreError> {
        let mut contributors: Vec<Contributor> = self
            .activities(range)?
            .iter()
            .chain(self.meals(range)?.iter())
            .map(Contributor::from_exertion)
            .collect();
        contributors.extend(self.sleep(range)?.iter().map(Contributor::from_sleep));
        contributors.sort_by_key(|c| c.effective_date);
        Ok(contributors)
    }
}

/// Serialized contents of an event store
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EventLog {
    #[serde(default)]
    pub symptoms: Vec<SymptomRecord>,

    /// Activities and meals, distinguished by `kind`
    #[serde(default)]
    pub exertions: Vec<ExertionRecord>,

    #[serde(default)]
    pub sleep: Vec<SleepRecord>,

    #[serde(default)]
    pub felt_load: BTreeMap<NaiveDate, FeltLoad>,
}

impl EventLog {
    fn symptoms_in(&self, range: &DateRange) -> Vec<SymptomRecord> {
        filter_range(&self.symptoms, range)
    }

    fn exertions_in(&self, range: &DateRange, kind: ExertionKind) -> Vec<ExertionRecord> {
        self.exertions
            .iter()
            .filter(|e| e.kind == kind && range.contains(Event::effective_date(*e)))
            .cloned()
            .collect()
    }

    fn sleep_in(&self, range: &DateRange) -> Vec<SleepRecord> {
        self.sleep
            .iter()
            .filter(|s| range.contains(Event::effective_date(*s)))
            .cloned()
            .collect()
    }

    fn overrides_in(&self, start: NaiveDate, end: NaiveDate) -> BTreeMap<NaiveDate, FeltLoad> {
        self.felt_load
            .range(start..=end)
            .map(|(date, felt)| (*date, *felt))
            .collect()
    }
}

fn filter_range<E: Event + Clone>(events: &[E], range: &DateRange) -> Vec<E> {
    events
        .iter()
        .filter(|e| range.contains(e.effective_date()))
        .cloned()
        .collect()
}

/// In-memory event store
#[derive(Debug, Clone, Default)]
pub struct MemoryEventStore {
    log: EventLog,
}

impl MemoryEventStore {
    pub fn new(log: EventLog) -> Self {
        MemoryEventStore { log }
    }

    pub fn log(&self) -> &EventLog {
        &self.log
    }
}

impl EventStore for MemoryEventStore {
    fn symptoms(&self, range: &DateRange) -> Result<Vec<SymptomRecord>, StoreError> {
        Ok(self.log.symptoms_in(range))
    }

    fn activities(&self, range: &DateRange) -> Result<Vec<ExertionRecord>, StoreError> {
        Ok(self.log.exertions_in(range, ExertionKind::Activity))
    }

    fn meals(&self, range: &DateRange) -> Result<Vec<ExertionRecord>, StoreError> {
        Ok(self.log.exertions_in(range, ExertionKind::Meal))
    }

    fn sleep(&self, range: &DateRange) -> Result<Vec<SleepRecord>, StoreError> {
        Ok(self.log.sleep_in(range))
    }

    fn felt_load_overrides(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<BTreeMap<NaiveDate, FeltLoad>, StoreError> {
        Ok(self.log.overrides_in(start, end))
    }
}

/// Event store backed by a JSON export, re-read on every query
#[derive(Debug, Clone)]
pub struct JsonEventStore {
    path: PathBuf,
}

impl JsonEventStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        JsonEventStore { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> Result<EventLog, StoreError> {
        let content = fs::read_to_string(&self.path).map_err(|e| StoreError::Unavailable {
            reason: format!("{}: {}", self.path.display(), e),
        })?;

        let log: EventLog = serde_json::from_str(&content).map_err(|e| StoreError::Corrupted {
            path: self.path.clone(),
            reason: e.to_string(),
        })?;

        debug!(
            path = %self.path.display(),
            symptoms = log.symptoms.len(),
            exertions = log.exertions.len(),
            sleep = log.sleep.len(),
            "Event log loaded"
        );
        Ok(log)
    }
}

impl EventStore for JsonEventStore {
    fn symptoms(&self, range: &DateRange) -> Result<Vec<SymptomRecord>, StoreError> {
        Ok(self.read()?.symptoms_in(range))
    }

    fn activities(&self, range: &DateRange) -> Result<Vec<ExertionRecord>, StoreError> {
        Ok(self.read()?.exertions_in(range, ExertionKind::Activity))
    }

    fn meals(&self, range: &DateRange) -> Result<Vec<ExertionRecord>, StoreError> {
        Ok(self.read()?.exertions_in(range, ExertionKind::Meal))
    }

    fn sleep(&self, range: &DateRange) -> Result<Vec<SleepRecord>, StoreError> {
        Ok(self.read()?.sleep_in(range))
    }

    fn felt_load_overrides(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<BTreeMap<NaiveDate, FeltLoad>, StoreError> {
        Ok(self.read()?.overrides_in(start, end))
    }

    fn contributors(&self, range: &DateRange) -> Result<Vec<Contributor>, StoreError> {
        let log = self.read()?;
        let mut contributors: Vec<Contributor> = log
            .exertions
            .iter()
            .filter(|e| range.contains(Event::effective_date(*e)))
            .map(Contributor::from_exertion)
            .collect();
        contributors.extend(log.sleep_in(range).iter().map(Contributor::from_sleep));
        contributors.sort_by_key(|c| c.effective_date);
        Ok(contributors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use tempfile::tempdir;

    fn sample_log() -> EventLog {
        let day = |d| Utc.with_ymd_and_hms(2024, 6, d, 10, 0, 0).unwrap();
        EventLog {
            symptoms: vec![
                SymptomRecord::new("Fatigue", 3, false, day(1)),
                SymptomRecord::new("Fatigue", 4, false, day(20)),
            ],
            exertions: vec![
                ExertionRecord::activity("Walk", (3, 1, 1), day(2)),
                ExertionRecord::meal("Lunch", (1, 1, 1), day(2)),
            ],
            sleep: vec![SleepRecord::main_period(4, 8.0, day(2))],
            felt_load: BTreeMap::from([(
                NaiveDate::from_ymd_opt(2024, 6, 2).unwrap(),
                FeltLoad::Heavier,
            )]),
        }
    }

    fn june(from: u32, to: u32) -> DateRange {
        DateRange::new(
            Utc.with_ymd_and_hms(2024, 6, from, 0, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2024, 6, to, 0, 0, 0).unwrap(),
        )
        .unwrap()
    }

    #[test]
    fn test_memory_store_filters_by_range() {
        let store = MemoryEventStore::new(sample_log());
        let range = june(1, 10);

        assert_eq!(store.symptoms(&range).unwrap().len(), 1);
        assert_eq!(store.activities(&range).unwrap().len(), 1);
        assert_eq!(store.meals(&range).unwrap().len(), 1);
        assert_eq!(store.contributors(&range).unwrap().len(), 3);
    }

    #[test]
    fn test_backdated_record_uses_effective_date() {
        let mut log = sample_log();
        log.symptoms[1].backdated_at = Some(Utc.with_ymd_and_hms(2024, 6, 5, 8, 0, 0).unwrap());
        let store = MemoryEventStore::new(log);

        assert_eq!(store.symptoms(&june(1, 10)).unwrap().len(), 2);
    }

    #[test]
    fn test_json_store_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("events.json");
        fs::write(&path, serde_json::to_string(&sample_log()).unwrap()).unwrap();

        let store = JsonEventStore::new(&path);
        let range = june(1, 10);
        assert_eq!(store.contributors(&range).unwrap().len(), 3);

        let start = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
        let end = NaiveDate::from_ymd_opt(2024, 6, 30).unwrap();
        assert_eq!(store.felt_load_overrides(start, end).unwrap().len(), 1);
    }

    #[test]
    fn test_json_store_missing_file_is_unavailable() {
        let store = JsonEventStore::new("/nonexistent/events.json");
        let err = store.symptoms(&june(1, 10)).unwrap_err();
        assert!(matches!(err, StoreError::Unavailable { .. }));
    }
}
