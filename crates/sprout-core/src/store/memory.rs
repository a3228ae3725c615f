//! In-process [`PlanStore`], used by dry runs and tests.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveDate;
use sprout_db::models::PlanKind;
use uuid::Uuid;

use super::{PlanRecord, PlanStore};
use crate::pipeline::{NormalizedMeal, WorkoutDay};

/// An owned copy of an inserted [`PlanRecord`].
#[derive(Debug, Clone, PartialEq)]
pub enum StoredRecord {
    Meal { position: usize, meal: NormalizedMeal },
    Workout(WorkoutDay),
}

impl From<&PlanRecord<'_>> for StoredRecord {
    fn from(record: &PlanRecord<'_>) -> Self {
        match *record {
            PlanRecord::Meal { position, meal } => Self::Meal {
                position,
                meal: meal.clone(),
            },
            PlanRecord::Workout(day) => Self::Workout(day.clone()),
        }
    }
}

type Key = (PlanKind, Uuid, NaiveDate);

/// Records keyed by `(kind, user, date)`, in insertion order per key.
#[derive(Debug, Default)]
pub struct MemoryStore {
    days: Mutex<BTreeMap<Key, Vec<StoredRecord>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn days(&self) -> MutexGuard<'_, BTreeMap<Key, Vec<StoredRecord>>> {
        self.days.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Records stored for one day, in insertion order.
    pub fn records(&self, kind: PlanKind, user_id: Uuid, date: NaiveDate) -> Vec<StoredRecord> {
        self.days()
            .get(&(kind, user_id, date))
            .cloned()
            .unwrap_or_default()
    }

    /// Every non-empty day, ordered by kind, user, then date.
    pub fn snapshot(&self) -> BTreeMap<Key, Vec<StoredRecord>> {
        self.days()
            .iter()
            .filter(|(_, records)| !records.is_empty())
            .map(|(key, records)| (*key, records.clone()))
            .collect()
    }

    /// Total records across all days.
    pub fn len(&self) -> usize {
        self.days().values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl PlanStore for MemoryStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn delete_day(&self, kind: PlanKind, user_id: Uuid, date: NaiveDate) -> Result<u64> {
        let removed = self
            .days()
            .remove(&(kind, user_id, date))
            .map_or(0, |records| records.len());
        Ok(removed as u64)
    }

    async fn insert(&self, user_id: Uuid, date: NaiveDate, record: &PlanRecord<'_>) -> Result<()> {
        self.days()
            .entry((record.kind(), user_id, date))
            .or_default()
            .push(StoredRecord::from(record));
        Ok(())
    }
}
