//! Plan commit: replace each day's stored records with delete-then-insert.
//!
//! Days are independent. A failure ends that day only; earlier days stay
//! committed and, in a weekly commit, later days are still attempted.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use chrono::NaiveDate;
use sprout_db::models::PlanKind;
use thiserror::Error;
use tokio::sync::OwnedMutexGuard;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::normalize::{DayContent, DayPlan};
use crate::store::{PlanRecord, PlanStore};

// ---------------------------------------------------------------------------
// Results
// ---------------------------------------------------------------------------

/// Why a day was not (fully) committed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommitError {
    #[error("failed to clear existing {kind} records for {date}: {reason}")]
    Delete {
        kind: PlanKind,
        date: NaiveDate,
        reason: String,
    },

    /// Earlier inserts for the day, if any, remain stored.
    #[error("failed to insert {kind} record #{index} for {date}: {reason}")]
    Insert {
        kind: PlanKind,
        date: NaiveDate,
        index: usize,
        reason: String,
    },

    #[error("commit cancelled before {date}")]
    Cancelled { date: NaiveDate },
}

/// Rows touched by a successful day commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CommitSummary {
    pub deleted: u64,
    pub inserted: usize,
}

/// Outcome of committing one date.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitResult {
    pub date: NaiveDate,
    pub outcome: Result<CommitSummary, CommitError>,
}

impl CommitResult {
    pub fn is_ok(&self) -> bool {
        self.outcome.is_ok()
    }
}

/// Overall state of a multi-day commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitStatus {
    /// Every date committed.
    Succeeded,
    /// Some dates committed, some did not.
    Partial,
    /// No date committed.
    Failed,
}

impl std::fmt::Display for CommitStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Succeeded => "succeeded",
            Self::Partial => "partial",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Per-date results of a weekly commit, in calendar order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct WeeklyCommitReport {
    pub results: Vec<CommitResult>,
}

impl WeeklyCommitReport {
    pub fn status(&self) -> CommitStatus {
        status_of(&self.results)
    }

    pub fn failures(&self) -> impl Iterator<Item = (NaiveDate, &CommitError)> {
        self.results
            .iter()
            .filter_map(|r| r.outcome.as_ref().err().map(|e| (r.date, e)))
    }

    pub fn succeeded(&self) -> usize {
        self.results.iter().filter(|r| r.is_ok()).count()
    }
}

pub(crate) fn status_of(results: &[CommitResult]) -> CommitStatus {
    let ok = results.iter().filter(|r| r.is_ok()).count();
    if ok == results.len() {
        CommitStatus::Succeeded
    } else if ok == 0 {
        CommitStatus::Failed
    } else {
        CommitStatus::Partial
    }
}

// ---------------------------------------------------------------------------
// Per-day locks
// ---------------------------------------------------------------------------

type DayKey = (PlanKind, Uuid, NaiveDate);

/// Serializes commits for the same `(kind, user, date)` within a process.
///
/// Entries are dropped once no task holds or awaits them.
#[derive(Debug, Default)]
pub struct DayLocks {
    locks: Mutex<HashMap<DayKey, Arc<tokio::sync::Mutex<()>>>>,
}

impl DayLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to one day.
    pub async fn acquire(
        &self,
        kind: PlanKind,
        user_id: Uuid,
        date: NaiveDate,
    ) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
            locks.retain(|_, lock| Arc::strong_count(lock) > 1);
            Arc::clone(locks.entry((kind, user_id, date)).or_default())
        };
        lock.lock_owned().await
    }
}

// ---------------------------------------------------------------------------
// Commit
// ---------------------------------------------------------------------------

/// Replace the stored records of `day.kind()` for `(user_id, day.date)`.
///
/// Deletes first, then inserts each record in order. The first failing
/// store call ends the day; deleted rows are not restored.
pub async fn commit_day(
    store: &dyn PlanStore,
    locks: &DayLocks,
    user_id: Uuid,
    day: &DayPlan,
) -> CommitResult {
    let kind = day.kind();
    let date = day.date;
    let _guard = locks.acquire(kind, user_id, date).await;

    let deleted = match store.delete_day(kind, user_id, date).await {
        Ok(n) => n,
        Err(e) => {
            warn!(%kind, %user_id, %date, error = %e, "delete failed");
            return CommitResult {
                date,
                outcome: Err(CommitError::Delete {
                    kind,
                    date,
                    reason: format!("{e:#}"),
                }),
            };
        }
    };

    let records: Vec<PlanRecord<'_>> = match &day.content {
        DayContent::Meals(meals) => meals
            .iter()
            .enumerate()
            .map(|(position, meal)| PlanRecord::Meal { position, meal })
            .collect(),
        DayContent::Workout(workout) => vec![PlanRecord::Workout(workout)],
    };

    for (index, record) in records.iter().enumerate() {
        if let Err(e) = store.insert(user_id, date, record).await {
            warn!(%kind, %user_id, %date, index, error = %e, "insert failed");
            return CommitResult {
                date,
                outcome: Err(CommitError::Insert {
                    kind,
                    date,
                    index,
                    reason: format!("{e:#}"),
                }),
            };
        }
    }

    debug!(%kind, %user_id, %date, deleted, inserted = records.len(), store = store.name(), "day committed");
    CommitResult {
        date,
        outcome: Ok(CommitSummary {
            deleted,
            inserted: records.len(),
        }),
    }
}

/// Commit a single-day plan. The day's error is the request's error.
pub async fn commit_single(
    store: &dyn PlanStore,
    locks: &DayLocks,
    user_id: Uuid,
    day: &DayPlan,
) -> Result<CommitResult, CommitError> {
    let result = commit_day(store, locks, user_id, day).await;
    match result.outcome {
        Ok(_) => Ok(result),
        Err(e) => Err(e),
    }
}

/// Commit each day in calendar order, collecting every outcome.
///
/// `cancel` is checked before each date; once it fires, the remaining dates
/// are reported as [`CommitError::Cancelled`] without touching the store.
pub async fn commit_week(
    store: &dyn PlanStore,
    locks: &DayLocks,
    user_id: Uuid,
    days: &[DayPlan],
    cancel: &CancellationToken,
) -> WeeklyCommitReport {
    let mut ordered: Vec<&DayPlan> = days.iter().collect();
    ordered.sort_by_key(|d| d.date);

    let mut report = WeeklyCommitReport::default();
    for day in ordered {
        if cancel.is_cancelled() {
            report.results.push(CommitResult {
                date: day.date,
                outcome: Err(CommitError::Cancelled { date: day.date }),
            });
            continue;
        }
        report
            .results
            .push(commit_day(store, locks, user_id, day).await);
    }

    let failed = report.results.len() - report.succeeded();
    info!(
        %user_id,
        days = report.results.len(),
        failed,
        status = %report.status(),
        "weekly commit finished"
    );
    report
}
