//! The `PlanStore` trait -- where committed plans are written.
//!
//! [`PgPlanStore`] writes to the Postgres tables; [`MemoryStore`] keeps
//! records in process for dry runs and tests.

pub mod memory;
pub mod postgres;

use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveDate;
use sprout_db::models::PlanKind;
use uuid::Uuid;

use crate::pipeline::{NormalizedMeal, WorkoutDay};

pub use memory::{MemoryStore, StoredRecord};
pub use postgres::PgPlanStore;

/// One record to insert for a user and date.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PlanRecord<'a> {
    /// A meal and its order within the day.
    Meal {
        position: usize,
        meal: &'a NormalizedMeal,
    },
    /// The whole workout day; stored as a single row.
    Workout(&'a WorkoutDay),
}

impl PlanRecord<'_> {
    pub fn kind(&self) -> PlanKind {
        match self {
            Self::Meal { .. } => PlanKind::Meal,
            Self::Workout(_) => PlanKind::Workout,
        }
    }
}

/// Persistence for normalized plans.
///
/// Each call is atomic on its own. Callers sequence a day's delete and
/// inserts; no call spans more than one statement's worth of rows.
#[async_trait]
pub trait PlanStore: Send + Sync {
    /// Short name for logs (e.g. "postgres").
    fn name(&self) -> &str;

    /// Remove every `kind` record for `(user_id, date)`. Returns the number
    /// removed.
    async fn delete_day(&self, kind: PlanKind, user_id: Uuid, date: NaiveDate) -> Result<u64>;

    /// Insert one record for `(user_id, date)`.
    async fn insert(&self, user_id: Uuid, date: NaiveDate, record: &PlanRecord<'_>) -> Result<()>;
}

// Compile-time assertion: PlanStore must be object-safe.
const _: () = {
    fn _assert_object_safe(_: &dyn PlanStore) {}
};
