//! End-to-end tests for the plan service against canned generator output.
//!
//! The completion backend is scripted and records go to an in-memory store,
//! so these tests need neither a generator nor a database.

use std::sync::{Arc, Mutex};

use anyhow::{Result, bail};
use async_trait::async_trait;
use chrono::NaiveDate;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use sprout_core::completion::{Completion, CompletionRequest};
use sprout_core::config::PipelineConfig;
use sprout_core::pipeline::{
    CommitError, CommitStatus, DayContent, PipelineError, PlanRequest, PlanService, PlanWindow,
    Resolution,
};
use sprout_core::store::{MemoryStore, PlanRecord, PlanStore, StoredRecord};
use sprout_db::models::PlanKind;
use sprout_test_utils::fixtures;

// ===========================================================================
// Test doubles
// ===========================================================================

/// Returns a fixed response and remembers every request.
struct ScriptedCompletion {
    response: Result<String, String>,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedCompletion {
    fn new(response: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            response: Ok(response.into()),
            requests: Mutex::new(Vec::new()),
        })
    }

    fn failing(message: &str) -> Arc<Self> {
        Arc::new(Self {
            response: Err(message.to_string()),
            requests: Mutex::new(Vec::new()),
        })
    }

    fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Completion for ScriptedCompletion {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<String> {
        self.requests.lock().unwrap().push(request.clone());
        match &self.response {
            Ok(text) => Ok(text.clone()),
            Err(message) => bail!("{message}"),
        }
    }
}

/// Memory store that fails inserts on one date and can cancel a token once a
/// chosen date has been cleared.
#[derive(Default)]
struct FlakyStore {
    inner: MemoryStore,
    fail_insert_on: Option<NaiveDate>,
    cancel_after_delete: Option<(NaiveDate, CancellationToken)>,
}

#[async_trait]
impl PlanStore for FlakyStore {
    fn name(&self) -> &str {
        "flaky"
    }

    async fn delete_day(&self, kind: PlanKind, user_id: Uuid, date: NaiveDate) -> Result<u64> {
        let removed = self.inner.delete_day(kind, user_id, date).await?;
        if let Some((on, token)) = &self.cancel_after_delete {
            if *on == date {
                token.cancel();
            }
        }
        Ok(removed)
    }

    async fn insert(&self, user_id: Uuid, date: NaiveDate, record: &PlanRecord<'_>) -> Result<()> {
        if self.fail_insert_on == Some(date) {
            bail!("insert rejected for {date}");
        }
        self.inner.insert(user_id, date, record).await
    }
}

// ===========================================================================
// Helpers
// ===========================================================================

fn monday() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 3, 4).unwrap()
}

fn day(offset: i64) -> NaiveDate {
    monday() + chrono::Duration::days(offset)
}

fn request(user_id: Uuid, kind: PlanKind, window: PlanWindow) -> PlanRequest {
    PlanRequest {
        user_id,
        kind,
        window,
        prompt: "Plan my food.".to_string(),
    }
}

fn service(completion: Arc<dyn Completion>, store: Arc<dyn PlanStore>) -> PlanService {
    PlanService::new(completion, store, PipelineConfig::default()).with_model("test-model")
}

fn meal_calories(records: &[StoredRecord]) -> Vec<Option<f64>> {
    records
        .iter()
        .map(|r| match r {
            StoredRecord::Meal { meal, .. } => meal.calories,
            StoredRecord::Workout(_) => panic!("unexpected workout record"),
        })
        .collect()
}

// ===========================================================================
// Single day
// ===========================================================================

#[tokio::test]
async fn single_day_fenced_meals() {
    let completion = ScriptedCompletion::new(fixtures::single_day_meals_response());
    let store = Arc::new(MemoryStore::new());
    let svc = service(completion.clone(), store.clone());
    let user = Uuid::new_v4();

    let outcome = svc
        .generate(
            &request(user, PlanKind::Meal, PlanWindow::Day(monday())),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(outcome.resolution, Resolution::Single);
    assert_eq!(outcome.days.len(), 1);
    assert_eq!(outcome.commits.len(), 1);
    assert_eq!(outcome.status(), CommitStatus::Succeeded);

    let stored = store.records(PlanKind::Meal, user, monday());
    assert_eq!(
        meal_calories(&stored),
        vec![Some(300.0), Some(301.0), Some(302.0), Some(303.0)]
    );
    match &stored[0] {
        StoredRecord::Meal { position, meal } => {
            assert_eq!(*position, 0);
            assert_eq!(meal.meal_type, "breakfast");
            assert_eq!(meal.carbs, Some(45.0));
            assert_eq!(meal.fat, Some(12.0));
        }
        other => panic!("expected meal, got {other:?}"),
    }

    let requests = completion.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].prompt, "Plan my food.");
    assert_eq!(requests[0].model, "test-model");
}

#[tokio::test]
async fn single_day_malformed_output_is_repaired() {
    let store = Arc::new(MemoryStore::new());
    let svc = service(
        ScriptedCompletion::new(fixtures::malformed_single_day_meals_response()),
        store.clone(),
    );
    let user = Uuid::new_v4();

    svc.generate(
        &request(user, PlanKind::Meal, PlanWindow::Day(monday())),
        &CancellationToken::new(),
    )
    .await
    .unwrap();

    let stored = store.records(PlanKind::Meal, user, monday());
    assert_eq!(
        meal_calories(&stored),
        vec![Some(350.0), Some(520.0), Some(610.0), Some(150.0)]
    );
}

#[tokio::test]
async fn first_parseable_candidate_wins() {
    let raw = "```json\n[{\"name\": \"First\"}]\n```\nor maybe\n```json\n[{\"name\": \"A\"}, {\"name\": \"B\"}]\n```";
    let store = Arc::new(MemoryStore::new());
    let svc = service(ScriptedCompletion::new(raw), store.clone());
    let user = Uuid::new_v4();

    let outcome = svc
        .generate(
            &request(user, PlanKind::Meal, PlanWindow::Day(monday())),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    match &outcome.days[0].content {
        DayContent::Meals(meals) => {
            assert_eq!(meals.len(), 1);
            assert_eq!(meals[0].name, "First");
        }
        other => panic!("expected meals, got {other:?}"),
    }
}

#[tokio::test]
async fn single_day_commit_failure_is_the_request_error() {
    let store = Arc::new(FlakyStore {
        fail_insert_on: Some(monday()),
        ..FlakyStore::default()
    });
    let svc = service(
        ScriptedCompletion::new(fixtures::single_day_meals_response()),
        store.clone(),
    );

    let err = svc
        .generate(
            &request(Uuid::new_v4(), PlanKind::Meal, PlanWindow::Day(monday())),
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        PipelineError::Commit(CommitError::Insert { index: 0, .. })
    ));
    assert!(!err.is_invalid_output());
}

// ===========================================================================
// Terminal failures
// ===========================================================================

#[tokio::test]
async fn completion_failure_touches_nothing() {
    let store = Arc::new(MemoryStore::new());
    let svc = service(ScriptedCompletion::failing("rate limited"), store.clone());

    let err = svc
        .generate(
            &request(Uuid::new_v4(), PlanKind::Meal, PlanWindow::Week(monday())),
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, PipelineError::Completion(_)));
    assert!(err.to_string().contains("rate limited"));
    assert!(store.is_empty());
}

#[tokio::test]
async fn unusable_output_keeps_existing_plan() {
    let store = Arc::new(MemoryStore::new());
    let user = Uuid::new_v4();
    let req = request(user, PlanKind::Meal, PlanWindow::Week(monday()));
    let cancel = CancellationToken::new();

    service(
        ScriptedCompletion::new(fixtures::weekly_meals_by_date_response(monday())),
        store.clone(),
    )
    .generate(&req, &cancel)
    .await
    .unwrap();
    let before = store.snapshot();

    for raw in [
        "I'm sorry, I can't help with that.",
        "{ this is not : json at all ]]",
        "```json\n\"just a string\"\n```",
    ] {
        let err = service(ScriptedCompletion::new(raw), store.clone())
            .generate(&req, &cancel)
            .await
            .unwrap_err();
        assert!(err.is_invalid_output(), "{raw:?} gave {err:?}");
        assert_eq!(store.snapshot(), before);
    }
}

// ===========================================================================
// Weekly
// ===========================================================================

#[tokio::test]
async fn weekly_date_keys_in_any_order() {
    let store = Arc::new(MemoryStore::new());
    let svc = service(
        ScriptedCompletion::new(fixtures::weekly_meals_by_date_response(monday())),
        store.clone(),
    );
    let user = Uuid::new_v4();

    let outcome = svc
        .generate(
            &request(user, PlanKind::Meal, PlanWindow::Week(monday())),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(outcome.resolution, Resolution::ExactDates);
    assert_eq!(outcome.status(), CommitStatus::Succeeded);
    assert_eq!(outcome.commits.len(), 7);
    for offset in 0..7 {
        let stored = store.records(PlanKind::Meal, user, day(offset));
        assert_eq!(stored.len(), 4);
        assert_eq!(meal_calories(&stored)[0], Some(300.0 + offset as f64 * 10.0));
    }
}

#[tokio::test]
async fn weekly_day_labels_map_by_position() {
    let store = Arc::new(MemoryStore::new());
    let svc = service(
        ScriptedCompletion::new(fixtures::weekly_meals_by_label_response()),
        store.clone(),
    );
    let user = Uuid::new_v4();

    let outcome = svc
        .generate(
            &request(user, PlanKind::Meal, PlanWindow::Week(monday())),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(outcome.resolution, Resolution::Positional);
    assert_eq!(
        meal_calories(&store.records(PlanKind::Meal, user, day(0)))[0],
        Some(300.0)
    );
    assert_eq!(
        meal_calories(&store.records(PlanKind::Meal, user, day(6)))[0],
        Some(360.0)
    );
}

#[tokio::test]
async fn weekly_flat_array_is_chunked() {
    let store = Arc::new(MemoryStore::new());
    let svc = service(
        ScriptedCompletion::new(fixtures::weekly_meals_flat_response()),
        store.clone(),
    );
    let user = Uuid::new_v4();

    let outcome = svc
        .generate(
            &request(user, PlanKind::Meal, PlanWindow::Week(monday())),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(outcome.resolution, Resolution::Chunked);
    for offset in 0..7 {
        let calories = meal_calories(&store.records(PlanKind::Meal, user, day(offset)));
        let base = 300.0 + offset as f64 * 10.0;
        assert_eq!(
            calories,
            vec![Some(base), Some(base + 1.0), Some(base + 2.0), Some(base + 3.0)]
        );
    }
}

#[tokio::test]
async fn weekly_workouts_aggregate_and_rest_day() {
    let store = Arc::new(MemoryStore::new());
    let svc = service(
        ScriptedCompletion::new(fixtures::weekly_workouts_by_date_response(monday())),
        store.clone(),
    );
    let user = Uuid::new_v4();

    svc.generate(
        &request(user, PlanKind::Workout, PlanWindow::Week(monday())),
        &CancellationToken::new(),
    )
    .await
    .unwrap();

    let first = store.records(PlanKind::Workout, user, day(0));
    match first.as_slice() {
        [StoredRecord::Workout(workout)] => {
            assert_eq!(workout.workout_type, "strength");
            assert_eq!(workout.exercises.len(), 2);
            assert_eq!(workout.aggregate.total_sets, 6);
            assert_eq!(workout.aggregate.total_reps, 22);
            // 15 minutes plus the default 10 for the zero-duration push-ups.
            assert_eq!(workout.aggregate.duration_minutes, 25);
            assert_eq!(workout.aggregate.calories_burned, 170);
        }
        other => panic!("expected one workout, got {other:?}"),
    }

    match store.records(PlanKind::Workout, user, day(6)).as_slice() {
        [StoredRecord::Workout(rest)] => {
            assert_eq!(rest.workout_type, "rest");
            assert_eq!(rest.aggregate.duration_minutes, 60);
            assert_eq!(rest.aggregate.calories_burned, 0);
        }
        other => panic!("expected a rest day, got {other:?}"),
    }
}

#[tokio::test]
async fn weekly_failure_is_isolated_to_its_day() {
    let store = Arc::new(FlakyStore {
        fail_insert_on: Some(day(2)),
        ..FlakyStore::default()
    });
    let svc = service(
        ScriptedCompletion::new(fixtures::weekly_meals_by_date_response(monday())),
        store.clone(),
    );
    let user = Uuid::new_v4();

    let outcome = svc
        .generate(
            &request(user, PlanKind::Meal, PlanWindow::Week(monday())),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(outcome.commits.len(), 7);
    assert_eq!(outcome.status(), CommitStatus::Partial);
    let failed: Vec<NaiveDate> = outcome
        .commits
        .iter()
        .filter(|c| !c.is_ok())
        .map(|c| c.date)
        .collect();
    assert_eq!(failed, vec![day(2)]);

    for offset in (0..7).filter(|o| *o != 2) {
        assert_eq!(store.inner.records(PlanKind::Meal, user, day(offset)).len(), 4);
    }
    assert!(store.inner.records(PlanKind::Meal, user, day(2)).is_empty());
}

#[tokio::test]
async fn weekly_commit_is_idempotent() {
    let store = Arc::new(MemoryStore::new());
    let svc = service(
        ScriptedCompletion::new(fixtures::weekly_meals_flat_response()),
        store.clone(),
    );
    let req = request(Uuid::new_v4(), PlanKind::Meal, PlanWindow::Week(monday()));
    let cancel = CancellationToken::new();

    svc.generate(&req, &cancel).await.unwrap();
    let once = store.snapshot();
    let again = svc.generate(&req, &cancel).await.unwrap();

    assert_eq!(store.snapshot(), once);
    assert!(
        again
            .commits
            .iter()
            .all(|c| matches!(&c.outcome, Ok(s) if s.deleted == 4 && s.inserted == 4))
    );
}

#[tokio::test]
async fn cancellation_keeps_earlier_days() {
    let cancel = CancellationToken::new();
    let store = Arc::new(FlakyStore {
        cancel_after_delete: Some((day(1), cancel.clone())),
        ..FlakyStore::default()
    });
    let svc = service(
        ScriptedCompletion::new(fixtures::weekly_meals_by_date_response(monday())),
        store.clone(),
    );
    let user = Uuid::new_v4();

    let outcome = svc
        .generate(
            &request(user, PlanKind::Meal, PlanWindow::Week(monday())),
            &cancel,
        )
        .await
        .unwrap();

    assert_eq!(outcome.status(), CommitStatus::Partial);
    for offset in 0..2 {
        assert!(outcome.commits[offset].is_ok());
        assert_eq!(store.inner.records(PlanKind::Meal, user, day(offset as i64)).len(), 4);
    }
    for offset in 2..7 {
        assert_eq!(
            outcome.commits[offset].outcome,
            Err(CommitError::Cancelled {
                date: day(offset as i64)
            })
        );
        assert!(store.inner.records(PlanKind::Meal, user, day(offset as i64)).is_empty());
    }
}

#[tokio::test]
async fn apply_uses_recorded_output_without_completion() {
    let completion = ScriptedCompletion::failing("should not be called");
    let store = Arc::new(MemoryStore::new());
    let svc = service(completion.clone(), store.clone());
    let user = Uuid::new_v4();

    let outcome = svc
        .apply(
            &fixtures::weekly_meals_by_label_response(),
            &request(user, PlanKind::Meal, PlanWindow::Week(monday())),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(outcome.days.len(), 7);
    assert!(completion.requests().is_empty());
    assert_eq!(store.len(), 28);
}
