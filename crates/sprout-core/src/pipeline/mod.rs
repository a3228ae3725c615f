//! The plan pipeline: candidate extraction, tolerant parsing, shape
//! resolution, field normalization, commit, and the service tying them
//! together.

pub mod commit;
pub mod extract;
pub mod field;
pub mod normalize;
pub mod repair;
pub mod service;
pub mod shape;

pub use commit::{
    CommitError, CommitResult, CommitStatus, CommitSummary, DayLocks, WeeklyCommitReport,
    commit_day, commit_single, commit_week,
};
pub use extract::{CandidateBlock, CandidateSource, ExtractMode, candidate_blocks};
pub use normalize::{
    DayAggregate, DayContent, DayPlan, NormalizedExercise, NormalizedMeal, WorkoutDay,
    normalize_bucket, normalize_meals, normalize_workout_day,
};
pub use repair::{ParseFailure, RepairError, parse_candidate, parse_first};
pub use service::{
    InterpretedPlan, PipelineError, PlanOutcome, PlanRequest, PlanService, PlanWindow, interpret,
};
pub use shape::{DayBucket, Resolution, ResolvedPlan, ShapeError, TargetDates, resolve};
