//! The plan service: one request from prompt to committed records.
//!
//! [`interpret`] is the pure part (text to normalized days) and is usable
//! without a store. [`PlanService`] adds the completion call and the commit.

use std::sync::Arc;

use chrono::NaiveDate;
use sprout_db::models::PlanKind;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use uuid::Uuid;

use super::commit::{
    CommitError, CommitResult, CommitStatus, DayLocks, commit_single, commit_week, status_of,
};
use super::extract::{ExtractMode, candidate_blocks};
use super::normalize::{DayPlan, normalize_bucket};
use super::repair::{ParseFailure, parse_first};
use super::shape::{Resolution, ShapeError, TargetDates, resolve};
use crate::completion::{Completion, CompletionRequest};
use crate::config::PipelineConfig;
use crate::store::PlanStore;

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

/// The dates a request covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanWindow {
    /// Regenerate one day.
    Day(NaiveDate),
    /// Regenerate seven days starting at the given date.
    Week(NaiveDate),
}

impl PlanWindow {
    pub fn targets(&self) -> TargetDates {
        match *self {
            Self::Day(date) => TargetDates::single(date),
            Self::Week(start) => TargetDates::week_starting(start),
        }
    }

    pub fn mode(&self) -> ExtractMode {
        match self {
            Self::Day(_) => ExtractMode::Single,
            Self::Week(_) => ExtractMode::Multi,
        }
    }

    pub fn start(&self) -> NaiveDate {
        match *self {
            Self::Day(date) | Self::Week(date) => date,
        }
    }
}

/// One plan generation request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanRequest {
    pub user_id: Uuid,
    pub kind: PlanKind,
    pub window: PlanWindow,
    pub prompt: String,
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Terminal request failures. None of them carries a partial plan.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("plan generation failed: {0:#}")]
    Completion(anyhow::Error),

    #[error("no JSON {expected} found in generator output")]
    Extraction { expected: &'static str },

    #[error(transparent)]
    Parse(#[from] ParseFailure),

    #[error("generated plan has the wrong shape: {0}")]
    Shape(#[from] ShapeError),

    #[error(transparent)]
    Commit(#[from] CommitError),
}

impl PipelineError {
    /// Whether the generated text was unusable, as opposed to the service
    /// or the store failing.
    pub fn is_invalid_output(&self) -> bool {
        matches!(
            self,
            Self::Extraction { .. } | Self::Parse(_) | Self::Shape(_)
        )
    }
}

// ---------------------------------------------------------------------------
// Interpretation
// ---------------------------------------------------------------------------

/// Normalized days for every target date, before commit.
#[derive(Debug, Clone, PartialEq)]
pub struct InterpretedPlan {
    pub resolution: Resolution,
    pub days: Vec<DayPlan>,
}

/// Turn raw generator text into one normalized [`DayPlan`] per target date.
pub fn interpret(
    raw: &str,
    kind: PlanKind,
    window: PlanWindow,
    config: &PipelineConfig,
) -> Result<InterpretedPlan, PipelineError> {
    let mode = window.mode();
    let candidates = candidate_blocks(raw, mode);
    if candidates.is_empty() {
        return Err(PipelineError::Extraction {
            expected: match mode {
                ExtractMode::Single => "array",
                ExtractMode::Multi => "object or array",
            },
        });
    }

    let (candidate, value) = parse_first(&candidates)?;
    let resolved = resolve(value, mode, &window.targets(), config.per_day(kind))?;

    let days: Vec<DayPlan> = resolved
        .buckets
        .iter()
        .map(|bucket| normalize_bucket(kind, bucket, config))
        .collect();

    info!(
        %kind,
        candidate,
        candidates = candidates.len(),
        tier = %resolved.resolution,
        days = days.len(),
        "plan interpreted"
    );

    Ok(InterpretedPlan {
        resolution: resolved.resolution,
        days,
    })
}

// ---------------------------------------------------------------------------
// Service
// ---------------------------------------------------------------------------

/// Result of a committed request.
#[derive(Debug, Clone, PartialEq)]
pub struct PlanOutcome {
    pub resolution: Resolution,
    pub days: Vec<DayPlan>,
    /// One entry per date, in calendar order.
    pub commits: Vec<CommitResult>,
}

impl PlanOutcome {
    pub fn status(&self) -> CommitStatus {
        status_of(&self.commits)
    }
}

/// Runs requests end to end against a completion backend and a store.
#[derive(Clone)]
pub struct PlanService {
    completion: Arc<dyn Completion>,
    store: Arc<dyn PlanStore>,
    config: PipelineConfig,
    model: String,
    locks: Arc<DayLocks>,
}

impl std::fmt::Debug for PlanService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlanService")
            .field("completion", &self.completion.name())
            .field("store", &self.store.name())
            .field("model", &self.model)
            .finish()
    }
}

impl PlanService {
    pub fn new(
        completion: Arc<dyn Completion>,
        store: Arc<dyn PlanStore>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            completion,
            store,
            config,
            model: String::new(),
            locks: Arc::new(DayLocks::new()),
        }
    }

    /// Model id sent with every completion.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Share commit locks with other services in this process.
    pub fn with_locks(mut self, locks: Arc<DayLocks>) -> Self {
        self.locks = locks;
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Generate a plan for `request` and commit it.
    pub async fn generate(
        &self,
        request: &PlanRequest,
        cancel: &CancellationToken,
    ) -> Result<PlanOutcome, PipelineError> {
        let completion_request = CompletionRequest {
            prompt: request.prompt.clone(),
            model: self.model.clone(),
        };
        let raw = self
            .completion
            .complete(&completion_request)
            .await
            .map_err(PipelineError::Completion)?;
        self.apply(&raw, request, cancel).await
    }

    /// Interpret already generated text for `request` and commit it.
    pub async fn apply(
        &self,
        raw: &str,
        request: &PlanRequest,
        cancel: &CancellationToken,
    ) -> Result<PlanOutcome, PipelineError> {
        let plan = interpret(raw, request.kind, request.window, &self.config)
            .inspect_err(|e| warn!(user_id = %request.user_id, kind = %request.kind, error = %e, "plan rejected"))?;

        let commits = match request.window {
            PlanWindow::Day(_) => {
                let mut commits = Vec::with_capacity(plan.days.len());
                for day in &plan.days {
                    commits.push(
                        commit_single(&*self.store, &self.locks, request.user_id, day).await?,
                    );
                }
                commits
            }
            PlanWindow::Week(_) => {
                commit_week(
                    &*self.store,
                    &self.locks,
                    request.user_id,
                    &plan.days,
                    cancel,
                )
                .await
                .results
            }
        };

        Ok(PlanOutcome {
            resolution: plan.resolution,
            days: plan.days,
            commits,
        })
    }
}
