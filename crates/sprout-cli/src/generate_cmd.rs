//! Handler for `sprout generate`.
//!
//! Runs the plan pipeline for one day or one week, commits the result to
//! Postgres (or to memory with `--dry-run`) and prints what was stored.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use tokio_util::sync::CancellationToken;
use tracing::info;
use uuid::Uuid;

use sprout_core::completion::{Completion, CommandCompletion};
use sprout_core::pipeline::{
    CommitResult, CommitStatus, DayContent, DayPlan, PipelineError, PlanOutcome, PlanRequest,
    PlanService, PlanWindow,
};
use sprout_core::store::{MemoryStore, PgPlanStore, PlanStore};
use sprout_db::models::PlanKind;
use sprout_db::pool;

use crate::config::SproutConfig;

/// Parsed `sprout generate` arguments.
#[derive(Debug, Clone)]
pub struct GenerateArgs {
    pub kind: PlanKind,
    pub user_id: Uuid,
    pub window: PlanWindow,
    pub prompt: Option<String>,
    pub prompt_file: Option<PathBuf>,
    pub response_file: Option<PathBuf>,
    pub dry_run: bool,
}

// -----------------------------------------------------------------------
// Entry point
// -----------------------------------------------------------------------

pub async fn run_generate(config: &SproutConfig, args: GenerateArgs) -> Result<()> {
    let prompt = resolve_prompt(&args)?;
    let recorded = args
        .response_file
        .as_ref()
        .map(|path| {
            std::fs::read_to_string(path)
                .with_context(|| format!("failed to read response file: {}", path.display()))
        })
        .transpose()?;

    let (store, pg_pool): (Arc<dyn PlanStore>, _) = if args.dry_run {
        (Arc::new(MemoryStore::new()), None)
    } else {
        let db_pool = pool::create_pool(&config.db_config).await?;
        (Arc::new(PgPlanStore::new(db_pool.clone())), Some(db_pool))
    };

    let completion: Arc<dyn Completion> =
        Arc::new(CommandCompletion::from_config(&config.generator));
    let service = PlanService::new(completion, store, config.pipeline.clone())
        .with_model(&config.generator.model);

    let request = PlanRequest {
        user_id: args.user_id,
        kind: args.kind,
        window: args.window,
        prompt,
    };

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("Interrupted; finishing the current day and skipping the rest.");
            on_interrupt.cancel();
        }
    });

    info!(kind = %request.kind, user_id = %request.user_id, window = ?request.window, dry_run = args.dry_run, "generating plan");
    let result = match &recorded {
        Some(raw) => service.apply(raw, &request, &cancel).await,
        None => service.generate(&request, &cancel).await,
    };

    interrupt.abort();
    if let Some(p) = pg_pool {
        p.close().await;
    }

    let outcome = result.map_err(explain)?;
    print_outcome(&outcome, args.kind, args.dry_run);

    if outcome.status() == CommitStatus::Failed {
        bail!("no day of the plan could be saved");
    }
    Ok(())
}

fn resolve_prompt(args: &GenerateArgs) -> Result<String> {
    if let Some(path) = &args.prompt_file {
        return std::fs::read_to_string(path)
            .with_context(|| format!("failed to read prompt file: {}", path.display()));
    }
    match (&args.prompt, &args.response_file) {
        (Some(prompt), _) => Ok(prompt.clone()),
        (None, Some(_)) => Ok(String::new()),
        (None, None) => bail!("a prompt is required: pass --prompt, --prompt-file or --response-file"),
    }
}

/// Terminal pipeline errors, phrased for the user.
fn explain(err: PipelineError) -> anyhow::Error {
    if err.is_invalid_output() {
        anyhow::anyhow!("could not generate a valid plan, please retry ({err})")
    } else {
        anyhow::Error::new(err)
    }
}

// -----------------------------------------------------------------------
// Output
// -----------------------------------------------------------------------

fn print_outcome(outcome: &PlanOutcome, kind: PlanKind, dry_run: bool) {
    let target = if dry_run { "memory (dry run)" } else { "database" };
    println!(
        "Generated {kind} plan ({}) for {} day(s); saved to {target}.",
        outcome.resolution,
        outcome.days.len()
    );
    println!();

    for (day, commit) in outcome.days.iter().zip(&outcome.commits) {
        println!("  {}  {:<48}  {}", day.date, day_summary(day), commit_label(commit));
    }

    if outcome.commits.len() > 1 {
        println!();
        println!("Status: {}", outcome.status());
    }
}

/// One-line description of a day's content.
pub(crate) fn day_summary(day: &DayPlan) -> String {
    match &day.content {
        DayContent::Meals(meals) if meals.is_empty() => "no meals".to_string(),
        DayContent::Meals(meals) => {
            let known: Vec<f64> = meals.iter().filter_map(|m| m.calories).collect();
            let kcal = if known.is_empty() {
                "kcal unknown".to_string()
            } else {
                format!("{:.0} kcal", known.iter().sum::<f64>())
            };
            format!("{} meal(s), {kcal}", meals.len())
        }
        DayContent::Workout(workout) if workout.is_rest_day() => {
            format!("rest day, {} min", workout.aggregate.duration_minutes)
        }
        DayContent::Workout(workout) => format!(
            "{}, {} exercise(s), {} min, {} kcal",
            workout.workout_type,
            workout.exercises.len(),
            workout.aggregate.duration_minutes,
            workout.aggregate.calories_burned
        ),
    }
}

pub(crate) fn commit_label(commit: &CommitResult) -> String {
    match &commit.outcome {
        Ok(summary) if summary.deleted > 0 => {
            format!("saved {} (replaced {})", summary.inserted, summary.deleted)
        }
        Ok(summary) => format!("saved {}", summary.inserted),
        Err(e) => format!("FAILED: {e}"),
    }
}
