//! Connection pool, embedded migrations and database bootstrap.

use std::time::Duration;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use sqlx::postgres::PgPoolOptions;
use sqlx::{Executor, PgPool};
use tracing::info;

use crate::config::DbConfig;
use crate::models::PlanKind;

/// Migrations embedded at compile time from `crates/sprout-db/migrations/`.
pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!();

/// Plan commits issue their store calls one at a time, so a small pool is
/// enough for the CLI.
pub async fn create_pool(config: &DbConfig) -> Result<PgPool> {
    connect(config, 5).await
}

async fn connect(config: &DbConfig, max_connections: u32) -> Result<PgPool> {
    PgPoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(Duration::from_secs(10))
        .connect(&config.database_url)
        .await
        .with_context(|| format!("failed to connect to database at {}", config.database_url))
}

/// Apply pending migrations and return the schema version now in place.
pub async fn run_migrations(pool: &PgPool) -> Result<i64> {
    MIGRATOR
        .run(pool)
        .await
        .context("failed to run database migrations")?;

    let version = MIGRATOR.iter().map(|m| m.version).max().unwrap_or(0);
    info!(version, "plan schema up to date");
    Ok(version)
}

/// What [`ensure_database_exists`] found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bootstrap {
    Created,
    Existing,
}

/// Create the configured database on its server unless it already exists.
pub async fn ensure_database_exists(config: &DbConfig) -> Result<Bootstrap> {
    let db_name = config.database_name().with_context(|| {
        format!(
            "database URL {} does not name a plain database (letters, digits, _)",
            config.database_url
        )
    })?;
    let maint = connect(&config.maintenance(), 1).await?;

    let exists: bool =
        sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM pg_database WHERE datname = $1)")
            .bind(db_name)
            .fetch_one(&maint)
            .await
            .context("failed to query pg_database")?;

    let status = if exists {
        Bootstrap::Existing
    } else {
        maint
            .execute(format!("CREATE DATABASE {db_name}").as_str())
            .await
            .with_context(|| format!("failed to create database {db_name}"))?;
        Bootstrap::Created
    };

    maint.close().await;
    info!(db = db_name, ?status, "database ready");
    Ok(status)
}

/// End other sessions on the configured database and drop it.
pub async fn drop_database(config: &DbConfig) -> Result<()> {
    let db_name = config
        .database_name()
        .context("could not determine database name from URL")?;
    let maint = connect(&config.maintenance(), 1).await?;

    sqlx::query(
        "SELECT pg_terminate_backend(pid) FROM pg_stat_activity \
         WHERE datname = $1 AND pid <> pg_backend_pid()",
    )
    .bind(db_name)
    .execute(&maint)
    .await
    .with_context(|| format!("failed to end sessions on {db_name}"))?;

    maint
        .execute(format!("DROP DATABASE IF EXISTS {db_name}").as_str())
        .await
        .with_context(|| format!("failed to drop database {db_name}"))?;

    maint.close().await;
    Ok(())
}

/// Stored volume of one plan table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanTableStats {
    pub kind: PlanKind,
    pub rows: i64,
    pub users: i64,
    /// Earliest and latest planned dates, when any rows exist.
    pub span: Option<(NaiveDate, NaiveDate)>,
}

/// Row, user and date-span summary for every plan table, for `sprout db-init`.
pub async fn plan_table_stats(pool: &PgPool) -> Result<Vec<PlanTableStats>> {
    let mut stats = Vec::with_capacity(PlanKind::ALL.len());
    for kind in PlanKind::ALL {
        let table = kind.table();
        let sql = format!(
            "SELECT COUNT(*), COUNT(DISTINCT user_id), MIN(plan_date), MAX(plan_date) FROM {table}"
        );
        let (rows, users, first, last): (i64, i64, Option<NaiveDate>, Option<NaiveDate>) =
            sqlx::query_as(&sql)
                .fetch_one(pool)
                .await
                .with_context(|| format!("failed to summarize {table}"))?;
        stats.push(PlanTableStats {
            kind,
            rows,
            users,
            span: first.zip(last),
        });
    }
    Ok(stats)
}
