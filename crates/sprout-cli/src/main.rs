mod config;
mod generate_cmd;
mod show_cmd;
#[cfg(test)]
mod test_util;

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use uuid::Uuid;

use sprout_core::pipeline::PlanWindow;
use sprout_db::models::PlanKind;
use sprout_db::pool;

use config::SproutConfig;
use generate_cmd::GenerateArgs;

#[derive(Parser)]
#[command(name = "sprout", about = "Turn generated meal and workout plans into stored records")]
struct Cli {
    /// Database URL (overrides SPROUT_DATABASE_URL env var)
    #[arg(long, global = true)]
    database_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a sprout config file (no database required)
    Init {
        /// PostgreSQL connection URL
        #[arg(long, default_value = "postgresql://localhost:5432/sprout")]
        db_url: String,
        /// Overwrite existing config file
        #[arg(long)]
        force: bool,
    },
    /// Create the sprout database if needed and run migrations
    DbInit,
    /// Generate a plan and store it, replacing the covered days
    Generate {
        /// Plan kind: meal or workout
        kind: PlanKind,
        /// User the plan belongs to
        #[arg(long)]
        user: Uuid,
        #[command(flatten)]
        window: WindowArgs,
        /// Prompt text sent to the generator
        #[arg(long, conflicts_with = "prompt_file")]
        prompt: Option<String>,
        /// Read the prompt from a file
        #[arg(long)]
        prompt_file: Option<PathBuf>,
        /// Use recorded generator output instead of calling the generator
        #[arg(long)]
        response_file: Option<PathBuf>,
        /// Keep results in memory instead of writing to the database
        #[arg(long)]
        dry_run: bool,
    },
    /// Show stored plans
    Show {
        /// Plan kind: meal or workout
        kind: PlanKind,
        /// User whose plans to show
        #[arg(long)]
        user: Uuid,
        #[command(flatten)]
        window: WindowArgs,
    },
}

#[derive(Args, Debug, Clone, Copy)]
struct WindowArgs {
    /// Day to plan (YYYY-MM-DD); defaults to today
    #[arg(long)]
    date: Option<NaiveDate>,
    /// Cover seven days starting at --date
    #[arg(long)]
    week: bool,
}

impl WindowArgs {
    fn window(self) -> PlanWindow {
        let start = self
            .date
            .unwrap_or_else(|| chrono::Local::now().date_naive());
        if self.week {
            PlanWindow::Week(start)
        } else {
            PlanWindow::Day(start)
        }
    }
}

/// Execute the `sprout init` command: write config file.
fn cmd_init(db_url: &str, force: bool) -> anyhow::Result<()> {
    let path = config::config_path();

    if path.exists() && !force {
        anyhow::bail!(
            "config file already exists at {}\nUse --force to overwrite.",
            path.display()
        );
    }

    let cfg = config::ConfigFile {
        database: config::DatabaseSection {
            url: db_url.to_string(),
        },
        generator: Default::default(),
        pipeline: Default::default(),
    };

    let path = config::save_config(&cfg)?;

    println!("Config written to {}", path.display());
    println!("  database.url      = {db_url}");
    println!("  generator.command = {}", cfg.generator.command);
    println!("  generator.model   = {}", cfg.generator.model);
    println!();
    println!("Next: run `sprout db-init` to create and migrate the database.");

    Ok(())
}

/// Execute the `sprout db-init` command: create database and run migrations.
async fn cmd_db_init(cli_db_url: Option<&str>) -> anyhow::Result<()> {
    let resolved = SproutConfig::resolve(cli_db_url)?;

    println!("Initializing sprout database...");

    match pool::ensure_database_exists(&resolved.db_config).await? {
        pool::Bootstrap::Created => println!("Created database."),
        pool::Bootstrap::Existing => println!("Database already exists."),
    }
    let db_pool = pool::create_pool(&resolved.db_config).await?;
    let version = pool::run_migrations(&db_pool).await?;
    println!("Schema version {version}.");

    for stats in pool::plan_table_stats(&db_pool).await? {
        println!("  {}", describe_table(&stats));
    }

    db_pool.close().await;

    println!("sprout db-init complete.");
    Ok(())
}

/// `meals: 28 rows, 1 user(s), 2024-03-04..2024-03-10`
fn describe_table(stats: &pool::PlanTableStats) -> String {
    let mut line = format!(
        "{}: {} rows, {} user(s)",
        stats.kind.table(),
        stats.rows,
        stats.users
    );
    if let Some((first, last)) = stats.span {
        line.push_str(&format!(", {first}..{last}"));
    }
    line
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Init { db_url, force } => cmd_init(&db_url, force),
        Commands::DbInit => cmd_db_init(cli.database_url.as_deref()).await,
        Commands::Generate {
            kind,
            user,
            window,
            prompt,
            prompt_file,
            response_file,
            dry_run,
        } => {
            let resolved = SproutConfig::resolve(cli.database_url.as_deref())?;
            let args = GenerateArgs {
                kind,
                user_id: user,
                window: window.window(),
                prompt,
                prompt_file,
                response_file,
                dry_run,
            };
            generate_cmd::run_generate(&resolved, args).await
        }
        Commands::Show { kind, user, window } => {
            let resolved = SproutConfig::resolve(cli.database_url.as_deref())?;
            let db_pool = pool::create_pool(&resolved.db_config).await?;
            let result = show_cmd::run_show(&db_pool, kind, user, window.window()).await;
            db_pool.close().await;
            result
        }
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!("{e:#}");
        std::process::exit(1);
    }
}
