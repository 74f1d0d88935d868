//! devpush: push a declared schema straight to a development database.
//!
//! `push` runs the full bootstrap (drop directive, mode gate, diff,
//! confirmation, apply, sentinel). `plan` only prints the diff. `status`
//! shows the dev push sentinel from the migration ledger.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use devpush_db::{
    create_pool, AutoConfirm, BootstrapConfig, BootstrapOutcome, Bootstrapper, CatalogDiffEngine,
    ConfirmationProvider, DbConfig, EnvironmentMode, MigrationLedger, StdinConfirmation,
    DEFAULT_MIGRATIONS_TABLE,
};
use devpush_logging::{init_logging, LogConfig};
use serde::Serialize;
use tracing::error;

mod model_file;

use model_file::load_model;

#[derive(Parser, Debug)]
#[command(name = "devpush", version, about = "Development-mode schema push")]
struct Cli {
    /// Debug logging for devpush crates
    #[arg(short = 'v', long, global = true)]
    verbose: bool,

    /// Also append logs to ~/.devpush/logs/devpush.log
    #[arg(long, global = true)]
    log_file: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Debug)]
struct DatabaseArgs {
    /// Database URL (sqlite:path?mode=rwc or postgres://...)
    #[arg(long, env = "DATABASE_URL")]
    database_url: String,

    /// Migration ledger table holding the dev push sentinel
    #[arg(long, default_value = DEFAULT_MIGRATIONS_TABLE)]
    migrations_table: String,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Reconcile the database with the model and record the dev push
    Push {
        #[command(flatten)]
        db: DatabaseArgs,

        /// Model declaration (.toml or .json)
        #[arg(long)]
        model: PathBuf,

        /// Wipe the working schema before anything else, even in production
        #[arg(long)]
        drop: bool,

        /// Environment mode; overrides DEVPUSH_ENV
        #[arg(long = "env", value_name = "MODE")]
        mode: Option<EnvironmentMode>,

        /// Treat the run as part of a versioned migration run (skips the push)
        #[arg(long)]
        migrating: bool,

        /// Accept warnings without prompting
        #[arg(short = 'y', long)]
        yes: bool,
    },

    /// Print the statements a push would run, without applying them
    Plan {
        #[command(flatten)]
        db: DatabaseArgs,

        /// Model declaration (.toml or .json)
        #[arg(long)]
        model: PathBuf,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show the dev push sentinel
    Status {
        #[command(flatten)]
        db: DatabaseArgs,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(err) = init_logging(LogConfig {
        app_name: "devpush",
        verbose: cli.verbose,
        log_to_file: cli.log_file,
    }) {
        eprintln!("Warning: failed to initialize logging: {:#}", err);
    }

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{:#}", err);
            eprintln!("Error: {:?}", err);
            ExitCode::from(1)
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")?;

    runtime.block_on(async move {
        match cli.command {
            Commands::Push {
                db,
                model,
                drop,
                mode,
                migrating,
                yes,
            } => {
                let mut config = BootstrapConfig::from_env();
                if drop {
                    config = config.with_drop_on_start(true);
                }
                if migrating {
                    config = config.with_migration_in_progress(true);
                }
                if let Some(mode) = mode {
                    config.mode = mode;
                }

                if yes {
                    push(db, &model, config, AutoConfirm::accept()).await
                } else {
                    push(db, &model, config, StdinConfirmation).await
                }
            }
            Commands::Plan { db, model, json } => plan(db, &model, json).await,
            Commands::Status { db, json } => status(db, json).await,
        }
    })
}

async fn push<C: ConfirmationProvider>(
    db: DatabaseArgs,
    model: &std::path::Path,
    config: BootstrapConfig,
    confirmation: C,
) -> Result<()> {
    let model = load_model(model)?;
    let bootstrapper = Bootstrapper::new(
        model,
        DbConfig::new(&db.database_url),
        config,
        CatalogDiffEngine,
        confirmation,
    )
    .with_ledger(MigrationLedger::new(db.migrations_table));

    let (pool, outcome) = bootstrapper.run().await?;
    pool.close().await;

    match outcome {
        BootstrapOutcome::Synced(report) => {
            if report.statements.is_empty() {
                println!("No schema changes. Dev push recorded ({:?}).", report.sentinel);
            } else {
                println!(
                    "Schema pushed: {} statement(s), risk: {}.",
                    report.statements.len(),
                    report.risk
                );
            }
        }
        BootstrapOutcome::Skipped(reason) => {
            println!("Skipping schema push: {}.", reason);
        }
        BootstrapOutcome::Aborted(reason) => {
            println!("Schema push aborted: {}.", reason);
        }
    }
    Ok(())
}

#[derive(Serialize)]
struct PlanOutput<'a> {
    risk: devpush_db::PushRisk,
    #[serde(flatten)]
    plan: &'a devpush_db::DiffPlan,
}

async fn plan(db: DatabaseArgs, model: &std::path::Path, json: bool) -> Result<()> {
    let model = load_model(model)?;
    let pool = create_pool(&DbConfig::new(&db.database_url)).await?;

    let bootstrapper = Bootstrapper::new(
        model,
        DbConfig::new(&db.database_url),
        BootstrapConfig::development(),
        CatalogDiffEngine,
        AutoConfirm::decline(),
    )
    .with_ledger(MigrationLedger::new(db.migrations_table));

    let plan = bootstrapper.plan(&pool).await;
    pool.close().await;
    let plan = plan?;

    if json {
        let output = PlanOutput {
            risk: plan.risk(),
            plan: &plan,
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    if plan.is_empty() {
        println!("No schema changes.");
        return Ok(());
    }
    for statement in &plan.statements {
        println!("{};", statement);
    }
    if !plan.warnings.is_empty() {
        println!();
        println!("Warnings:");
        for warning in &plan.warnings {
            println!("  · {}", warning);
        }
    }
    println!();
    println!("Risk: {}", plan.risk());
    Ok(())
}

async fn status(db: DatabaseArgs, json: bool) -> Result<()> {
    let pool = create_pool(&DbConfig::new(&db.database_url)).await?;
    let ledger = MigrationLedger::new(db.migrations_table);
    let record = ledger.dev_push_record(&pool).await;
    pool.close().await;
    let record = record.with_context(|| {
        format!("Failed to read migration ledger table '{}'", ledger.table())
    })?;

    if json {
        println!("{}", serde_json::to_string_pretty(&record)?);
        return Ok(());
    }

    match record {
        Some(record) => println!(
            "Dev push recorded in '{}': first {}, last {}",
            ledger.table(),
            record.created_at,
            record.updated_at
        ),
        None => println!("No dev push recorded in '{}'", ledger.table()),
    }
    Ok(())
}
