//! CivicWeave batch job runner.
//!
//! Scheduled out-of-process jobs sharing the API server's store:
//! `match` rebuilds the match index, `notify` runs one notification
//! batch, `migrate` manages the schema ledger.
//!
//! Exit codes: 0 success, 1 partial failure (some projects skipped,
//! details in logs), 2 fatal (store unreachable), 3 misconfiguration.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::sync::atomic::Ordering;

use civicweave::api::init_tracing;
use civicweave::config::AppConfig;
use civicweave::db::{Database, SqliteDatabase};
use civicweave::error::Error;
use civicweave::matching::{Matcher, NotificationPlanner};
use civicweave::migrate::{self, DriftReport};
use clap::{Parser, Subcommand};
use tracing::{error, info, warn};

#[derive(Parser)]
#[command(name = "cw-batch")]
#[command(author, version, about = "CivicWeave batch jobs", long_about = None)]
struct Cli {
    /// Database file path
    #[arg(long, default_value = "civicweave.db")]
    db: PathBuf,

    /// Logging verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Rebuild the volunteer/project match index
    Match,
    /// Run one candidate notification batch
    Notify,
    /// Apply, revert, or check schema migrations
    Migrate {
        /// Revert to this version instead of applying forward
        #[arg(long)]
        down_to: Option<String>,
        /// Report drift and compatibility without mutating
        #[arg(long)]
        check: bool,
    },
}

const EXIT_PARTIAL: u8 = 1;
const EXIT_FATAL: u8 = 2;
const EXIT_MISCONFIG: u8 = 3;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose.max(1));

    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("{}", e);
            return ExitCode::from(EXIT_MISCONFIG);
        }
    };

    let db = match SqliteDatabase::open(&cli.db).await {
        Ok(db) => Arc::new(db),
        Err(e) => {
            error!("cannot open store: {}", e);
            return ExitCode::from(EXIT_FATAL);
        }
    };

    match cli.command {
        Command::Match => run_match(db, config).await,
        Command::Notify => run_notify(db, config).await,
        Command::Migrate { down_to, check } => run_migrate(db, down_to, check).await,
    }
}

async fn run_match(db: Arc<SqliteDatabase>, config: AppConfig) -> ExitCode {
    if let Err(e) = db.migrate().await {
        error!("migration failed: {}", e);
        return ExitCode::from(EXIT_FATAL);
    }

    let matcher = Matcher::new(db, &config);
    let cancel = matcher.cancel_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, stopping after in-flight projects");
            cancel.store(true, Ordering::Relaxed);
        }
    });

    match matcher.run().await {
        Ok(summary) => {
            info!(?summary, "match rebuild complete");
            if summary.projects_failed > 0 {
                ExitCode::from(EXIT_PARTIAL)
            } else {
                ExitCode::SUCCESS
            }
        }
        Err(e) => exit_for_error(e),
    }
}

async fn run_notify(db: Arc<SqliteDatabase>, config: AppConfig) -> ExitCode {
    if let Err(e) = db.migrate().await {
        error!("migration failed: {}", e);
        return ExitCode::from(EXIT_FATAL);
    }

    let planner = NotificationPlanner::new(db, config);
    let cancel = planner.cancel_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, stopping after current project");
            cancel.store(true, Ordering::Relaxed);
        }
    });

    match planner.run().await {
        Ok(summary) => {
            info!(?summary, "notification batch complete");
            if summary.projects_failed > 0 {
                ExitCode::from(EXIT_PARTIAL)
            } else {
                ExitCode::SUCCESS
            }
        }
        Err(e) => exit_for_error(e),
    }
}

async fn run_migrate(
    db: Arc<SqliteDatabase>,
    down_to: Option<String>,
    check: bool,
) -> ExitCode {
    let pool = db.pool();

    if check {
        if let Err(e) = migrate::check_compatibility(pool, civicweave::RUNTIME_VERSION).await {
            error!("compatibility: {}", e);
            return ExitCode::from(EXIT_MISCONFIG);
        }
        return match migrate::detect_drift(pool).await {
            Ok(DriftReport::Clean) => {
                info!("schema matches the applied ledger");
                ExitCode::SUCCESS
            }
            Ok(DriftReport::Drifted { expected, actual }) => {
                error!(expected, actual, "schema drift detected");
                ExitCode::from(EXIT_PARTIAL)
            }
            Err(e) => {
                error!("drift check failed: {}", e);
                ExitCode::from(EXIT_FATAL)
            }
        };
    }

    let result = match down_to {
        Some(target) => migrate::apply_down_to(pool, &target).await,
        None => migrate::apply_up(pool, civicweave::RUNTIME_VERSION).await,
    };
    match result {
        Ok(count) => {
            info!(migrations = count, "ledger updated");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("migration failed: {}", e);
            ExitCode::from(EXIT_FATAL)
        }
    }
}

fn exit_for_error(e: Error) -> ExitCode {
    error!("{}", e);
    match e {
        Error::FatalConfig { .. } => ExitCode::from(EXIT_MISCONFIG),
        _ => ExitCode::from(EXIT_FATAL),
    }
}
