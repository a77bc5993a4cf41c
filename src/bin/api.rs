//! CivicWeave API server binary.
//!
//! Creates the concrete database implementation and hands it to the API
//! layer, which stays agnostic of the storage backend.

use std::net::IpAddr;
use std::path::PathBuf;
use std::process::ExitCode;

use civicweave::api::{self, ServeConfig, ServeError};
use civicweave::config::AppConfig;
use civicweave::db::{Database, DbError, SqliteDatabase};
use clap::Parser;
use miette::Diagnostic;
use thiserror::Error;

#[derive(Error, Diagnostic, Debug)]
enum BinaryError {
    #[error("Database error: {0}")]
    #[diagnostic(code(civicweave::binary::database))]
    Database(#[from] DbError),

    #[error("Failed to create data directory: {0}")]
    #[diagnostic(code(civicweave::binary::io))]
    Io(#[from] std::io::Error),

    #[error("API server error: {0}")]
    #[diagnostic(code(civicweave::binary::api))]
    Api(#[from] ServeError),
}

#[derive(Parser)]
#[command(name = "cw-api")]
#[command(author, version, about = "CivicWeave API server", long_about = None)]
struct Cli {
    /// Host address to bind to
    #[arg(long, default_value = "0.0.0.0")]
    host: IpAddr,

    /// Port to listen on
    #[arg(short, long, default_value = "8080")]
    port: u16,

    /// Database file path
    #[arg(long, default_value = "civicweave.db")]
    db: PathBuf,

    /// Logging verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Serve OpenAPI docs at /docs
    #[arg(long)]
    docs: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Misconfiguration refuses to start, never limps along.
    let app_config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}", e);
            return ExitCode::from(3);
        }
    };

    match serve(cli, app_config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", e);
            ExitCode::FAILURE
        }
    }
}

async fn serve(cli: Cli, app_config: AppConfig) -> Result<(), BinaryError> {
    if let Some(parent) = cli.db.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }

    let db = SqliteDatabase::open(&cli.db).await?;
    db.migrate().await?;

    api::run(
        ServeConfig {
            host: cli.host,
            port: cli.port,
            verbosity: cli.verbose,
            enable_docs: cli.docs,
        },
        app_config,
        db,
    )
    .await?;
    Ok(())
}
