//! Athlethia command-line shell.
//!
//! Loads configuration, opens the scan database and wires the detector
//! together; each subcommand lives in [`commands`].

pub mod cli;
pub mod commands;

use anyhow::Context;
use athlethia_core::AppConfig;
use athlethia_db::Database;
use athlethia_detector::ScanOrchestrator;
use cli::{Args, Command};
use std::sync::Arc;
use tracing::info;

/// Initialize the tracing subscriber with environment-based filtering.
///
/// Logs go to stderr so `--json` output on stdout stays machine readable.
pub fn init_tracing() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,athlethia=debug"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
        .with(filter)
        .init();
}

/// Load the config file named on the command line, or the default one, then apply
/// environment and command-line overrides.
pub fn load_config(args: &Args) -> anyhow::Result<AppConfig> {
    let mut config = match &args.config {
        Some(path) => {
            let mut config = AppConfig::load_from(path)
                .with_context(|| format!("failed to load config from {}", path.display()))?;
            config.apply_env_overrides(|key| std::env::var(key).ok());
            config
        }
        None => AppConfig::load_with_env().context("failed to load config")?,
    };

    if let Some(database) = &args.database {
        config.database.path = Some(database.clone());
    }
    config.validate().context("invalid configuration")?;
    Ok(config)
}

/// Execute one command line.
pub async fn run(args: Args) -> anyhow::Result<()> {
    info!("Starting Athlethia v{}", env!("CARGO_PKG_VERSION"));

    let config = load_config(&args)?;
    let db_path = config.database_path()?;
    let db = Arc::new(
        Database::open(&db_path)
            .await
            .with_context(|| format!("failed to open database at {}", db_path.display()))?,
    );

    let outcome = match args.command {
        Command::Scan { targets, source } => {
            let orchestrator = ScanOrchestrator::new(config)
                .context("invalid detector configuration")?
                .with_database(Arc::clone(&db));
            commands::scan(&orchestrator, &targets, &source, args.json).await
        }
        Command::Report { target, reporter } => {
            let orchestrator = ScanOrchestrator::new(config)
                .context("invalid detector configuration")?
                .with_database(Arc::clone(&db));
            commands::report(&orchestrator, &target, &reporter, args.json).await
        }
        Command::Confirm { target, scam_type } => {
            commands::confirm(&db, &target, &scam_type, args.json).await
        }
        Command::Stats => commands::stats(&db, args.json).await,
        Command::History { limit, url } => {
            commands::history(&db, limit, url.as_deref(), args.json).await
        }
        Command::Reports { target } => commands::reports(&db, &target, args.json).await,
    };

    db.pool().close().await;
    outcome
}
