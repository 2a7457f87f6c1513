mod cli;
mod commands;
mod config;
mod error;
mod output;

use crate::{
    cli::{CacheAction, CliArgs, Command, ConfigAction},
    commands::CommandExecutor,
    config::AppConfig,
    error::{CliError, Result},
};
use clap::Parser;
use std::process;
use tracing::{Level, debug, error};
use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*};

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!(error = ?e, "Application failed");
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

async fn run() -> Result<()> {
    let args = CliArgs::parse();

    init_logging(args.verbose)?;

    let mut config = AppConfig::load(args.config.as_deref())?;
    if let Some(database) = args.database {
        config.database_path = database;
    }
    debug!(?config, "Loaded configuration");

    let executor = CommandExecutor::new(config, args.config);

    let output = match args.command {
        Command::Cache { action } => match action {
            CacheAction::Stats { json } => executor.cache_stats(json).await?,
            CacheAction::Show { identifiers, json } => {
                executor.cache_show(&identifiers, json).await?
            }
            CacheAction::Purge => executor.cache_purge().await?,
            CacheAction::Clear => executor.cache_clear().await,
            CacheAction::Forget { identifiers } => executor.cache_forget(&identifiers).await?,
        },
        Command::Config { action } => match action {
            ConfigAction::Show => executor.config_show()?,
            ConfigAction::Reset => executor.config_reset()?,
            ConfigAction::Path => executor.config_path()?,
        },
    };

    println!("{output}");
    Ok(())
}

fn init_logging(verbose: bool) -> Result<()> {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env().add_directive(Level::WARN.into())
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .try_init()
        .map_err(|e| CliError::Initialization(e.to_string()))
}
