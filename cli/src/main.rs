// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! # wanaspects CLI
//!
//! Inspection and demo front-end for the aspect pipeline.
//!
//! ## Commands
//!
//! - `wanaspects diag` - Timestamp, version, effective configuration and bundle
//! - `wanaspects config show|validate|generate` - Configuration management
//! - `wanaspects demo [--boundary] [--bundle] [--metrics]` - Run one step through the pipeline

use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;
use tracing::debug;

use wanaspects_cli::commands::{self, ConfigCommand, DemoArgs};
use wanaspects_cli::telemetry::{init_logging, init_metrics};
use wanaspects_core::domain::config::CONFIG_PATH_ENV;
use wanaspects_core::AspectsConfig;

/// wanaspects - aspect pipeline diagnostics
#[derive(Parser)]
#[command(name = "wanaspects")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to configuration file (overrides discovery)
    #[arg(
        short,
        long,
        global = true,
        env = CONFIG_PATH_ENV,
        value_name = "FILE"
    )]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error); defaults to the configured level
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Print diagnostics
    #[command(name = "diag")]
    Diag,

    /// Configuration management
    #[command(name = "config")]
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },

    /// Run a demo step through the pipeline
    #[command(name = "demo")]
    Demo(DemoArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Diag) => {
            let config = bootstrap(cli.config, cli.log_level.as_deref())?;
            commands::diag::execute(&config).await
        }
        Some(Commands::Config { command }) => {
            // `config` subcommands load (and report on) the file themselves
            let level = cli
                .log_level
                .unwrap_or_else(|| AspectsConfig::default().log_level);
            init_logging(&level, false)?;
            commands::config::handle_command(command, cli.config).await
        }
        Some(Commands::Demo(args)) => {
            let config = bootstrap(cli.config, cli.log_level.as_deref())?;
            let metrics = init_metrics(&config, args.metrics)?;
            commands::demo::execute(args, &config, metrics.as_ref()).await
        }
        None => {
            // No command provided - show help
            eprintln!("{}", "No command specified. Use --help for usage.".yellow());
            std::process::exit(1);
        }
    }
}

/// Load the effective configuration and install logging from it.
fn bootstrap(config_path: Option<PathBuf>, log_level: Option<&str>) -> Result<AspectsConfig> {
    let config = commands::config::load(config_path)?;

    let level = log_level.unwrap_or(&config.log_level);
    init_logging(level, config.log_json)?;
    debug!(bundle = %config.bundle, "configuration loaded");

    Ok(config)
}
