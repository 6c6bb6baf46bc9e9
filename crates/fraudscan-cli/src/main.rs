//! fraudscan - flag outlier transactions against per-user baselines
//!
//! The CLI provides:
//! - `scan`: aggregate a transactions CSV and flag outliers in one run
//! - `evaluate`: flag outliers against a previously saved statistics table
//! - `stats`: print per-user count, mean and standard deviation

use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;
mod config;
mod error;
mod output;

use commands::{evaluate, scan, stats};
use config::CliConfig;
use error::CliResult;

/// fraudscan CLI
#[derive(Parser)]
#[command(name = "fraudscan")]
#[command(about = "Flag transactions far above each user's typical amount", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file path (TOML, YAML or JSON)
    #[arg(short, long, env = "FRAUDSCAN_CONFIG", global = true)]
    config: Option<String>,

    /// Log level or filter directive
    #[arg(long, env = "FRAUDSCAN_LOG_LEVEL", global = true)]
    log_level: Option<String>,

    /// Enable JSON logging
    #[arg(long, env = "FRAUDSCAN_LOG_JSON", global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands
#[derive(Subcommand)]
enum Commands {
    /// Aggregate and flag in one run
    Scan(scan::ScanArgs),

    /// Flag against a saved statistics table
    Evaluate(evaluate::EvaluateArgs),

    /// Print per-user statistics
    Stats(stats::StatsArgs),
}

fn init_tracing(level: &str, json: bool) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| level.to_string().into());

    // Logs go to stderr; stdout carries flagged records.
    if json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

fn run(cli: Cli) -> CliResult<()> {
    let config = CliConfig::load(cli.config.as_deref())?;

    let level = cli.log_level.as_deref().unwrap_or(&config.logging.level);
    init_tracing(level, cli.json_logs || config.logging.json);

    match cli.command {
        Commands::Scan(args) => scan::execute(args, config.engine),
        Commands::Evaluate(args) => evaluate::execute(args, config.engine),
        Commands::Stats(args) => stats::execute(args, config.engine),
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}
