//! `fraudscan scan`: both passes over a CSV file

use std::path::PathBuf;

use clap::Args;
use fraud_baseline::{
    AggregationEngine, CsvSource, EngineConfig, JsonFileStatistics, StatisticsPersistence,
};
use tracing::info;

use super::{open_sink, EngineOverrides};
use crate::error::CliResult;
use crate::output::{print_report, print_warning};

/// Arguments for `scan`
#[derive(Args, Debug)]
pub struct ScanArgs {
    /// Transactions CSV (transaction_id,user_id,amount,timestamp)
    #[arg(short, long)]
    pub input: PathBuf,

    /// Write flagged transactions to this CSV instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Save the per-user statistics table as JSON
    #[arg(long)]
    pub stats_out: Option<PathBuf>,

    /// Print the run report to stderr
    #[arg(long)]
    pub report: bool,

    #[command(flatten)]
    pub engine: EngineOverrides,
}

/// Execute `scan`
pub fn execute(args: ScanArgs, mut config: EngineConfig) -> CliResult<()> {
    args.engine.apply(&mut config);

    let source = CsvSource::from_path(&args.input);
    let mut engine = AggregationEngine::new(config)?;
    let mut sink = open_sink(args.output.as_ref())?;
    let report = engine.run(&source, &mut *sink)?;
    drop(sink);

    if let Some(path) = &args.stats_out {
        JsonFileStatistics::new(path).save(engine.statistics())?;
        info!(path = %path.display(), keys = engine.statistics().len(), "statistics saved");
    }

    for warning in &report.warnings {
        print_warning(&warning.to_string());
    }
    if args.report {
        print_report(&report)?;
    }
    Ok(())
}
