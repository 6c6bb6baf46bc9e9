//! `fraudscan evaluate`: evaluation pass against a saved statistics table

use std::path::PathBuf;

use clap::Args;
use fraud_baseline::{
    AggregationEngine, CsvSource, EngineConfig, JsonFileStatistics, StatisticsPersistence,
};

use super::{open_sink, EngineOverrides};
use crate::error::{CliError, CliResult};
use crate::output::{print_report, print_warning};

/// Arguments for `evaluate`
#[derive(Args, Debug)]
pub struct EvaluateArgs {
    /// Transactions CSV to classify
    #[arg(short, long)]
    pub input: PathBuf,

    /// Statistics table written by `scan --stats-out`
    #[arg(short, long)]
    pub stats: PathBuf,

    /// Write flagged transactions to this CSV instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Print the evaluation summary to stderr
    #[arg(long)]
    pub report: bool,

    #[command(flatten)]
    pub engine: EngineOverrides,
}

/// Execute `evaluate`
pub fn execute(args: EvaluateArgs, mut config: EngineConfig) -> CliResult<()> {
    args.engine.apply(&mut config);

    if !args.stats.exists() {
        return Err(CliError::NotFound(format!(
            "statistics file {}",
            args.stats.display()
        )));
    }
    let table = JsonFileStatistics::new(&args.stats).load()?;

    let source = CsvSource::from_path(&args.input);
    let mut engine = AggregationEngine::from_statistics(config, table)?;
    let mut sink = open_sink(args.output.as_ref())?;
    let summary = engine.evaluate(&source, &mut *sink)?;
    drop(sink);

    if summary.records_skipped > 0 {
        print_warning(&format!(
            "{} malformed records skipped",
            summary.records_skipped
        ));
    }
    if summary.records_unclassified > 0 {
        print_warning(&format!(
            "{} transactions belong to users missing from {}",
            summary.records_unclassified,
            args.stats.display()
        ));
    }
    if args.report {
        print_report(&summary)?;
    }
    Ok(())
}
