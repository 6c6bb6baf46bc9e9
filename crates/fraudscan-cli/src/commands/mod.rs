//! Subcommand implementations

pub mod evaluate;
pub mod scan;
pub mod stats;

use std::path::PathBuf;

use clap::Args;
use fraud_baseline::{
    BaselineInclusion, CsvSink, EngineConfig, FlaggedSink, JsonLinesSink, StddevMode,
};

use crate::error::CliResult;

/// Engine settings that can be overridden per invocation
#[derive(Args, Debug, Default, Clone)]
pub struct EngineOverrides {
    /// Threshold multiplier k in mean + k * stddev
    #[arg(short = 'k', long)]
    pub threshold: Option<f64>,

    /// Minimum observations per user before flagging (at least 2)
    #[arg(long)]
    pub min_observations: Option<u64>,

    /// Use population (n) instead of sample (n - 1) standard deviation
    #[arg(long)]
    pub population: bool,

    /// Exclude each transaction from the baseline it is tested against
    #[arg(long)]
    pub leave_one_out: bool,

    /// Number of parallel shards
    #[arg(long)]
    pub shards: Option<usize>,
}

impl EngineOverrides {
    /// Apply command line values on top of the loaded configuration
    pub fn apply(&self, config: &mut EngineConfig) {
        if let Some(k) = self.threshold {
            config.threshold_multiplier = k;
        }
        if let Some(n) = self.min_observations {
            config.min_observations = n;
        }
        if self.population {
            config.stddev_mode = StddevMode::Population;
        }
        if self.leave_one_out {
            config.baseline = BaselineInclusion::LeaveOneOut;
        }
        if let Some(shards) = self.shards {
            config.shards = shards;
        }
    }
}

/// CSV file sink when `output` is given, JSON lines on stdout otherwise
pub fn open_sink(output: Option<&PathBuf>) -> CliResult<Box<dyn FlaggedSink>> {
    Ok(match output {
        Some(path) => Box::new(CsvSink::create(path)?),
        None => Box::new(JsonLinesSink::new(std::io::stdout().lock())),
    })
}
