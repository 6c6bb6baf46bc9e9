//! `fraudscan stats`: aggregation pass only, per-user statistics as JSON lines

use std::path::PathBuf;

use clap::Args;
use fraud_baseline::{AggregationEngine, CsvSource, EngineConfig, StatisticsTable, StddevMode};
use serde::Serialize;

use super::EngineOverrides;
use crate::error::{CliError, CliResult};
use crate::output::{print_warning, write_json_line};

/// Arguments for `stats`
#[derive(Args, Debug)]
pub struct StatsArgs {
    /// Transactions CSV
    #[arg(short, long)]
    pub input: PathBuf,

    /// Only print this user
    #[arg(long)]
    pub key: Option<String>,

    #[command(flatten)]
    pub engine: EngineOverrides,
}

/// One output line
#[derive(Debug, Serialize)]
struct KeyLine<'a> {
    key: &'a str,
    count: u64,
    mean: f64,
    stddev: f64,
}

fn lines<'a>(
    table: &'a StatisticsTable,
    key: Option<&'a str>,
    mode: StddevMode,
) -> CliResult<Vec<KeyLine<'a>>> {
    let keys = match key {
        Some(key) if table.get(key).is_none() => {
            return Err(CliError::NotFound(format!("no transactions for user {}", key)));
        }
        Some(key) => vec![key],
        None => table.keys(),
    };

    Ok(keys
        .into_iter()
        .filter_map(|key| {
            table.statistics(key, mode).map(|stats| KeyLine {
                key,
                count: stats.count,
                mean: stats.mean,
                stddev: stats.stddev,
            })
        })
        .collect())
}

/// Execute `stats`
pub fn execute(args: StatsArgs, mut config: EngineConfig) -> CliResult<()> {
    args.engine.apply(&mut config);
    let mode = config.stddev_mode;

    let source = CsvSource::from_path(&args.input);
    let mut engine = AggregationEngine::new(config)?;
    let summary = engine.ingest(&source)?;
    if summary.records_skipped > 0 {
        print_warning(&format!("{} malformed records skipped", summary.records_skipped));
    }

    let mut out = std::io::stdout().lock();
    for line in lines(engine.statistics(), args.key.as_deref(), mode)? {
        write_json_line(&mut out, &line)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> StatisticsTable {
        let mut table = StatisticsTable::new();
        for v in [1.0, 2.0, 3.0] {
            table.observe("U2", v);
        }
        table.observe("U1", 5.0);
        table
    }

    #[test]
    fn test_lines_sorted_by_key() {
        let table = table();
        let lines = lines(&table, None, StddevMode::Sample).unwrap();
        let keys: Vec<_> = lines.iter().map(|l| l.key).collect();
        assert_eq!(keys, vec!["U1", "U2"]);
        assert_eq!(lines[1].count, 3);
        assert!((lines[1].stddev - 1.0).abs() < 1e-12);
        assert_eq!(lines[0].stddev, 0.0);
    }

    #[test]
    fn test_single_key() {
        let table = table();
        let lines = lines(&table, Some("U2"), StddevMode::Population).unwrap();
        assert_eq!(lines.len(), 1);
        assert!((lines[0].stddev - (2.0f64 / 3.0).sqrt()).abs() < 1e-12);
    }

    #[test]
    fn test_unknown_key() {
        let table = table();
        assert!(matches!(
            lines(&table, Some("U9"), StddevMode::Sample),
            Err(CliError::NotFound(_))
        ));
    }
}
