//! End-to-end runs through the public API: CSV in, flagged records out.

use std::fs;

use fraud_baseline::*;

const SPIKE: &str = "\
transaction_id,user_id,amount,timestamp
t1,U1,10,2024-03-01 08:00:00
t2,U1,10,2024-03-01 09:00:00
t3,U1,10,2024-03-01 10:00:00
t4,U1,10,2024-03-01 11:00:00
t5,U1,100,2024-03-01 12:00:00
";

fn flagged_ids(sink: &CollectingSink) -> Vec<String> {
    sink.records()
        .iter()
        .map(|f| f.record.transaction_id.clone())
        .collect()
}

fn run(config: EngineConfig, csv: &str) -> (RunReport, CollectingSink) {
    let source = CsvSource::from_text(csv);
    let mut engine = AggregationEngine::new(config).unwrap();
    let mut sink = CollectingSink::new();
    let report = engine.run(&source, &mut sink).unwrap();
    (report, sink)
}

struct BrokenSink;

impl FlaggedSink for BrokenSink {
    fn write(&mut self, _flagged: &FlaggedRecord) -> BaselineResult<()> {
        Err(BaselineError::Persistence("output closed".into()))
    }
}

#[test]
fn spike_with_leave_one_out_three_sigma() {
    let config = EngineConfig {
        baseline: BaselineInclusion::LeaveOneOut,
        ..EngineConfig::default()
    };
    let (report, sink) = run(config, SPIKE);

    assert_eq!(flagged_ids(&sink), vec!["t5"]);
    let verdict = &sink.records()[0];
    assert_eq!(verdict.key_count, 4);
    assert!((verdict.key_mean - 10.0).abs() < 1e-9);
    assert_eq!(report.evaluation.records_evaluated, 5);
}

#[test]
fn spike_with_inclusive_baseline() {
    let (_, sink) = run(EngineConfig::default(), SPIKE);
    assert!(sink.is_empty(), "an inclusive 3-sigma test cannot flag 1 of 5");

    let sensitive = EngineConfig {
        threshold_multiplier: 1.5,
        ..EngineConfig::default()
    };
    let (_, sink) = run(sensitive, SPIKE);
    assert_eq!(flagged_ids(&sink), vec!["t5"]);
    let verdict = &sink.records()[0];
    assert_eq!(verdict.key_count, 5);
    assert!((verdict.key_mean - 28.0).abs() < 1e-9);
    assert!((verdict.key_stddev - 1620f64.sqrt()).abs() < 1e-9);
}

#[test]
fn single_record_key_is_never_flagged() {
    let csv = "transaction_id,user_id,amount,timestamp\nt1,U2,50,2024-03-01\n";
    let config = EngineConfig {
        threshold_multiplier: 0.0,
        ..EngineConfig::default()
    };
    let (report, sink) = run(config, csv);
    assert!(sink.is_empty());
    assert_eq!(report.ingest.distinct_keys, 1);
}

#[test]
fn empty_source_yields_empty_result_and_warning() {
    let (report, sink) = run(
        EngineConfig::default(),
        "transaction_id,user_id,amount,timestamp\n",
    );
    assert!(sink.is_empty());
    assert_eq!(report.ingest.records_seen, 0);
    assert_eq!(report.warnings, vec![RunWarning::EmptySource]);
}

#[test]
fn malformed_rows_are_skipped_and_counted() {
    let csv = "\
transaction_id,user_id,amount,timestamp
t1,U1,10,2024-03-01
t2,U1,ten,2024-03-01
t3,,10,2024-03-01
t4,U1,10,2024-03-01
t5,U1,NaN,2024-03-01
t6,U1,10,yesterday
t7,U1,10,2024-03-01
";
    let (report, _) = run(EngineConfig::default(), csv);

    assert_eq!(report.ingest.records_seen, 7);
    assert_eq!(report.ingest.records_ingested, 3);
    assert_eq!(report.ingest.records_skipped, 4);
    let positions: Vec<u64> = report.ingest.malformed.iter().map(|m| m.position).collect();
    assert_eq!(positions, vec![2, 3, 5, 6]);
    assert_eq!(report.warnings, vec![RunWarning::RecordsSkipped { count: 4 }]);
}

#[test]
fn evaluation_is_repeatable() {
    let source = CsvSource::from_text(SPIKE);
    let config = EngineConfig {
        threshold_multiplier: 1.5,
        ..EngineConfig::default()
    };
    let mut engine = AggregationEngine::new(config).unwrap();
    engine.ingest(&source).unwrap();
    let before = engine.statistics().clone();

    let mut first = CollectingSink::new();
    let mut second = CollectingSink::new();
    engine.evaluate(&source, &mut first).unwrap();
    engine.evaluate(&source, &mut second).unwrap();

    assert_eq!(first.records(), second.records());
    assert_eq!(engine.statistics(), &before);
    assert_eq!(engine.state(), EngineState::Done);
}

#[test]
fn sink_failure_aborts_the_run() {
    let source = CsvSource::from_text(SPIKE);
    let config = EngineConfig {
        threshold_multiplier: 1.5,
        ..EngineConfig::default()
    };
    let mut engine = AggregationEngine::new(config).unwrap();
    let err = engine.run(&source, &mut BrokenSink).unwrap_err();

    assert!(matches!(err, BaselineError::SinkWrite { delivered: 0, .. }));
    assert!(err.to_string().contains("output closed"));
}

#[test]
fn cancellation_stops_the_run() {
    let token = CancellationToken::new();
    let mut engine = AggregationEngine::new(EngineConfig::default())
        .unwrap()
        .with_cancellation(token.clone());
    token.cancel();

    let mut sink = CollectingSink::new();
    let err = engine
        .run(&CsvSource::from_text(SPIKE), &mut sink)
        .unwrap_err();
    assert!(matches!(err, BaselineError::Cancelled { .. }));
    assert!(sink.is_empty());
}

#[test]
fn csv_file_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("transactions.csv");
    let output = dir.path().join("fraud.csv");
    fs::write(&input, SPIKE).unwrap();

    let config = EngineConfig {
        baseline: BaselineInclusion::LeaveOneOut,
        ..EngineConfig::default()
    };
    let source = CsvSource::from_path(&input);
    let mut sink = CsvSink::create(&output).unwrap();
    let mut engine = AggregationEngine::new(config).unwrap();
    engine.run(&source, &mut sink).unwrap();

    let written = fs::read_to_string(&output).unwrap();
    let lines: Vec<_> = written.lines().collect();
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[0], CSV_SINK_HEADER.join(","));
    assert!(lines[1].starts_with("t5,U1,100,2024-03-01T12:00:00Z,10,"));
    assert!(lines[1].ends_with(",4,1"));
}

#[test]
fn statistics_snapshot_feeds_a_later_evaluation() {
    let dir = tempfile::tempdir().unwrap();
    let store = JsonFileStatistics::new(dir.path().join("stats.json"));
    let source = CsvSource::from_text(SPIKE);

    let mut engine = AggregationEngine::new(EngineConfig::default()).unwrap();
    engine.ingest(&source).unwrap();
    store.save(engine.statistics()).unwrap();

    let restored = store.load().unwrap();
    assert_eq!(&restored, engine.statistics());

    let config = EngineConfig {
        threshold_multiplier: 1.5,
        ..EngineConfig::default()
    };
    let mut replay = AggregationEngine::from_statistics(config, restored).unwrap();
    let mut sink = CollectingSink::new();
    replay.evaluate(&source, &mut sink).unwrap();
    assert_eq!(flagged_ids(&sink), vec!["t5"]);
}

#[test]
fn population_mode_changes_the_threshold() {
    let config = EngineConfig {
        threshold_multiplier: 1.9,
        stddev_mode: StddevMode::Population,
        ..EngineConfig::default()
    };
    // population stddev 36, threshold 96.4
    let (_, sink) = run(config.clone(), SPIKE);
    assert_eq!(flagged_ids(&sink), vec!["t5"]);

    // sample stddev ~40.25, threshold ~104.5
    let sample = EngineConfig {
        stddev_mode: StddevMode::Sample,
        ..config
    };
    let (_, sink) = run(sample, SPIKE);
    assert!(sink.is_empty());
}
