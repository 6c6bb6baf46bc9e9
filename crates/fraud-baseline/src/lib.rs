//! # fraud-baseline
//!
//! Per-key running statistics and two-pass outlier flagging for transaction
//! streams.
//!
//! Pass 1 folds every record's amount into a Welford accumulator for its
//! user; pass 2 re-reads the same records and flags any amount strictly
//! above `mean + k * stddev` of its user's completed baseline.
//!
//! ## Architecture
//!
//! ```text
//!   ┌──────────────┐   pass 1    ┌───────────────────┐
//!   │ RecordSource │────────────►│ AggregationEngine │
//!   │ (restartable)│             │  ┌─────────────┐  │
//!   └──────┬───────┘             │  │ Statistics  │  │  ← Welford per key
//!          │                     │  │ Table       │  │
//!          │        pass 2       │  └──────┬──────┘  │
//!          └────────────────────►│         │ read    │
//!                                │  ┌──────▼──────┐  │
//!                                │  │ Anomaly     │  │  ← mean + k·stddev
//!                                │  │ Evaluator   │  │
//!                                │  └──────┬──────┘  │
//!                                └─────────┼─────────┘
//!                                          │ flagged
//!                                          ▼
//!                                   ┌─────────────┐
//!                                   │ FlaggedSink │  → CSV / JSON lines / memory
//!                                   └─────────────┘
//! ```
//!
//! ## Guarantees
//!
//! - No record is classified before every record has been aggregated.
//! - The statistics table is never mutated during evaluation.
//! - A key with fewer than two observations is never flagged.
//! - Sharded runs produce the same flags in the same order as sequential runs.
//!
//! ## Quick Start
//!
//! ```rust
//! use chrono::Utc;
//! use fraud_baseline::{
//!     AggregationEngine, BaselineInclusion, CollectingSink, EngineConfig, TransactionRecord,
//!     VecSource,
//! };
//!
//! let source = VecSource::from_records(
//!     [10.0, 10.0, 10.0, 10.0, 100.0]
//!         .iter()
//!         .enumerate()
//!         .map(|(i, amount)| TransactionRecord::new(format!("t{i}"), "U1", *amount, Utc::now()))
//!         .collect(),
//! );
//!
//! let config = EngineConfig {
//!     baseline: BaselineInclusion::LeaveOneOut,
//!     ..EngineConfig::default()
//! };
//! let mut engine = AggregationEngine::new(config).unwrap();
//! let mut sink = CollectingSink::new();
//! let report = engine.run(&source, &mut sink).unwrap();
//!
//! assert_eq!(report.evaluation.records_flagged, 1);
//! assert_eq!(sink.records()[0].record.amount, 100.0);
//! ```

#![deny(unsafe_code)]

pub mod anomaly;
pub mod baseline;
pub mod engine;
pub mod error;
pub mod io;
pub mod record;

// ── Re-exports ──────────────────────────────────────────────────────────

pub use anomaly::{
    classify, AnomalyEvaluator, BaselineInclusion, DEFAULT_MIN_OBSERVATIONS,
    DEFAULT_THRESHOLD_MULTIPLIER, MIN_OBSERVATIONS_FLOOR,
};
pub use baseline::{
    InMemoryStatistics, JsonFileStatistics, KeyStatistics, StatAccumulator, StatisticsPersistence,
    StatisticsTable, StddevMode, TableSnapshot,
};
pub use engine::{
    AggregationEngine, CancellationToken, EngineConfig, EngineState, EvaluationSummary,
    IngestSummary, RunId, RunReport, RunWarning, DEFAULT_CANCEL_CHECK_INTERVAL, DEFAULT_SHARDS,
    MAX_REPORTED_MALFORMED,
};
pub use error::{BaselineError, BaselineResult, MalformedRecord};
pub use io::{
    CollectingSink, CsvSink, CsvSource, FlaggedSink, JsonLinesSink, RecordSource, SourceItem,
    VecSource, CSV_SINK_HEADER, REQUIRED_COLUMNS,
};
pub use record::{FlaggedRecord, RawTransaction, TransactionRecord};
