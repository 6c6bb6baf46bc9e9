//! Two-pass aggregation engine.
//!
//! ```text
//!   Ingesting ──(source exhausted)──► Aggregated ──► Evaluating ──► Done
//!       │                                 ▲                          │
//!       │ pass 1: observe(key, value)     └──── evaluate again ──────┘
//!       ▼
//!   StatisticsTable (mutable)         StatisticsTable (read-only)
//! ```
//!
//! Every record must be aggregated before any record is classified, since
//! thresholds come from the complete population of a key. The table is only
//! mutated in `Ingesting`; from `Aggregated` on the engine hands it out by
//! shared reference only.

pub mod cancel;
pub mod config;
pub mod report;
mod sharded;

use std::fmt;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::anomaly::{AnomalyEvaluator, BaselineInclusion};
use crate::baseline::StatisticsTable;
use crate::error::{BaselineError, BaselineResult};
use crate::io::{FlaggedSink, RecordSource};
use crate::record::FlaggedRecord;

pub use cancel::CancellationToken;
pub use config::EngineConfig;
pub use report::{EvaluationSummary, IngestSummary, RunId, RunReport, RunWarning};

/// Default number of shards (sequential).
pub const DEFAULT_SHARDS: usize = 1;

/// Default number of records between cancellation checks.
pub const DEFAULT_CANCEL_CHECK_INTERVAL: usize = 4096;

/// Maximum malformed rows kept in an `IngestSummary` or `EvaluationSummary`.
pub const MAX_REPORTED_MALFORMED: usize = 100;

/// Lifecycle of one engine.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineState {
    Ingesting,
    Aggregated,
    Evaluating,
    Done,
}

impl fmt::Display for EngineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EngineState::Ingesting => "ingesting",
            EngineState::Aggregated => "aggregated",
            EngineState::Evaluating => "evaluating",
            EngineState::Done => "done",
        };
        f.write_str(name)
    }
}

/// Owns the statistics table for one run and drives both passes.
pub struct AggregationEngine {
    config: EngineConfig,
    evaluator: AnomalyEvaluator,
    table: StatisticsTable,
    state: EngineState,
    cancel: CancellationToken,
    ingest_summary: Option<IngestSummary>,
}

impl AggregationEngine {
    /// Create an engine in `Ingesting`; fails if `config` is invalid.
    pub fn new(config: EngineConfig) -> BaselineResult<Self> {
        config.validate()?;
        Ok(Self {
            evaluator: config.evaluator(),
            config,
            table: StatisticsTable::new(),
            state: EngineState::Ingesting,
            cancel: CancellationToken::new(),
            ingest_summary: None,
        })
    }

    /// Start from a completed table (e.g. one loaded from a snapshot); the
    /// engine begins in `Aggregated` and only evaluates.
    ///
    /// Records evaluated against a loaded table were never observed into it,
    /// so the table already excludes each record's own value. Under
    /// `LeaveOneOut` the record is tested against the table as it is instead
    /// of having its value removed a second time.
    pub fn from_statistics(config: EngineConfig, table: StatisticsTable) -> BaselineResult<Self> {
        let mut engine = Self::new(config)?;
        if engine.config.baseline == BaselineInclusion::LeaveOneOut {
            debug!("loaded table excludes evaluated records; testing against it unchanged");
            engine.evaluator = engine.evaluator.with_inclusion(BaselineInclusion::Inclusive);
        }
        engine.table = table;
        engine.state = EngineState::Aggregated;
        Ok(engine)
    }

    /// Observe `token` for cooperative cancellation.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Current lifecycle state.
    pub fn state(&self) -> EngineState {
        self.state
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// The evaluator pass 2 applies.
    pub fn evaluator(&self) -> &AnomalyEvaluator {
        &self.evaluator
    }

    /// Read-only view of the statistics table.
    pub fn statistics(&self) -> &StatisticsTable {
        &self.table
    }

    pub fn into_statistics(self) -> StatisticsTable {
        self.table
    }

    /// Summary of pass 1, if this engine ran it.
    pub fn ingest_summary(&self) -> Option<&IngestSummary> {
        self.ingest_summary.as_ref()
    }

    fn check_cancelled(&self, phase: EngineState) -> BaselineResult<()> {
        if self.cancel.is_cancelled() {
            warn!(%phase, "run cancelled");
            return Err(BaselineError::Cancelled { phase });
        }
        Ok(())
    }

    /// Pass 1: aggregate every valid record of `source`.
    ///
    /// Malformed rows are skipped and counted. On cancellation the partial
    /// table is discarded and the engine stays in `Ingesting`.
    pub fn ingest(&mut self, source: &dyn RecordSource) -> BaselineResult<IngestSummary> {
        if self.state != EngineState::Ingesting {
            return Err(BaselineError::InvalidState {
                expected: "ingesting",
                found: self.state,
            });
        }
        self.check_cancelled(EngineState::Ingesting)?;
        debug!(source = %source.describe(), shards = self.config.shards, "ingest started");

        let result = if self.config.shards > 1 {
            sharded::ingest(
                source,
                self.config.shards,
                self.config.cancel_check_interval,
                &self.cancel,
            )
        } else {
            self.ingest_sequential(source)
        };

        let (table, summary) = match result {
            Ok(done) => done,
            Err(e) => {
                self.table = StatisticsTable::new();
                return Err(e);
            }
        };

        if summary.records_seen == 0 {
            warn!(source = %source.describe(), "record source yielded no records");
        }
        if summary.records_skipped > 0 {
            warn!(
                skipped = summary.records_skipped,
                ingested = summary.records_ingested,
                "malformed records skipped during ingest"
            );
        }
        info!(
            records = summary.records_ingested,
            keys = summary.distinct_keys,
            "statistics aggregated"
        );

        self.table = table;
        self.state = EngineState::Aggregated;
        self.ingest_summary = Some(summary.clone());
        Ok(summary)
    }

    fn ingest_sequential(
        &self,
        source: &dyn RecordSource,
    ) -> BaselineResult<(StatisticsTable, IngestSummary)> {
        let interval = self.config.cancel_check_interval;
        let mut table = StatisticsTable::new();
        let mut summary = IngestSummary::default();

        for (i, item) in source.records()?.enumerate() {
            if i > 0 && i % interval == 0 {
                self.check_cancelled(EngineState::Ingesting)?;
            }
            match item {
                Ok(record) => {
                    table.observe(record.key(), record.value());
                    summary.record_ingested();
                }
                Err(malformed) => summary.record_malformed(malformed),
            }
        }

        summary.distinct_keys = table.len();
        Ok((table, summary))
    }

    /// Pass 2: classify every record of `source` against the completed table
    /// and deliver the flagged ones to `sink`.
    ///
    /// Legal from `Aggregated` or `Done`; the table is not touched, so
    /// repeated evaluations over the same source give the same output. A
    /// failed or cancelled evaluation leaves the engine in `Aggregated`.
    pub fn evaluate(
        &mut self,
        source: &dyn RecordSource,
        sink: &mut dyn FlaggedSink,
    ) -> BaselineResult<EvaluationSummary> {
        if !matches!(self.state, EngineState::Aggregated | EngineState::Done) {
            return Err(BaselineError::InvalidState {
                expected: "aggregated or done",
                found: self.state,
            });
        }
        self.check_cancelled(EngineState::Evaluating)?;

        self.state = EngineState::Evaluating;
        let result = if self.config.shards > 1 {
            self.evaluate_sharded(source, sink)
        } else {
            self.evaluate_sequential(source, sink)
        };

        match result {
            Ok(summary) => {
                self.state = EngineState::Done;
                if summary.records_skipped > 0 {
                    warn!(
                        skipped = summary.records_skipped,
                        evaluated = summary.records_evaluated,
                        "malformed records skipped during evaluation"
                    );
                }
                info!(
                    evaluated = summary.records_evaluated,
                    flagged = summary.records_flagged,
                    "evaluation complete"
                );
                Ok(summary)
            }
            Err(e) => {
                self.state = EngineState::Aggregated;
                Err(e)
            }
        }
    }

    fn evaluate_sequential(
        &self,
        source: &dyn RecordSource,
        sink: &mut dyn FlaggedSink,
    ) -> BaselineResult<EvaluationSummary> {
        let interval = self.config.cancel_check_interval;
        let count_malformed = self.ingest_summary.is_none();
        let mut summary = EvaluationSummary::default();

        for (i, item) in source.records()?.enumerate() {
            if i > 0 && i % interval == 0 {
                self.check_cancelled(EngineState::Evaluating)?;
            }
            let record = match item {
                Ok(record) => record,
                Err(malformed) => {
                    // After `ingest` the row is already in `IngestSummary`.
                    if count_malformed {
                        summary.record_malformed(malformed);
                    }
                    continue;
                }
            };

            summary.records_evaluated += 1;
            match self.evaluator.evaluate(&record, self.table.get(record.key())) {
                Some(verdict) if verdict.is_fraud => {
                    deliver(sink, &verdict, summary.records_flagged)?;
                    summary.records_flagged += 1;
                }
                Some(_) => {}
                None => summary.records_unclassified += 1,
            }
        }

        finish(sink, summary.records_flagged)?;
        Ok(summary)
    }

    fn evaluate_sharded(
        &self,
        source: &dyn RecordSource,
        sink: &mut dyn FlaggedSink,
    ) -> BaselineResult<EvaluationSummary> {
        let (flagged, mut summary) = sharded::evaluate(
            source,
            &self.table,
            &self.evaluator,
            self.config.cancel_check_interval,
            self.ingest_summary.is_none(),
            &self.cancel,
        )?;
        for verdict in &flagged {
            deliver(sink, verdict, summary.records_flagged)?;
            summary.records_flagged += 1;
        }
        finish(sink, summary.records_flagged)?;
        Ok(summary)
    }

    /// Both passes over `source`, flagged records to `sink`.
    pub fn run(
        &mut self,
        source: &dyn RecordSource,
        sink: &mut dyn FlaggedSink,
    ) -> BaselineResult<RunReport> {
        let run_id = RunId::new();
        let started_at = Utc::now();
        info!(%run_id, source = %source.describe(), "run started");

        let ingest = self.ingest(source)?;
        let evaluation = self.evaluate(source, sink)?;
        let warnings = RunReport::warnings_for(&ingest);

        info!(
            %run_id,
            ingested = ingest.records_ingested,
            skipped = ingest.records_skipped,
            keys = ingest.distinct_keys,
            flagged = evaluation.records_flagged,
            "run finished"
        );

        Ok(RunReport {
            run_id,
            started_at,
            finished_at: Utc::now(),
            ingest,
            evaluation,
            warnings,
        })
    }
}

fn deliver(sink: &mut dyn FlaggedSink, verdict: &FlaggedRecord, delivered: u64) -> BaselineResult<()> {
    sink.write(verdict).map_err(|e| BaselineError::SinkWrite {
        delivered,
        reason: e.to_string(),
    })
}

fn finish(sink: &mut dyn FlaggedSink, delivered: u64) -> BaselineResult<()> {
    sink.finish().map_err(|e| BaselineError::SinkWrite {
        delivered,
        reason: e.to_string(),
    })
}
