//! Parallel variants of both passes.
//!
//! Pass 1 partitions records by key hash so every shard owns a disjoint set
//! of keys and builds its own table without locking; the shard tables are
//! then absorbed into one. Pass 2 evaluates fixed-size chunks in parallel
//! against the completed table. Both preserve source order, so results are
//! identical to the sequential passes.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use rayon::prelude::*;
use tracing::debug;

use crate::anomaly::AnomalyEvaluator;
use crate::baseline::StatisticsTable;
use crate::error::{BaselineError, BaselineResult};
use crate::io::RecordSource;
use crate::record::{FlaggedRecord, TransactionRecord};

use super::cancel::CancellationToken;
use super::report::{EvaluationSummary, IngestSummary};
use super::EngineState;

/// Shard owning `key`.
pub(crate) fn shard_of(key: &str, shards: usize) -> usize {
    let mut hasher = DefaultHasher::new();
    key.hash(&mut hasher);
    (hasher.finish() % shards as u64) as usize
}

fn cancelled(phase: EngineState) -> BaselineError {
    BaselineError::Cancelled { phase }
}

pub(crate) fn ingest(
    source: &dyn RecordSource,
    shards: usize,
    interval: usize,
    cancel: &CancellationToken,
) -> BaselineResult<(StatisticsTable, IngestSummary)> {
    let mut summary = IngestSummary::default();
    let mut partitions: Vec<Vec<(String, f64)>> = vec![Vec::new(); shards];

    for (i, item) in source.records()?.enumerate() {
        if i > 0 && i % interval == 0 && cancel.is_cancelled() {
            return Err(cancelled(EngineState::Ingesting));
        }
        match item {
            Ok(record) => {
                summary.record_ingested();
                let shard = shard_of(record.key(), shards);
                partitions[shard].push((record.user_id, record.amount));
            }
            Err(malformed) => summary.record_malformed(malformed),
        }
    }

    let shard_tables = partitions
        .into_par_iter()
        .map(|partition| {
            if cancel.is_cancelled() {
                return Err(cancelled(EngineState::Ingesting));
            }
            let mut table = StatisticsTable::new();
            for (key, value) in &partition {
                table.observe(key, *value);
            }
            Ok(table)
        })
        .collect::<BaselineResult<Vec<_>>>()?;

    let mut table = StatisticsTable::new();
    for (shard, shard_table) in shard_tables.into_iter().enumerate() {
        debug!(shard, keys = shard_table.len(), "shard aggregated");
        table.absorb(shard_table);
    }
    summary.distinct_keys = table.len();
    Ok((table, summary))
}

/// Evaluate in parallel; returns flagged records in source order.
/// `count_malformed` is false when pass 1 already counted the source's bad
/// rows.
pub(crate) fn evaluate(
    source: &dyn RecordSource,
    table: &StatisticsTable,
    evaluator: &AnomalyEvaluator,
    interval: usize,
    count_malformed: bool,
    cancel: &CancellationToken,
) -> BaselineResult<(Vec<FlaggedRecord>, EvaluationSummary)> {
    let mut summary = EvaluationSummary::default();
    let mut records: Vec<TransactionRecord> = Vec::new();
    for (i, item) in source.records()?.enumerate() {
        if i > 0 && i % interval == 0 && cancel.is_cancelled() {
            return Err(cancelled(EngineState::Evaluating));
        }
        match item {
            Ok(record) => records.push(record),
            Err(malformed) if count_malformed => summary.record_malformed(malformed),
            Err(_) => {}
        }
    }

    let chunks = records
        .par_chunks(interval)
        .map(|chunk| {
            if cancel.is_cancelled() {
                return Err(cancelled(EngineState::Evaluating));
            }
            let mut flagged = Vec::new();
            let mut unclassified = 0u64;
            for record in chunk {
                match evaluator.evaluate(record, table.get(record.key())) {
                    Some(verdict) if verdict.is_fraud => flagged.push(verdict),
                    Some(_) => {}
                    None => unclassified += 1,
                }
            }
            Ok((flagged, unclassified))
        })
        .collect::<BaselineResult<Vec<_>>>()?;

    summary.records_evaluated = records.len() as u64;
    let mut flagged = Vec::new();
    for (chunk_flagged, unclassified) in chunks {
        summary.records_unclassified += unclassified;
        flagged.extend(chunk_flagged);
    }
    Ok((flagged, summary))
}
