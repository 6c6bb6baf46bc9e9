//! Mean + k·stddev outlier test against a key's completed baseline.

use serde::{Deserialize, Serialize};

use crate::baseline::{KeyStatistics, StatAccumulator, StddevMode};
use crate::record::{FlaggedRecord, TransactionRecord};

use super::{DEFAULT_MIN_OBSERVATIONS, DEFAULT_THRESHOLD_MULTIPLIER, MIN_OBSERVATIONS_FLOOR};

/// Whether a record is part of the population it is tested against.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BaselineInclusion {
    /// The record counts toward its own key's baseline.
    #[default]
    Inclusive,
    /// The record's own value is removed from the baseline before testing.
    LeaveOneOut,
}

/// Classifies records against per-key statistics.
///
/// Pure: no state beyond its configuration and no failure modes.
#[derive(Clone, Debug, PartialEq)]
pub struct AnomalyEvaluator {
    threshold_multiplier: f64,
    min_observations: u64,
    stddev_mode: StddevMode,
    inclusion: BaselineInclusion,
}

impl AnomalyEvaluator {
    /// Evaluator with the given multiplier and default everything else.
    pub fn new(threshold_multiplier: f64) -> Self {
        Self {
            threshold_multiplier,
            ..Self::default()
        }
    }

    /// Minimum baseline size before a key can be flagged. Values below two
    /// are raised to two.
    pub fn with_min_observations(mut self, min_observations: u64) -> Self {
        self.min_observations = min_observations.max(MIN_OBSERVATIONS_FLOOR);
        self
    }

    /// Divisor used for the key's standard deviation.
    pub fn with_stddev_mode(mut self, mode: StddevMode) -> Self {
        self.stddev_mode = mode;
        self
    }

    /// Whether the evaluated record counts toward its own baseline.
    pub fn with_inclusion(mut self, inclusion: BaselineInclusion) -> Self {
        self.inclusion = inclusion;
        self
    }

    /// `k` in `mean + k * stddev`.
    pub fn threshold_multiplier(&self) -> f64 {
        self.threshold_multiplier
    }

    /// Smallest baseline that can produce a flag, never below two.
    pub fn min_observations(&self) -> u64 {
        self.min_observations
    }

    /// Current stddev divisor.
    pub fn stddev_mode(&self) -> StddevMode {
        self.stddev_mode
    }

    /// Current baseline inclusion.
    pub fn inclusion(&self) -> BaselineInclusion {
        self.inclusion
    }

    /// Statistics of the population `record` is tested against.
    pub fn baseline(&self, record: &TransactionRecord, acc: &StatAccumulator) -> KeyStatistics {
        match self.inclusion {
            BaselineInclusion::Inclusive => acc.snapshot(self.stddev_mode),
            BaselineInclusion::LeaveOneOut => {
                acc.without(record.value()).snapshot(self.stddev_mode)
            }
        }
    }

    /// `mean + k * stddev`.
    pub fn threshold(&self, stats: &KeyStatistics) -> f64 {
        stats.mean + self.threshold_multiplier * stats.stddev
    }

    fn exceeds(&self, record: &TransactionRecord, stats: &KeyStatistics) -> bool {
        stats.count >= self.min_observations && record.value() > self.threshold(stats)
    }

    /// True iff the key has a baseline of at least `min_observations` and
    /// the record's value is strictly above its threshold. Unknown keys are
    /// never flagged.
    pub fn classify(&self, record: &TransactionRecord, acc: Option<&StatAccumulator>) -> bool {
        match acc {
            Some(acc) => self.exceeds(record, &self.baseline(record, acc)),
            None => false,
        }
    }

    /// Full verdict for a record, or `None` when its key has no statistics.
    pub fn evaluate(
        &self,
        record: &TransactionRecord,
        acc: Option<&StatAccumulator>,
    ) -> Option<FlaggedRecord> {
        let acc = acc?;
        let stats = self.baseline(record, acc);
        Some(FlaggedRecord {
            record: record.clone(),
            key_mean: stats.mean,
            key_stddev: stats.stddev,
            key_count: stats.count,
            threshold: self.threshold(&stats),
            is_fraud: self.exceeds(record, &stats),
        })
    }
}

impl Default for AnomalyEvaluator {
    fn default() -> Self {
        Self {
            threshold_multiplier: DEFAULT_THRESHOLD_MULTIPLIER,
            min_observations: DEFAULT_MIN_OBSERVATIONS,
            stddev_mode: StddevMode::default(),
            inclusion: BaselineInclusion::default(),
        }
    }
}

/// Classify with a given multiplier and default settings otherwise
/// (two-observation minimum, sample stddev, inclusive baseline).
pub fn classify(
    record: &TransactionRecord,
    acc: Option<&StatAccumulator>,
    threshold_multiplier: f64,
) -> bool {
    AnomalyEvaluator::new(threshold_multiplier).classify(record, acc)
}
