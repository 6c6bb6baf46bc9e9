//! Engine configuration.

use serde::{Deserialize, Serialize};

use crate::anomaly::{
    AnomalyEvaluator, BaselineInclusion, DEFAULT_MIN_OBSERVATIONS, DEFAULT_THRESHOLD_MULTIPLIER,
    MIN_OBSERVATIONS_FLOOR,
};
use crate::baseline::StddevMode;
use crate::error::{BaselineError, BaselineResult};

use super::{DEFAULT_CANCEL_CHECK_INTERVAL, DEFAULT_SHARDS};

/// Configuration for one `AggregationEngine` run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// k in `mean + k * stddev`. Lower flags more records. Default: 3.0.
    pub threshold_multiplier: f64,
    /// Minimum baseline size before a key can be flagged. Default: 2.
    pub min_observations: u64,
    /// Sample (n - 1) or population (n) standard deviation. Default: sample.
    pub stddev_mode: StddevMode,
    /// Whether a record counts toward its own baseline. Default: inclusive.
    pub baseline: BaselineInclusion,
    /// Worker shards; 1 runs both passes sequentially.
    pub shards: usize,
    /// Records between cancellation checks.
    pub cancel_check_interval: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            threshold_multiplier: DEFAULT_THRESHOLD_MULTIPLIER,
            min_observations: DEFAULT_MIN_OBSERVATIONS,
            stddev_mode: StddevMode::default(),
            baseline: BaselineInclusion::default(),
            shards: DEFAULT_SHARDS,
            cancel_check_interval: DEFAULT_CANCEL_CHECK_INTERVAL,
        }
    }
}

impl EngineConfig {
    /// Check every field, returning `InvalidConfig` naming the first bad one.
    pub fn validate(&self) -> BaselineResult<()> {
        if !self.threshold_multiplier.is_finite() || self.threshold_multiplier < 0.0 {
            return Err(BaselineError::InvalidConfig(format!(
                "threshold_multiplier must be a finite non-negative number, got {}",
                self.threshold_multiplier
            )));
        }
        if self.min_observations < MIN_OBSERVATIONS_FLOOR {
            return Err(BaselineError::InvalidConfig(format!(
                "min_observations must be at least {}, got {}",
                MIN_OBSERVATIONS_FLOOR, self.min_observations
            )));
        }
        if self.shards == 0 {
            return Err(BaselineError::InvalidConfig("shards must be at least 1".into()));
        }
        if self.cancel_check_interval == 0 {
            return Err(BaselineError::InvalidConfig(
                "cancel_check_interval must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// The evaluator this configuration describes.
    pub fn evaluator(&self) -> AnomalyEvaluator {
        AnomalyEvaluator::new(self.threshold_multiplier)
            .with_min_observations(self.min_observations)
            .with_stddev_mode(self.stddev_mode)
            .with_inclusion(self.baseline)
    }
}
