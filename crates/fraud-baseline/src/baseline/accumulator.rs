//! Per-key running statistics.
//!
//! `StatAccumulator` keeps count, mean and M2 (sum of squared deviations from
//! the mean) and is updated with Welford's online algorithm, which stays
//! accurate where the naive sum / sum-of-squares form cancels catastrophically.

use serde::{Deserialize, Serialize};

/// Divisor used when turning M2 into a variance.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StddevMode {
    /// M2 / (n - 1), Bessel-corrected.
    #[default]
    Sample,
    /// M2 / n.
    Population,
}

/// Running count, mean and M2 for one key.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct StatAccumulator {
    count: u64,
    mean: f64,
    m2: f64,
}

impl StatAccumulator {
    /// Empty accumulator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Restore an accumulator from persisted state.
    ///
    /// A zero count always yields the empty accumulator, and a negative M2
    /// (only reachable through hand-edited snapshots) is clamped to zero.
    pub fn from_parts(count: u64, mean: f64, m2: f64) -> Self {
        if count == 0 {
            return Self::default();
        }
        Self {
            count,
            mean,
            m2: m2.max(0.0),
        }
    }

    /// Incorporate one observation.
    pub fn update(&mut self, value: f64) {
        self.count += 1;
        let delta = value - self.mean;
        self.mean += delta / self.count as f64;
        self.m2 += delta * (value - self.mean);
    }

    /// Combine another accumulator into this one (Chan et al.).
    pub fn merge(&mut self, other: &StatAccumulator) {
        if other.count == 0 {
            return;
        }
        if self.count == 0 {
            *self = other.clone();
            return;
        }

        let total = self.count + other.count;
        let delta = other.mean - self.mean;
        let (n_a, n_b) = (self.count as f64, other.count as f64);

        self.m2 += other.m2 + delta * delta * n_a * n_b / total as f64;
        self.mean += delta * n_b / total as f64;
        self.count = total;
    }

    /// The accumulator with one previously observed `value` removed.
    ///
    /// Exact inverse of `update` for a value that was part of the
    /// population. Removing from a single-observation accumulator yields the
    /// empty one.
    pub fn without(&self, value: f64) -> StatAccumulator {
        if self.count <= 1 {
            return StatAccumulator::default();
        }
        let count = self.count - 1;
        let mean = self.mean + (self.mean - value) / count as f64;
        let m2 = self.m2 - (value - mean) * (value - self.mean);
        Self {
            count,
            mean,
            m2: m2.max(0.0),
        }
    }

    /// Number of observations folded in.
    pub fn count(&self) -> u64 {
        self.count
    }

    /// Mean of the observations, 0.0 when empty.
    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.mean
        }
    }

    /// Sum of squared deviations from the mean.
    pub fn m2(&self) -> f64 {
        self.m2
    }

    /// Variance under `mode`; 0.0 with fewer than two observations.
    pub fn variance(&self, mode: StddevMode) -> f64 {
        if self.count < 2 {
            return 0.0;
        }
        let divisor = match mode {
            StddevMode::Sample => (self.count - 1) as f64,
            StddevMode::Population => self.count as f64,
        };
        self.m2 / divisor
    }

    /// Sample standard deviation; 0.0 with fewer than two observations.
    pub fn stddev(&self) -> f64 {
        self.stddev_with(StddevMode::Sample)
    }

    /// Standard deviation under `mode`; 0.0 with fewer than two observations.
    pub fn stddev_with(&self, mode: StddevMode) -> f64 {
        self.variance(mode).sqrt()
    }

    /// Owned, read-only view of the current statistics.
    pub fn snapshot(&self, mode: StddevMode) -> KeyStatistics {
        KeyStatistics {
            count: self.count,
            mean: self.mean(),
            stddev: self.stddev_with(mode),
        }
    }
}

/// Point-in-time statistics for one key.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct KeyStatistics {
    pub count: u64,
    pub mean: f64,
    pub stddev: f64,
}
