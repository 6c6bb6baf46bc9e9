//! Outlier classification for pass 2.
//!
//! ```text
//!   TransactionRecord + StatAccumulator (its key)
//!       │
//!       ├── baseline: inclusive │ leave-one-out
//!       ├── threshold = mean + k · stddev
//!       └── flagged  ⇔ count ≥ min_observations ∧ value > threshold
//! ```

pub mod evaluator;

pub use evaluator::{classify, AnomalyEvaluator, BaselineInclusion};

/// Default threshold multiplier (3-sigma).
pub const DEFAULT_THRESHOLD_MULTIPLIER: f64 = 3.0;

/// Default minimum baseline size before a key can be flagged.
pub const DEFAULT_MIN_OBSERVATIONS: u64 = 2;

/// Below two observations the standard deviation is undefined.
pub const MIN_OBSERVATIONS_FLOOR: u64 = 2;
