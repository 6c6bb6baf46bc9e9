//! Per-key baselines built in pass 1.
//!
//! ## Architecture
//!
//! ```text
//!   (key, value) ──► StatisticsTable ──► StatAccumulator (per key)
//!                         │                  ├── count
//!                         │                  ├── mean   (Welford)
//!                         │                  └── M2     (Welford)
//!                         │
//!                         └── StatisticsPersistence (JSON file / in-memory)
//! ```

pub mod accumulator;
pub mod persistence;
pub mod table;

pub use accumulator::{KeyStatistics, StatAccumulator, StddevMode};
pub use persistence::{
    InMemoryStatistics, JsonFileStatistics, StatisticsPersistence, TableSnapshot,
};
pub use table::StatisticsTable;
