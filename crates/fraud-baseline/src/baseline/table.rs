//! Key-indexed accumulators for one run.
//!
//! The table owns every `StatAccumulator`. Keys are inserted on first
//! observation and never removed; after pass 1 the engine only hands out
//! shared borrows, so the table is read-only for evaluation.

use std::collections::HashMap;

use tracing::debug;

use super::accumulator::{KeyStatistics, StatAccumulator, StddevMode};

/// Mapping from grouping key to its running statistics.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct StatisticsTable {
    accumulators: HashMap<String, StatAccumulator>,
}

impl StatisticsTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one observation for `key`, creating its accumulator on first
    /// sight.
    pub fn observe(&mut self, key: &str, value: f64) {
        match self.accumulators.get_mut(key) {
            Some(acc) => acc.update(value),
            None => {
                let mut acc = StatAccumulator::new();
                acc.update(value);
                self.accumulators.insert(key.to_string(), acc);
                debug!(key, "new key observed");
            }
        }
    }

    /// Read-only view of a key's accumulator, `None` for unseen keys.
    pub fn get(&self, key: &str) -> Option<&StatAccumulator> {
        self.accumulators.get(key)
    }

    /// Owned statistics snapshot for a key.
    pub fn statistics(&self, key: &str, mode: StddevMode) -> Option<KeyStatistics> {
        self.get(key).map(|acc| acc.snapshot(mode))
    }

    /// Number of distinct keys.
    pub fn len(&self) -> usize {
        self.accumulators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accumulators.is_empty()
    }

    /// All keys, sorted for stable output.
    pub fn keys(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = self.accumulators.keys().map(String::as_str).collect();
        keys.sort_unstable();
        keys
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &StatAccumulator)> {
        self.accumulators.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Total observations across all keys.
    pub fn total_observations(&self) -> u64 {
        self.accumulators.values().map(StatAccumulator::count).sum()
    }

    /// Fold another table into this one.
    ///
    /// Shards partitioned by key never overlap; if they do, the
    /// accumulators are merged rather than replaced.
    pub fn absorb(&mut self, other: StatisticsTable) {
        for (key, acc) in other.accumulators {
            match self.accumulators.get_mut(&key) {
                Some(existing) => existing.merge(&acc),
                None => {
                    self.accumulators.insert(key, acc);
                }
            }
        }
    }

    /// Insert or replace a key's accumulator, e.g. one rebuilt with
    /// `StatAccumulator::from_parts`.
    pub fn insert(&mut self, key: impl Into<String>, acc: StatAccumulator) {
        self.accumulators.insert(key.into(), acc);
    }
}

impl FromIterator<(String, StatAccumulator)> for StatisticsTable {
    fn from_iter<I: IntoIterator<Item = (String, StatAccumulator)>>(iter: I) -> Self {
        Self {
            accumulators: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn observe_creates_and_updates() {
        let mut table = StatisticsTable::new();
        assert!(table.is_empty());

        table.observe("U1", 10.0);
        table.observe("U1", 20.0);
        table.observe("U2", 5.0);

        assert_eq!(table.len(), 2);
        assert_eq!(table.total_observations(), 3);

        let u1 = table.get("U1").unwrap();
        assert_eq!(u1.count(), 2);
        assert!((u1.mean() - 15.0).abs() < f64::EPSILON);
    }

    #[test]
    fn unseen_key_is_absent() {
        let table = StatisticsTable::new();
        assert!(table.get("nobody").is_none());
        assert!(table.statistics("nobody", StddevMode::Sample).is_none());
    }

    #[test]
    fn observe_is_not_idempotent() {
        let mut table = StatisticsTable::new();
        table.observe("U1", 7.0);
        table.observe("U1", 7.0);
        assert_eq!(table.get("U1").unwrap().count(), 2);
    }

    #[test]
    fn statistics_snapshot() {
        let mut table = StatisticsTable::new();
        for v in [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0] {
            table.observe("k", v);
        }
        let stats = table.statistics("k", StddevMode::Population).unwrap();
        assert_eq!(stats.count, 8);
        assert!((stats.mean - 5.0).abs() < 1e-12);
        assert!((stats.stddev - 2.0).abs() < 1e-12);
    }

    #[test]
    fn keys_are_sorted() {
        let mut table = StatisticsTable::new();
        for key in ["c", "a", "b"] {
            table.observe(key, 1.0);
        }
        assert_eq!(table.keys(), vec!["a", "b", "c"]);
    }

    #[test]
    fn absorb_disjoint_and_overlapping() {
        let mut left = StatisticsTable::new();
        left.observe("a", 1.0);
        left.observe("shared", 2.0);

        let mut right = StatisticsTable::new();
        right.observe("b", 3.0);
        right.observe("shared", 4.0);

        left.absorb(right);

        assert_eq!(left.len(), 3);
        let shared = left.get("shared").unwrap();
        assert_eq!(shared.count(), 2);
        assert!((shared.mean() - 3.0).abs() < f64::EPSILON);
    }

    #[test]
    fn from_iterator_and_insert() {
        let mut acc = StatAccumulator::new();
        acc.update(9.0);
        let mut table: StatisticsTable = vec![("x".to_string(), acc.clone())].into_iter().collect();
        assert_eq!(table.get("x"), Some(&acc));

        table.insert("y", StatAccumulator::from_parts(2, 1.0, 0.5));
        assert_eq!(table.get("y").unwrap().count(), 2);
    }
}
