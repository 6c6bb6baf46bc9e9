//! Statistics persistence: save a completed table and load it back.
//!
//! Accumulator state (count, mean, M2) is stored exactly, so a restored table
//! produces the same evaluation results as the one that was saved.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{BaselineError, BaselineResult};

use super::accumulator::StatAccumulator;
use super::table::StatisticsTable;

/// Serialisable form of a `StatisticsTable`. Keys are ordered so the file is
/// stable across runs.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TableSnapshot {
    pub keys: BTreeMap<String, StatAccumulator>,
}

impl From<&StatisticsTable> for TableSnapshot {
    fn from(table: &StatisticsTable) -> Self {
        Self {
            keys: table
                .iter()
                .map(|(k, acc)| (k.to_string(), acc.clone()))
                .collect(),
        }
    }
}

impl From<TableSnapshot> for StatisticsTable {
    fn from(snapshot: TableSnapshot) -> Self {
        snapshot
            .keys
            .into_iter()
            .map(|(k, acc)| {
                let acc = StatAccumulator::from_parts(acc.count(), acc.mean(), acc.m2());
                (k, acc)
            })
            .collect()
    }
}

/// Storage for completed statistics tables.
pub trait StatisticsPersistence {
    /// Save the whole table, replacing anything stored before.
    fn save(&self, table: &StatisticsTable) -> BaselineResult<()>;

    /// Load the stored table; an empty table if nothing was saved.
    fn load(&self) -> BaselineResult<StatisticsTable>;
}

/// JSON file persistence. Writes go to a `.tmp` sibling and are renamed into
/// place.
pub struct JsonFileStatistics {
    path: PathBuf,
}

impl JsonFileStatistics {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl StatisticsPersistence for JsonFileStatistics {
    fn save(&self, table: &StatisticsTable) -> BaselineResult<()> {
        let snapshot = TableSnapshot::from(table);
        let json = serde_json::to_string_pretty(&snapshot).map_err(|e| {
            BaselineError::Persistence(format!("serialization failed: {}", e))
        })?;

        let tmp_path = self.path.with_extension("tmp");
        std::fs::write(&tmp_path, json)?;
        std::fs::rename(&tmp_path, &self.path)?;

        debug!(path = %self.path.display(), keys = table.len(), "statistics saved");
        Ok(())
    }

    fn load(&self) -> BaselineResult<StatisticsTable> {
        if !self.path.exists() {
            return Ok(StatisticsTable::new());
        }

        let contents = std::fs::read_to_string(&self.path)?;
        let snapshot: TableSnapshot = serde_json::from_str(&contents).map_err(|e| {
            BaselineError::Persistence(format!("deserialization failed: {}", e))
        })?;

        Ok(snapshot.into())
    }
}

/// In-memory persistence, for tests and embedding.
#[derive(Default)]
pub struct InMemoryStatistics {
    data: Mutex<TableSnapshot>,
}

impl InMemoryStatistics {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StatisticsPersistence for InMemoryStatistics {
    fn save(&self, table: &StatisticsTable) -> BaselineResult<()> {
        let mut data = self
            .data
            .lock()
            .map_err(|_| BaselineError::Persistence("lock poisoned".into()))?;
        *data = TableSnapshot::from(table);
        Ok(())
    }

    fn load(&self) -> BaselineResult<StatisticsTable> {
        let data = self
            .data
            .lock()
            .map_err(|_| BaselineError::Persistence("lock poisoned".into()))?;
        Ok(data.clone().into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_table() -> StatisticsTable {
        let mut table = StatisticsTable::new();
        for v in [10.0, 12.0, 9.5, 30.0] {
            table.observe("U1", v);
        }
        table.observe("U2", 100.0);
        table
    }

    #[test]
    fn json_save_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStatistics::new(dir.path().join("stats.json"));

        let table = sample_table();
        store.save(&table).unwrap();
        let loaded = store.load().unwrap();

        assert_eq!(loaded, table);
        assert!(!dir.path().join("stats.tmp").exists());
    }

    #[test]
    fn json_load_nonexistent_returns_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStatistics::new(dir.path().join("missing.json"));
        assert!(store.load().unwrap().is_empty());
    }

    #[test]
    fn json_load_garbage_is_persistence_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stats.json");
        std::fs::write(&path, "{ not json").unwrap();

        let err = JsonFileStatistics::new(&path).load().unwrap_err();
        assert!(matches!(err, BaselineError::Persistence(_)));
    }

    #[test]
    fn json_file_is_key_ordered() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stats.json");
        let mut table = StatisticsTable::new();
        table.observe("zeta", 1.0);
        table.observe("alpha", 2.0);
        JsonFileStatistics::new(&path).save(&table).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        let alpha = contents.find("alpha").unwrap();
        let zeta = contents.find("zeta").unwrap();
        assert!(alpha < zeta);
    }

    #[test]
    fn in_memory_persistence() {
        let store = InMemoryStatistics::new();
        assert!(store.load().unwrap().is_empty());

        let table = sample_table();
        store.save(&table).unwrap();
        assert_eq!(store.load().unwrap(), table);
    }

    #[test]
    fn persistence_trait_object() {
        let store: Box<dyn StatisticsPersistence> = Box::new(InMemoryStatistics::new());
        store.save(&StatisticsTable::new()).unwrap();
        assert!(store.load().unwrap().is_empty());
    }
}
