//
// Copyright 2025-2026 Hans W. Uhlig. All Rights Reserved.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//

//! Favorability ledger
//!
//! The ledger holds a single non-negative integer. It is read once when a companion
//! is created, written after every successful change and again at teardown. Stores
//! are injected so tests can run without touching the home directory.

use deskpet_common::DEFAULT_FAVORABILITY;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Errors raised by a ledger store
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("Ledger not found")]
    NotFound,

    #[error("Ledger I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed ledger: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// On-disk record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerRecord {
    pub favorability: i64,
}

/// Backing storage for the favorability score
#[cfg_attr(test, mockall::automock)]
pub trait LedgerStore: Send + Sync {
    /// The stored score, or the default when the store is absent or malformed
    fn load(&self) -> i64;

    /// Overwrite the stored score with `max(0, value)`
    fn save(&self, value: i64) -> Result<(), LedgerError>;
}

/// JSON file store: `{ "favorability": <integer> }`
pub struct FileLedgerStore {
    path: PathBuf,
}

impl FileLedgerStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the stored record, reporting why it could not be read
    pub fn read(&self) -> Result<LedgerRecord, LedgerError> {
        let contents = match std::fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Err(LedgerError::NotFound),
            Err(e) => return Err(e.into()),
        };
        Ok(serde_json::from_str(&contents)?)
    }
}

impl LedgerStore for FileLedgerStore {
    fn load(&self) -> i64 {
        match self.read() {
            Ok(record) => record.favorability.max(0),
            Err(LedgerError::NotFound) => {
                tracing::debug!(
                    "No ledger at {}, using default favorability",
                    self.path.display()
                );
                DEFAULT_FAVORABILITY
            }
            Err(e) => {
                tracing::warn!("Failed to read ledger, using default favorability: {}", e);
                DEFAULT_FAVORABILITY
            }
        }
    }

    fn save(&self, value: i64) -> Result<(), LedgerError> {
        let record = LedgerRecord {
            favorability: value.max(0),
        };
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, serde_json::to_string(&record)?)?;
        tracing::trace!(
            "Saved favorability {} to {}",
            record.favorability,
            self.path.display()
        );
        Ok(())
    }
}

/// Store kept in memory
#[derive(Debug, Default)]
pub struct MemoryLedgerStore {
    value: Mutex<Option<i64>>,
    writes: Mutex<usize>,
}

impl MemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_value(value: i64) -> Self {
        Self {
            value: Mutex::new(Some(value)),
            writes: Mutex::new(0),
        }
    }

    /// Currently stored value, if any
    pub fn stored(&self) -> Option<i64> {
        *self.value.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Number of writes performed
    pub fn write_count(&self) -> usize {
        *self.writes.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl LedgerStore for MemoryLedgerStore {
    fn load(&self) -> i64 {
        self.stored().unwrap_or(DEFAULT_FAVORABILITY)
    }

    fn save(&self, value: i64) -> Result<(), LedgerError> {
        *self.value.lock().unwrap_or_else(|e| e.into_inner()) = Some(value.max(0));
        *self.writes.lock().unwrap_or_else(|e| e.into_inner()) += 1;
        Ok(())
    }
}

/// A companion's view of the favorability score.
///
/// Each companion owns its ledger value; clones start from a copy of the parent's
/// value and write to the same store.
pub struct FavorabilityLedger {
    store: Arc<dyn LedgerStore>,
    value: i64,
}

impl FavorabilityLedger {
    /// Load the score from `store`
    pub fn open(store: Arc<dyn LedgerStore>) -> Self {
        let value = store.load();
        tracing::debug!("Favorability loaded: {}", value);
        Self { store, value }
    }

    /// A new ledger over the same store, starting from this ledger's current value
    pub fn fork(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            value: self.value,
        }
    }

    pub fn value(&self) -> i64 {
        self.value
    }

    /// Apply `delta`, clamp at zero and persist. Returns the new score.
    ///
    /// The in-memory score changes even when persisting fails.
    pub fn apply(&mut self, delta: i64) -> Result<i64, LedgerError> {
        self.value = self.value.saturating_add(delta).max(0);
        metrics::gauge!("deskpet_favorability").set(self.value as f64);
        self.store.save(self.value)?;
        Ok(self.value)
    }

    /// Write the current score to the store
    pub fn persist(&self) -> Result<(), LedgerError> {
        self.store.save(self.value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockall::predicate::eq;

    #[test]
    fn test_file_store_missing_returns_default() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileLedgerStore::new(dir.path().join("ledger.json"));
        assert!(matches!(store.read(), Err(LedgerError::NotFound)));
        assert_eq!(store.load(), 100);
    }

    #[test]
    fn test_file_store_malformed_returns_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.json");
        std::fs::write(&path, "{ favorability: lots }").unwrap();

        let store = FileLedgerStore::new(&path);
        assert!(matches!(store.read(), Err(LedgerError::Malformed(_))));
        assert_eq!(store.load(), 100);
    }

    #[test]
    fn test_file_store_wrong_shape_returns_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.json");
        std::fs::write(&path, r#"{"favorability": "high"}"#).unwrap();

        assert_eq!(FileLedgerStore::new(&path).load(), 100);
    }

    #[test]
    fn test_file_store_save_clamps_negative() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("ledger.json");
        let store = FileLedgerStore::new(&path);

        store.save(-42).unwrap();
        assert_eq!(store.load(), 0);
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            r#"{"favorability":0}"#
        );

        store.save(57).unwrap();
        assert_eq!(store.load(), 57);
    }

    #[test]
    fn test_memory_store_counts_writes() {
        let store = MemoryLedgerStore::new();
        assert_eq!(store.load(), 100);
        store.save(-1).unwrap();
        assert_eq!(store.stored(), Some(0));
        assert_eq!(store.write_count(), 1);
    }

    #[test]
    fn test_ledger_apply_clamps_and_persists() {
        let store = Arc::new(MemoryLedgerStore::with_value(7));
        let mut ledger = FavorabilityLedger::open(store.clone());
        assert_eq!(ledger.value(), 7);

        assert_eq!(ledger.apply(-10).unwrap(), 0);
        assert_eq!(store.stored(), Some(0));

        assert_eq!(ledger.apply(5).unwrap(), 5);
        assert_eq!(store.stored(), Some(5));
    }

    #[test]
    fn test_fork_copies_value_not_reference() {
        let store = Arc::new(MemoryLedgerStore::with_value(40));
        let mut parent = FavorabilityLedger::open(store.clone());
        let child = parent.fork();

        parent.apply(-10).unwrap();
        assert_eq!(parent.value(), 30);
        assert_eq!(child.value(), 40);
    }

    #[test]
    fn test_apply_keeps_value_when_store_fails() {
        let mut store = MockLedgerStore::new();
        store.expect_load().returning(|| 20);
        store
            .expect_save()
            .with(eq(23))
            .times(1)
            .returning(|_| Err(LedgerError::Io(std::io::Error::other("disk full"))));

        let mut ledger = FavorabilityLedger::open(Arc::new(store));
        assert!(ledger.apply(3).is_err());
        assert_eq!(ledger.value(), 23);
    }
}
