//! StateStore: redb-backed persistence for scale records.
//!
//! Records are JSON-serialized into redb's `&[u8]` value column. The store
//! supports on-disk and in-memory backends (the latter for tests and
//! simulations).

use std::path::Path;
use std::sync::Arc;

use redb::{Database, ReadableDatabase, ReadableTable};
use tracing::debug;

use crate::error::{StateError, StateResult};
use crate::tables::SCALE_RECORDS;
use crate::types::ScaleRecord;

/// Convert any `Display` error into a `StateError` variant.
macro_rules! map_err {
    ($variant:ident) => {
        |e| StateError::$variant(e.to_string())
    };
}

/// Thread-safe scale record store.
#[derive(Clone)]
pub struct StateStore {
    db: Arc<Database>,
}

impl StateStore {
    /// Open (or create) a persistent store at `path`.
    pub fn open(path: &Path) -> StateResult<Self> {
        let db = Database::create(path).map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!(?path, "state store opened");
        Ok(store)
    }

    /// Ephemeral in-memory store.
    pub fn open_in_memory() -> StateResult<Self> {
        let backend = redb::backends::InMemoryBackend::new();
        let db = Database::builder()
            .create_with_backend(backend)
            .map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!("in-memory state store opened");
        Ok(store)
    }

    fn ensure_tables(&self) -> StateResult<()> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        txn.open_table(SCALE_RECORDS).map_err(map_err!(Storage))?;
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(())
    }

    /// Fetch the record stored under a `{namespace}/{name}` key.
    pub fn get_record(&self, key: &str) -> StateResult<Option<ScaleRecord>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(SCALE_RECORDS).map_err(map_err!(Storage))?;
        match table.get(key).map_err(map_err!(Storage))? {
            Some(guard) => Ok(Some(decode(guard.value())?)),
            None => Ok(None),
        }
    }

    /// Store `record` if the stored version still equals `expected`.
    ///
    /// `expected = None` means the record must not exist yet. On success the
    /// stored copy, with its bumped version, is returned.
    pub fn compare_and_swap(
        &self,
        record: &ScaleRecord,
        expected: Option<u64>,
    ) -> StateResult<ScaleRecord> {
        let key = record.table_key();
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let stored = {
            let mut table = txn.open_table(SCALE_RECORDS).map_err(map_err!(Storage))?;
            let found = match table.get(key.as_str()).map_err(map_err!(Storage))? {
                Some(guard) => Some(decode(guard.value())?.version),
                None => None,
            };
            if found != expected {
                return Err(StateError::Conflict {
                    key,
                    expected,
                    found,
                });
            }

            let stored = ScaleRecord {
                version: expected.unwrap_or(0) + 1,
                ..record.clone()
            };
            let value = serde_json::to_vec(&stored).map_err(map_err!(Encode))?;
            table
                .insert(key.as_str(), value.as_slice())
                .map_err(map_err!(Storage))?;
            stored
        };
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(%key, version = stored.version, "scale record stored");
        Ok(stored)
    }

    /// All records, ordered by key.
    pub fn list_records(&self) -> StateResult<Vec<ScaleRecord>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(SCALE_RECORDS).map_err(map_err!(Storage))?;
        let mut results = Vec::new();
        for entry in table.iter().map_err(map_err!(Storage))? {
            let (_, value) = entry.map_err(map_err!(Storage))?;
            results.push(decode(value.value())?);
        }
        Ok(results)
    }

    /// Delete a record. Returns true if it existed.
    pub fn delete_record(&self, key: &str) -> StateResult<bool> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let existed = {
            let mut table = txn.open_table(SCALE_RECORDS).map_err(map_err!(Storage))?;
            table.remove(key).map_err(map_err!(Storage))?.is_some()
        };
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(existed)
    }
}

fn decode(bytes: &[u8]) -> StateResult<ScaleRecord> {
    serde_json::from_slice(bytes).map_err(map_err!(Decode))
}

#[cfg(test)]
mod tests {
    use super::*;
    use stepscale_core::WorkloadKey;

    fn record(name: &str, at: u64) -> ScaleRecord {
        ScaleRecord {
            last_decision_at: Some(at),
            current_replicas: Some(4),
            desired_replicas: Some(6),
            updated_at: at,
            ..ScaleRecord::new(WorkloadKey::new("default", name))
        }
    }

    #[test]
    fn missing_record_is_none() {
        let store = StateStore::open_in_memory().unwrap();
        assert!(store.get_record("default/api").unwrap().is_none());
    }

    #[test]
    fn first_write_requires_absent_record() {
        let store = StateStore::open_in_memory().unwrap();
        let stored = store.compare_and_swap(&record("api", 10), None).unwrap();
        assert_eq!(stored.version, 1);

        let fetched = store.get_record("default/api").unwrap().unwrap();
        assert_eq!(fetched, stored);
        assert_eq!(fetched.engine_state().last_decision_at, Some(10));

        // A second "create" loses.
        let err = store.compare_and_swap(&record("api", 20), None).unwrap_err();
        assert!(err.is_conflict());
    }

    #[test]
    fn update_bumps_version() {
        let store = StateStore::open_in_memory().unwrap();
        let v1 = store.compare_and_swap(&record("api", 10), None).unwrap();
        let v2 = store
            .compare_and_swap(&record("api", 20), v1.expected_version())
            .unwrap();
        assert_eq!(v2.version, 2);
        assert_eq!(v2.last_decision_at, Some(20));
    }

    #[test]
    fn stale_writer_gets_conflict() {
        let store = StateStore::open_in_memory().unwrap();
        let v1 = store.compare_and_swap(&record("api", 10), None).unwrap();

        // Two writers read v1; the first wins.
        store
            .compare_and_swap(&record("api", 20), v1.expected_version())
            .unwrap();
        let err = store
            .compare_and_swap(&record("api", 30), v1.expected_version())
            .unwrap_err();
        match err {
            StateError::Conflict {
                expected, found, ..
            } => {
                assert_eq!(expected, Some(1));
                assert_eq!(found, Some(2));
            }
            other => panic!("expected conflict, got {other:?}"),
        }

        // The losing write left nothing behind.
        let stored = store.get_record("default/api").unwrap().unwrap();
        assert_eq!(stored.last_decision_at, Some(20));
    }

    #[test]
    fn list_and_delete() {
        let store = StateStore::open_in_memory().unwrap();
        store.compare_and_swap(&record("b", 1), None).unwrap();
        store.compare_and_swap(&record("a", 2), None).unwrap();

        let keys: Vec<String> = store
            .list_records()
            .unwrap()
            .iter()
            .map(|r| r.table_key())
            .collect();
        assert_eq!(keys, vec!["default/a", "default/b"]);

        assert!(store.delete_record("default/a").unwrap());
        assert!(!store.delete_record("default/a").unwrap());
        assert_eq!(store.list_records().unwrap().len(), 1);
    }

    #[test]
    fn records_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.redb");
        {
            let store = StateStore::open(&path).unwrap();
            store.compare_and_swap(&record("api", 77), None).unwrap();
        }
        let store = StateStore::open(&path).unwrap();
        let fetched = store.get_record("default/api").unwrap().unwrap();
        assert_eq!(fetched.last_decision_at, Some(77));
        assert_eq!(fetched.version, 1);
    }
}
