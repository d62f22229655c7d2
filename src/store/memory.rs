//! In-memory transactional store
//!
//! Transactions are serialized: each holds the store lock from `begin` to
//! `commit` or drop. Writes are staged and only become visible on commit.
//! Version keys come from a single monotonic counter.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};

use super::errors::{StoreError, StoreResult};
use super::{RecordStore, StoreTransaction};
use crate::query::{PredicateFilter, ScopedQuery};
use crate::record::{Identity, VersionKey, VersionedRecord};

type Table = BTreeMap<Identity, VersionedRecord>;

#[derive(Debug, Default)]
struct StoreState {
    tables: HashMap<String, Table>,
    /// Highest version key handed out by a committed transaction
    last_version: u64,
}

/// A transactional store kept entirely in memory
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<StoreState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Committed rows of one entity type, across every tenant and partition
    pub fn rows(&self, entity_type: &str) -> StoreResult<Vec<VersionedRecord>> {
        let state = self.state.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(state
            .tables
            .get(entity_type)
            .map(|t| t.values().cloned().collect())
            .unwrap_or_default())
    }

    /// Committed row count across all entity types
    pub fn len(&self) -> StoreResult<usize> {
        let state = self.state.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(state.tables.values().map(|t| t.len()).sum())
    }

    pub fn is_empty(&self) -> StoreResult<bool> {
        Ok(self.len()? == 0)
    }
}

impl RecordStore for MemoryStore {
    fn begin(&self) -> StoreResult<Box<dyn StoreTransaction + '_>> {
        let guard = self.state.lock().map_err(|_| StoreError::Poisoned)?;
        let next_version = guard.last_version;
        Ok(Box::new(MemoryTransaction {
            guard,
            staged: BTreeMap::new(),
            next_version,
        }))
    }
}

/// Staged write: `None` removes the row
type Staged = BTreeMap<(String, Identity), Option<VersionedRecord>>;

struct MemoryTransaction<'a> {
    guard: MutexGuard<'a, StoreState>,
    staged: Staged,
    next_version: u64,
}

impl MemoryTransaction<'_> {
    fn committed(&self, entity_type: &str, identity: &Identity) -> Option<&VersionedRecord> {
        self.guard.tables.get(entity_type).and_then(|t| t.get(identity))
    }
}

impl StoreTransaction for MemoryTransaction<'_> {
    fn get(&self, entity_type: &str, identity: &str) -> StoreResult<Option<VersionedRecord>> {
        let identity = Identity::new(identity);
        let key = (entity_type.to_string(), identity);
        if let Some(staged) = self.staged.get(&key) {
            return Ok(staged.clone());
        }
        Ok(self.committed(entity_type, &key.1).cloned())
    }

    fn scan(&self, query: &ScopedQuery) -> StoreResult<Vec<VersionedRecord>> {
        let entity_type = query.entity_type();
        let mut rows: Table = self.guard.tables.get(entity_type).cloned().unwrap_or_default();

        for ((staged_type, identity), staged) in &self.staged {
            if staged_type != entity_type {
                continue;
            }
            match staged {
                Some(record) => {
                    rows.insert(identity.clone(), record.clone());
                }
                None => {
                    rows.remove(identity);
                }
            }
        }

        Ok(rows
            .into_values()
            .filter(|r| PredicateFilter::matches(r, query.predicates()))
            .collect())
    }

    fn put(&mut self, record: VersionedRecord) -> StoreResult<VersionKey> {
        self.next_version = self.next_version.checked_add(1).ok_or(StoreError::VersionsExhausted)?;
        let version = VersionKey::new(self.next_version);
        let key = (record.entity_type().to_string(), record.identity().clone());
        self.staged.insert(key, Some(record.into_persisted(version)));
        Ok(version)
    }

    fn remove(&mut self, entity_type: &str, identity: &str) -> StoreResult<bool> {
        let existed = self.get(entity_type, identity)?.is_some();
        if existed {
            self.staged.insert((entity_type.to_string(), Identity::new(identity)), None);
        }
        Ok(existed)
    }

    fn commit(self: Box<Self>) -> StoreResult<()> {
        let MemoryTransaction {
            mut guard,
            staged,
            next_version,
        } = *self;

        for ((entity_type, identity), staged) in staged {
            let table = guard.tables.entry(entity_type).or_default();
            match staged {
                Some(record) => {
                    table.insert(identity, record);
                }
                None => {
                    table.remove(&identity);
                }
            }
        }
        guard.last_version = next_version;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::Predicate;
    use serde_json::json;

    fn record(id: &str, value: serde_json::Value) -> VersionedRecord {
        VersionedRecord::from_json("item", id, value).unwrap()
    }

    fn scan_all(txn: &dyn StoreTransaction) -> Vec<VersionedRecord> {
        txn.scan(&ScopedQuery::new("item".into(), vec![], vec![])).unwrap()
    }

    #[test]
    fn test_put_assigns_distinct_versions() {
        let store = MemoryStore::new();
        let mut txn = store.begin().unwrap();
        let v1 = txn.put(record("a", json!({"n": 1}))).unwrap();
        let v2 = txn.put(record("a", json!({"n": 2}))).unwrap();
        assert_ne!(v1, v2);
        assert_eq!(txn.get("item", "a").unwrap().unwrap().version(), Some(v2));
        txn.commit().unwrap();

        let mut txn = store.begin().unwrap();
        let v3 = txn.put(record("a", json!({"n": 3}))).unwrap();
        assert_ne!(v3, v1);
        assert_ne!(v3, v2);
    }

    #[test]
    fn test_drop_rolls_back() {
        let store = MemoryStore::new();
        {
            let mut txn = store.begin().unwrap();
            txn.put(record("a", json!({}))).unwrap();
        }
        assert!(store.is_empty().unwrap());
        assert!(store.fetch("item", "a").unwrap().is_none());
    }

    #[test]
    fn test_reads_own_writes_and_removes() {
        let store = MemoryStore::new();
        let mut txn = store.begin().unwrap();
        txn.put(record("a", json!({"n": 1}))).unwrap();
        txn.put(record("b", json!({"n": 2}))).unwrap();
        txn.commit().unwrap();

        let mut txn = store.begin().unwrap();
        assert!(txn.remove("item", "a").unwrap());
        assert!(!txn.remove("item", "missing").unwrap());
        txn.put(record("c", json!({"n": 3}))).unwrap();

        let ids: Vec<_> = scan_all(&*txn).iter().map(|r| r.identity().as_str().to_string()).collect();
        assert_eq!(ids, vec!["b", "c"]);
        txn.commit().unwrap();
        assert_eq!(store.len().unwrap(), 2);
    }

    #[test]
    fn test_scan_applies_predicates() {
        let store = MemoryStore::new();
        let mut txn = store.begin().unwrap();
        txn.put(record("a", json!({"n": 1}))).unwrap();
        txn.put(record("b", json!({"n": 5}))).unwrap();
        txn.commit().unwrap();

        let txn = store.begin().unwrap();
        let query = ScopedQuery::new("item".into(), vec![Predicate::gt("n", json!(2))], vec![]);
        let rows = txn.scan(&query).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].identity().as_str(), "b");
    }

    #[test]
    fn test_rows_returns_committed_state() {
        let store = MemoryStore::new();
        let mut txn = store.begin().unwrap();
        txn.put(record("a", json!({}))).unwrap();
        txn.commit().unwrap();
        assert_eq!(store.rows("item").unwrap().len(), 1);
        assert!(store.rows("other").unwrap().is_empty());
    }
}
