//! # Store
//!
//! The narrow transactional capability the pipeline needs from the
//! persistence layer.
//!
//! ## Contract
//! - A transaction reads its own writes
//! - `put` assigns a fresh version key, distinct from every key the
//!   identity carried before
//! - Dropping a transaction without `commit` rolls it back

mod errors;
mod memory;

pub use errors::{StoreError, StoreResult};
pub use memory::MemoryStore;

use crate::query::ScopedQuery;
use crate::record::{VersionKey, VersionedRecord};

/// A transactional record store
pub trait RecordStore: Send + Sync {
    /// Opens a transaction.
    fn begin(&self) -> StoreResult<Box<dyn StoreTransaction + '_>>;

    /// Reads one row in its own short transaction.
    fn fetch(&self, entity_type: &str, identity: &str) -> StoreResult<Option<VersionedRecord>> {
        self.begin()?.get(entity_type, identity)
    }
}

/// One open transaction
pub trait StoreTransaction {
    fn get(&self, entity_type: &str, identity: &str) -> StoreResult<Option<VersionedRecord>>;

    /// Rows of the query's entity type matching every predicate, ordered by identity.
    fn scan(&self, query: &ScopedQuery) -> StoreResult<Vec<VersionedRecord>>;

    /// Writes `record` and returns the version key it was stored under.
    fn put(&mut self, record: VersionedRecord) -> StoreResult<VersionKey>;

    /// Physically removes a row. Returns false if it did not exist.
    fn remove(&mut self, entity_type: &str, identity: &str) -> StoreResult<bool>;

    fn commit(self: Box<Self>) -> StoreResult<()>;
}
