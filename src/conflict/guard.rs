//! VersionGuard - has the record changed since it was loaded?
//!
//! Pure and total. Version keys are compared for equality only.

use crate::record::{VersionKey, VersionedRecord};

/// Result of a version check
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum VersionCheck<'a> {
    /// Persisted version key equals the loaded one
    NoConflict,
    /// Someone else committed since the record was loaded
    Conflict {
        /// The persisted snapshot, read in the writing transaction
        persisted: &'a VersionedRecord,
    },
    /// The persisted row is gone (or invisible to the current tenant)
    Vanished,
}

impl VersionCheck<'_> {
    pub fn is_conflict(&self) -> bool {
        matches!(self, VersionCheck::Conflict { .. })
    }
}

/// Detects write conflicts
pub struct VersionGuard;

impl VersionGuard {
    /// Compares the version key the caller loaded against the persisted row.
    ///
    /// `persisted` must come from the same transaction as the write.
    pub fn check<'a>(loaded: Option<VersionKey>, persisted: Option<&'a VersionedRecord>) -> VersionCheck<'a> {
        match persisted {
            None => VersionCheck::Vanished,
            Some(row) if row.version() == loaded => VersionCheck::NoConflict,
            Some(row) => VersionCheck::Conflict { persisted: row },
        }
    }
}
