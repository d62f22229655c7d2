//! # Conflict Errors
//!
//! Failures raised while resolving a version conflict.

use thiserror::Error;

use crate::record::{Identity, VersionKey};

/// Raised by ThrowOnConflict when the persisted version key differs from
/// the one the caller loaded. The unit of work is rolled back; reload and
/// retry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Version conflict on {entity_type}/{identity}: loaded {}, persisted {}", fmt_key(.loaded), fmt_key(.persisted))]
pub struct ConflictError {
    pub entity_type: String,
    pub identity: Identity,
    /// Version key the caller loaded
    pub loaded: Option<VersionKey>,
    /// Version key found in the store
    pub persisted: Option<VersionKey>,
}

impl ConflictError {
    /// Conflicts are cured by reloading and retrying
    pub fn is_retryable(&self) -> bool {
        true
    }
}

fn fmt_key(key: &Option<VersionKey>) -> String {
    match key {
        Some(k) => k.to_string(),
        None => "none".to_string(),
    }
}

/// Accumulate applied to a non-numeric or missing attribute, or an
/// overflowing result. Fatal to the current save.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid merge on {entity_type}.{attribute}: {reason}")]
pub struct InvalidMergeError {
    pub entity_type: String,
    pub attribute: String,
    pub reason: String,
}

/// Any failure leaving the resolver in the `Failed` state
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    #[error(transparent)]
    Conflict(#[from] ConflictError),

    #[error(transparent)]
    InvalidMerge(#[from] InvalidMergeError),
}
