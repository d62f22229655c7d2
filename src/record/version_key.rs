//! VersionKey - opaque per-record version token
//!
//! - Assigned only by the store, on accepted writes
//! - Compared for equality only; callers must not rely on ordering
//! - Strictly advances on every accepted write to the same identity

use std::fmt;

use serde::{Deserialize, Serialize};

/// An opaque version token.
///
/// Deliberately implements neither `Ord` nor `Default`: detection is
/// equality based, and a key that was never assigned by a store is
/// represented as `Option::None` on the record instead.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VersionKey(u64);

impl VersionKey {
    /// Creates a version key from its raw token.
    ///
    /// Store implementations use this when assigning keys; application code
    /// should only ever copy keys it received from a store.
    #[inline]
    pub fn new(token: u64) -> Self {
        Self(token)
    }

    /// Returns the raw token, for persistence and diagnostics.
    #[inline]
    pub fn token(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for VersionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}
