//! # Conflict handling
//!
//! - `VersionGuard` detects that a record changed since it was loaded
//! - `ConflictResolver` applies the entity-level policy
//! - `AttributeMerger` applies per-attribute combine policies
//!
//! Everything here is pure: the pipeline reads the persisted row inside its
//! transaction and applies whatever `Resolution` comes back.

mod errors;
mod guard;
mod merger;
mod resolver;

pub use errors::{ConflictError, InvalidMergeError, ResolveError};
pub use guard::{VersionCheck, VersionGuard};
pub use merger::{AttributeMerger, MergeOutcome};
pub use resolver::{ConflictResolver, Resolution, ResolutionState};
