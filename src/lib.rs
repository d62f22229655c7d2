//! commitguard - commit-time policies for an object-persistence layer
//!
//! Optimistic-concurrency conflict resolution with per-attribute merging,
//! tenant isolation, logical deletion and post-commit change notification,
//! applied between a caller's unit of work and a transactional record store.

pub mod cli;
pub mod conflict;
pub mod deletion;
pub mod model;
pub mod notify;
pub mod observability;
pub mod pipeline;
pub mod query;
pub mod record;
pub mod store;
pub mod tenant;
