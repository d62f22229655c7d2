//! # Commit pipeline
//!
//! Unit of work, commit orchestration, scoped queries and bulk
//! logical-deletion operations.

mod errors;
mod session;
mod unit_of_work;

pub use errors::{PipelineError, PipelineResult};
pub use session::{CommitOutcome, Pipeline, PipelineBuilder};
pub use unit_of_work::{EntryState, UnitOfWork};
