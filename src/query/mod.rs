//! Query AST and predicate evaluation
//!
//! Translation to SQL is out of scope; the store evaluates predicates
//! directly against records.

mod ast;
mod filters;

pub use ast::{DeletionPartition, FilterOp, Predicate, Query, ScopedQuery, TenantScope};
pub use filters::PredicateFilter;
