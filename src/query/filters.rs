//! Predicate evaluation against records
//!
//! Exact matching, no type coercion. Missing or null fields never match,
//! not even `Ne`.

use std::cmp::Ordering;

use serde_json::Value;

use super::ast::{FilterOp, Predicate};
use crate::record::{VersionedRecord, IDENTITY_FIELD};

/// Evaluates predicates against records
pub struct PredicateFilter;

impl PredicateFilter {
    /// True if the record matches every predicate
    pub fn matches<'a>(record: &VersionedRecord, predicates: impl IntoIterator<Item = &'a Predicate>) -> bool {
        predicates.into_iter().all(|p| Self::matches_predicate(record, p))
    }

    fn matches_predicate(record: &VersionedRecord, predicate: &Predicate) -> bool {
        let identity;
        let actual = if predicate.field == IDENTITY_FIELD {
            identity = Value::String(record.identity().as_str().to_string());
            &identity
        } else {
            match record.get(&predicate.field) {
                Some(v) if !v.is_null() => v,
                _ => return false,
            }
        };

        match &predicate.op {
            FilterOp::Eq(expected) => actual == expected,
            FilterOp::Ne(expected) => actual != expected,
            FilterOp::In(values) => values.iter().any(|v| v == actual),
            FilterOp::Gte(bound) => matches!(compare(actual, bound), Some(Ordering::Greater | Ordering::Equal)),
            FilterOp::Gt(bound) => matches!(compare(actual, bound), Some(Ordering::Greater)),
            FilterOp::Lte(bound) => matches!(compare(actual, bound), Some(Ordering::Less | Ordering::Equal)),
            FilterOp::Lt(bound) => matches!(compare(actual, bound), Some(Ordering::Less)),
        }
    }
}

/// Orders numbers with numbers and strings with strings; anything else is
/// incomparable.
fn compare(actual: &Value, bound: &Value) -> Option<Ordering> {
    match (actual, bound) {
        (Value::Number(a), Value::Number(b)) => {
            if let (Some(ai), Some(bi)) = (a.as_i64(), b.as_i64()) {
                return Some(ai.cmp(&bi));
            }
            a.as_f64()?.partial_cmp(&b.as_f64()?)
        }
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        _ => None,
    }
}
