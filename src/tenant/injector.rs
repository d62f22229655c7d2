//! # Tenant Filter Injection
//!
//! Stamps the discriminator on attach and scopes every read and write to
//! the current tenant.
//!
//! ## Rules
//! - An unset discriminator (missing, null, `""` or `0`) is overwritten on attach
//! - The global sentinel is never overwritten
//! - Queries see the current tenant plus sentinel rows unless the caller
//!   explicitly asks for another scope
//! - Exactly one wildcard: the configured sentinel
//! - Inserts carry the current tenant or the sentinel; updates never change
//!   the persisted discriminator

use serde_json::Value;
use thiserror::Error;

use crate::model::{TenantDescriptor, TenantId, TenantValueType};
use crate::query::{Predicate, TenantScope};
use crate::record::{Attributes, VersionedRecord};

/// The tenant source handed out a value of the wrong type
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Tenant id {tenant} is {}, but {entity_type} expects {}", .actual.type_name(), .expected.type_name())]
pub struct TenantMismatchError {
    pub entity_type: String,
    pub tenant: TenantId,
    pub expected: TenantValueType,
    pub actual: TenantValueType,
}

/// Applies a `TenantDescriptor` to records and queries
pub struct TenantFilterInjector;

impl TenantFilterInjector {
    /// Converts the current tenant into a discriminator value.
    pub fn discriminator_value(
        entity_type: &str,
        descriptor: &TenantDescriptor,
        tenant: &TenantId,
    ) -> Result<Value, TenantMismatchError> {
        if tenant.value_type() != descriptor.value_type {
            return Err(TenantMismatchError {
                entity_type: entity_type.to_string(),
                tenant: tenant.clone(),
                expected: descriptor.value_type,
                actual: tenant.value_type(),
            });
        }
        Ok(tenant.to_value())
    }

    /// True if attaching `record` would stamp its discriminator.
    pub fn needs_stamp(descriptor: &TenantDescriptor, record: &VersionedRecord) -> bool {
        let current = record.get(&descriptor.attribute);
        if let Some(value) = current {
            if descriptor.is_global(value) {
                return false;
            }
        }
        descriptor.is_unset(current)
    }

    /// Writes `tenant` into an unset discriminator. Returns true if the
    /// record changed.
    pub fn stamp(descriptor: &TenantDescriptor, record: &mut VersionedRecord, tenant: Value) -> bool {
        if !Self::needs_stamp(descriptor, record) {
            return false;
        }
        record.set(descriptor.attribute.clone(), tenant);
        true
    }

    /// The implicit predicate for a query in `scope`.
    ///
    /// `current` is only invoked for `TenantScope::Current`, so `Global`
    /// and `Unrestricted` queries never consult the tenant source.
    pub fn query_predicate<E>(
        descriptor: &TenantDescriptor,
        scope: TenantScope,
        current: impl FnOnce() -> Result<Value, E>,
    ) -> Result<Option<Predicate>, E> {
        let attribute = descriptor.attribute.clone();
        let predicate = match scope {
            TenantScope::Unrestricted => return Ok(None),
            TenantScope::Current => {
                let tenant = current()?;
                match &descriptor.global_sentinel {
                    Some(sentinel) => Predicate::one_of(attribute, vec![tenant, sentinel.clone()]),
                    None => Predicate::eq(attribute, tenant),
                }
            }
            // Without a sentinel there is no global partition; nothing matches
            TenantScope::Global => match &descriptor.global_sentinel {
                Some(sentinel) => Predicate::eq(attribute, sentinel.clone()),
                None => Predicate::one_of(attribute, Vec::new()),
            },
        };
        Ok(Some(predicate))
    }

    /// True if a new row carrying `written` may be inserted under `tenant`.
    pub fn insertable(descriptor: &TenantDescriptor, written: Option<&Value>, tenant: &Value) -> bool {
        match written {
            Some(value) => value == tenant || descriptor.is_global(value),
            None => false,
        }
    }

    /// True if writing `attributes` over `persisted` keeps its discriminator.
    pub fn keeps_discriminator(
        descriptor: &TenantDescriptor,
        persisted: &VersionedRecord,
        attributes: &Attributes,
    ) -> bool {
        attributes.get(&descriptor.attribute) == persisted.get(&descriptor.attribute)
    }

    /// True if `record` is visible to `tenant` (its own rows plus sentinel rows).
    pub fn is_visible(descriptor: &TenantDescriptor, record: &VersionedRecord, tenant: &Value) -> bool {
        match record.get(&descriptor.attribute) {
            Some(value) => value == tenant || descriptor.is_global(value),
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::{FilterOp, PredicateFilter};
    use serde_json::json;
    use std::convert::Infallible;

    fn descriptor() -> TenantDescriptor {
        TenantDescriptor::new("tenant_id", TenantValueType::String).with_global_sentinel(json!("*"))
    }

    fn record(value: Value) -> VersionedRecord {
        VersionedRecord::from_json("order", "o1", value).unwrap()
    }

    #[test]
    fn test_stamp_missing_null_and_placeholder() {
        let d = descriptor();
        for value in [json!({}), json!({"tenant_id": null}), json!({"tenant_id": ""})] {
            let mut r = record(value);
            assert!(TenantFilterInjector::stamp(&d, &mut r, json!("acme")));
            assert_eq!(r.get("tenant_id"), Some(&json!("acme")));
        }
    }

    #[test]
    fn test_stamp_int_placeholder() {
        let d = TenantDescriptor::new("tenant_id", TenantValueType::Int);
        let mut r = record(json!({"tenant_id": 0}));
        assert!(TenantFilterInjector::stamp(&d, &mut r, json!(42)));
        assert_eq!(r.get("tenant_id"), Some(&json!(42)));
    }

    #[test]
    fn test_stamp_leaves_sentinel_and_explicit_values() {
        let d = descriptor();
        let mut global = record(json!({"tenant_id": "*"}));
        assert!(!TenantFilterInjector::stamp(&d, &mut global, json!("acme")));
        assert_eq!(global.get("tenant_id"), Some(&json!("*")));

        let mut explicit = record(json!({"tenant_id": "other"}));
        assert!(!TenantFilterInjector::stamp(&d, &mut explicit, json!("acme")));
        assert_eq!(explicit.get("tenant_id"), Some(&json!("other")));
    }

    #[test]
    fn test_discriminator_value_type_mismatch() {
        let d = descriptor();
        let err = TenantFilterInjector::discriminator_value("order", &d, &TenantId::Integer(3)).unwrap_err();
        assert_eq!(err.expected, TenantValueType::String);
        assert_eq!(err.actual, TenantValueType::Int);
        assert_eq!(err.to_string(), "Tenant id 3 is int, but order expects string");
    }

    #[test]
    fn test_current_scope_includes_sentinel() {
        let d = descriptor();
        let pred = TenantFilterInjector::query_predicate(&d, TenantScope::Current, || {
            Ok::<_, Infallible>(json!("acme"))
        })
        .unwrap()
        .unwrap();
        assert_eq!(pred.op, FilterOp::In(vec![json!("acme"), json!("*")]));

        assert!(PredicateFilter::matches(&record(json!({"tenant_id": "acme"})), [&pred]));
        assert!(PredicateFilter::matches(&record(json!({"tenant_id": "*"})), [&pred]));
        assert!(!PredicateFilter::matches(&record(json!({"tenant_id": "other"})), [&pred]));
    }

    #[test]
    fn test_current_scope_without_sentinel() {
        let d = TenantDescriptor::new("tenant_id", TenantValueType::String);
        let pred = TenantFilterInjector::query_predicate(&d, TenantScope::Current, || {
            Ok::<_, Infallible>(json!("acme"))
        })
        .unwrap()
        .unwrap();
        assert_eq!(pred, Predicate::eq("tenant_id", json!("acme")));
    }

    #[test]
    fn test_global_scope_skips_tenant_source() {
        let d = descriptor();
        let pred = TenantFilterInjector::query_predicate(&d, TenantScope::Global, || -> Result<Value, Infallible> {
            panic!("tenant source consulted for a global query")
        })
        .unwrap();
        assert_eq!(pred, Some(Predicate::eq("tenant_id", json!("*"))));
    }

    #[test]
    fn test_unrestricted_scope_has_no_predicate() {
        let d = descriptor();
        let pred = TenantFilterInjector::query_predicate(&d, TenantScope::Unrestricted, || {
            Ok::<_, Infallible>(json!("acme"))
        })
        .unwrap();
        assert!(pred.is_none());
    }

    #[test]
    fn test_insertable() {
        let d = descriptor();
        let tenant = json!("acme");
        assert!(TenantFilterInjector::insertable(&d, Some(&json!("acme")), &tenant));
        assert!(TenantFilterInjector::insertable(&d, Some(&json!("*")), &tenant));
        assert!(!TenantFilterInjector::insertable(&d, Some(&json!("other")), &tenant));
        assert!(!TenantFilterInjector::insertable(&d, None, &tenant));
    }

    #[test]
    fn test_keeps_discriminator() {
        let d = descriptor();
        let persisted = record(json!({"tenant_id": "*", "total": 1}));
        let same = json!({"tenant_id": "*", "total": 2});
        let moved = json!({"tenant_id": "acme", "total": 1});
        assert!(TenantFilterInjector::keeps_discriminator(&d, &persisted, same.as_object().unwrap()));
        assert!(!TenantFilterInjector::keeps_discriminator(&d, &persisted, moved.as_object().unwrap()));
        assert!(!TenantFilterInjector::keeps_discriminator(&d, &persisted, &Attributes::new()));
    }

    #[test]
    fn test_visibility() {
        let d = descriptor();
        let tenant = json!("acme");
        assert!(TenantFilterInjector::is_visible(&d, &record(json!({"tenant_id": "acme"})), &tenant));
        assert!(TenantFilterInjector::is_visible(&d, &record(json!({"tenant_id": "*"})), &tenant));
        assert!(!TenantFilterInjector::is_visible(&d, &record(json!({"tenant_id": "b"})), &tenant));
        assert!(!TenantFilterInjector::is_visible(&d, &record(json!({})), &tenant));
    }
}
