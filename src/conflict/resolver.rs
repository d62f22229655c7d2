//! ConflictResolver - decides what a conflicting write turns into
//!
//! States: Detected -> Resolving -> Resolved | Failed
//!
//! Entity types without combine policies are resolved whole by their
//! `ConflictPolicy`. Entity types with combine policies go through the
//! `AttributeMerger` first; the entity policy then only decides the
//! residual attributes the caller changed. In both tiers the tenant
//! discriminator and the deletion flag keep their persisted value unless
//! the caller changed them.

use std::fmt;

use super::errors::{ConflictError, ResolveError};
use super::merger::AttributeMerger;
use crate::model::{ConflictPolicy, EntityModel};
use crate::observability::Logger;
use crate::record::{Attributes, VersionedRecord};

/// Resolver lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionState {
    Detected,
    Resolving,
    Resolved,
    Failed,
}

impl ResolutionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResolutionState::Detected => "detected",
            ResolutionState::Resolving => "resolving",
            ResolutionState::Resolved => "resolved",
            ResolutionState::Failed => "failed",
        }
    }
}

impl fmt::Display for ResolutionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// What a resolved conflict turns into
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    /// Write these attribute values on top of the persisted row
    Write {
        attributes: Attributes,
        /// Attributes changed by combine policies
        merged_attributes: Vec<String>,
    },
    /// Keep the persisted state; the working copy is left as it is
    Discard,
    /// Replace the working copy with this persisted snapshot; nothing is written
    Reconstruct(VersionedRecord),
    /// Remove the persisted row
    Remove,
}

/// Resolves one detected conflict
#[derive(Debug)]
pub struct ConflictResolver<'a> {
    entity: &'a EntityModel,
    state: ResolutionState,
}

impl<'a> ConflictResolver<'a> {
    /// A resolver for a conflict just reported by the version guard
    pub fn detected(entity: &'a EntityModel) -> Self {
        Self {
            entity,
            state: ResolutionState::Detected,
        }
    }

    pub fn state(&self) -> ResolutionState {
        self.state
    }

    /// The entity-level policy in effect
    pub fn policy(&self) -> ConflictPolicy {
        self.entity.conflict_policy()
    }

    /// Resolves a stale update of `working`, loaded as `original`.
    pub fn resolve_update(
        &mut self,
        working: &VersionedRecord,
        original: &Attributes,
        persisted: &VersionedRecord,
    ) -> Result<Resolution, ResolveError> {
        self.transition(ResolutionState::Resolving);
        let result = self.decide_update(working, original, persisted);
        self.finish(&result);
        result
    }

    /// Resolves a tracked removal whose version key is stale.
    pub fn resolve_removal(
        &mut self,
        working: &VersionedRecord,
        persisted: &VersionedRecord,
    ) -> Result<Resolution, ResolveError> {
        self.transition(ResolutionState::Resolving);
        let result = match self.policy() {
            ConflictPolicy::Ignore => Ok(Resolution::Discard),
            ConflictPolicy::ThrowOnConflict => Err(conflict(working, persisted).into()),
            ConflictPolicy::Overwrite => Ok(Resolution::Remove),
            ConflictPolicy::Reconstruct => Ok(Resolution::Reconstruct(persisted.clone())),
        };
        self.finish(&result);
        result
    }

    fn decide_update(
        &self,
        working: &VersionedRecord,
        original: &Attributes,
        persisted: &VersionedRecord,
    ) -> Result<Resolution, ResolveError> {
        if !self.entity.has_combine_policies() {
            return Ok(match self.policy() {
                ConflictPolicy::Ignore => Resolution::Discard,
                ConflictPolicy::ThrowOnConflict => return Err(conflict(working, persisted).into()),
                ConflictPolicy::Overwrite => Resolution::Write {
                    attributes: self.overwrite(working, original, persisted),
                    merged_attributes: Vec::new(),
                },
                ConflictPolicy::Reconstruct => Resolution::Reconstruct(persisted.clone()),
            });
        }

        let outcome = AttributeMerger::merge(self.entity, original, working.attributes(), persisted.attributes())?;
        let mut attributes = outcome.merged;

        if !outcome.residual_changes.is_empty() {
            match self.policy() {
                // Residual attributes already carry the persisted value
                ConflictPolicy::Ignore => {}
                ConflictPolicy::ThrowOnConflict => return Err(conflict(working, persisted).into()),
                ConflictPolicy::Overwrite => {
                    for attribute in &outcome.residual_changes {
                        match working.get(attribute) {
                            Some(value) => {
                                attributes.insert(attribute.clone(), value.clone());
                            }
                            None => {
                                attributes.remove(attribute);
                            }
                        }
                    }
                }
                ConflictPolicy::Reconstruct => return Ok(Resolution::Reconstruct(persisted.clone())),
            }
        }

        Ok(Resolution::Write {
            attributes,
            merged_attributes: outcome.merged_attributes,
        })
    }

    /// The working copy, with untouched reserved attributes taken from `persisted`
    fn overwrite(&self, working: &VersionedRecord, original: &Attributes, persisted: &VersionedRecord) -> Attributes {
        let mut attributes = working.attributes().clone();
        let reserved = [
            self.entity.tenant().map(|d| &d.attribute),
            self.entity.logic_deletion().map(|d| &d.attribute),
        ];
        for attribute in reserved.into_iter().flatten() {
            if working.get(attribute) != original.get(attribute) {
                continue;
            }
            match persisted.get(attribute) {
                Some(value) => {
                    attributes.insert(attribute.clone(), value.clone());
                }
                None => {
                    attributes.remove(attribute);
                }
            }
        }
        attributes
    }

    fn finish<T>(&mut self, result: &Result<T, ResolveError>) {
        match result {
            Ok(_) => self.transition(ResolutionState::Resolved),
            Err(_) => self.transition(ResolutionState::Failed),
        }
    }

    fn transition(&mut self, next: ResolutionState) {
        Logger::trace(
            "CONFLICT_STATE",
            &[
                ("entity", self.entity.name()),
                ("from", self.state.as_str()),
                ("to", next.as_str()),
            ],
        );
        self.state = next;
    }
}

fn conflict(working: &VersionedRecord, persisted: &VersionedRecord) -> ConflictError {
    ConflictError {
        entity_type: working.entity_type().to_string(),
        identity: working.identity().clone(),
        loaded: working.version(),
        persisted: persisted.version(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{CombinePolicy, EntityConfig, LogicDeletionDescriptor, Model, ModelConfig};
    use crate::record::VersionKey;
    use serde_json::{json, Value};
    use std::sync::Arc;

    fn model(policy: ConflictPolicy, with_merge: bool) -> Arc<Model> {
        let mut entity = EntityConfig::new("account").conflict_policy(policy);
        if with_merge {
            entity = entity.combine("balance", CombinePolicy::Accumulate);
        }
        Model::build(ModelConfig::new().entity(entity)).unwrap()
    }

    fn record(value: Value, version: u64) -> VersionedRecord {
        VersionedRecord::from_json("account", "a1", value)
            .unwrap()
            .into_persisted(VersionKey::new(version))
    }

    fn attrs(value: Value) -> Attributes {
        value.as_object().unwrap().clone()
    }

    #[test]
    fn test_throw_fails_and_reports_versions() {
        let model = model(ConflictPolicy::ThrowOnConflict, false);
        let mut resolver = ConflictResolver::detected(model.entity("account"));
        assert_eq!(resolver.state(), ResolutionState::Detected);

        let working = record(json!({"owner": "b"}), 1);
        let persisted = record(json!({"owner": "c"}), 2);
        let err = resolver
            .resolve_update(&working, &attrs(json!({"owner": "a"})), &persisted)
            .unwrap_err();

        assert_eq!(resolver.state(), ResolutionState::Failed);
        match err {
            ResolveError::Conflict(c) => {
                assert_eq!(c.loaded, Some(VersionKey::new(1)));
                assert_eq!(c.persisted, Some(VersionKey::new(2)));
            }
            other => panic!("expected conflict, got {:?}", other),
        }
    }

    #[test]
    fn test_ignore_discards() {
        let model = model(ConflictPolicy::Ignore, false);
        let mut resolver = ConflictResolver::detected(model.entity("account"));
        let working = record(json!({"owner": "b"}), 1);
        let persisted = record(json!({"owner": "c"}), 2);

        let resolution = resolver
            .resolve_update(&working, &attrs(json!({"owner": "a"})), &persisted)
            .unwrap();
        assert_eq!(resolution, Resolution::Discard);
        assert_eq!(resolver.state(), ResolutionState::Resolved);
    }

    #[test]
    fn test_overwrite_writes_incoming() {
        let model = model(ConflictPolicy::Overwrite, false);
        let mut resolver = ConflictResolver::detected(model.entity("account"));
        let working = record(json!({"owner": "b"}), 1);
        let persisted = record(json!({"owner": "c", "extra": 1}), 2);

        match resolver
            .resolve_update(&working, &attrs(json!({"owner": "a"})), &persisted)
            .unwrap()
        {
            Resolution::Write { attributes, .. } => assert_eq!(attributes, attrs(json!({"owner": "b"}))),
            other => panic!("expected write, got {:?}", other),
        }
    }

    #[test]
    fn test_overwrite_keeps_persisted_deletion_flag() {
        let model = Model::build(ModelConfig::new().entity(
            EntityConfig::new("account")
                .conflict_policy(ConflictPolicy::Overwrite)
                .logic_deletion(LogicDeletionDescriptor::boolean("is_deleted")),
        ))
        .unwrap();
        let mut resolver = ConflictResolver::detected(model.entity("account"));
        let original = attrs(json!({"owner": "a", "is_deleted": false}));
        let persisted = record(json!({"owner": "a", "is_deleted": true}), 2);

        let untouched = record(json!({"owner": "b", "is_deleted": false}), 1);
        match resolver.resolve_update(&untouched, &original, &persisted).unwrap() {
            Resolution::Write { attributes, .. } => {
                assert_eq!(attributes, attrs(json!({"owner": "b", "is_deleted": true})))
            }
            other => panic!("expected write, got {:?}", other),
        }

        // A flag the caller set explicitly still wins
        let mut resolver = ConflictResolver::detected(model.entity("account"));
        let persisted = record(json!({"owner": "a", "is_deleted": false}), 2);
        let flagged = record(json!({"owner": "a", "is_deleted": true}), 1);
        match resolver.resolve_update(&flagged, &original, &persisted).unwrap() {
            Resolution::Write { attributes, .. } => assert_eq!(attributes.get("is_deleted"), Some(&json!(true))),
            other => panic!("expected write, got {:?}", other),
        }
    }

    #[test]
    fn test_reconstruct_returns_snapshot() {
        let model = model(ConflictPolicy::Reconstruct, false);
        let mut resolver = ConflictResolver::detected(model.entity("account"));
        let working = record(json!({"owner": "b"}), 1);
        let persisted = record(json!({"owner": "c"}), 2);

        let resolution = resolver
            .resolve_update(&working, &attrs(json!({"owner": "a"})), &persisted)
            .unwrap();
        assert_eq!(resolution, Resolution::Reconstruct(persisted));
    }

    #[test]
    fn test_merge_only_changes_bypass_throw() {
        let model = model(ConflictPolicy::ThrowOnConflict, true);
        let mut resolver = ConflictResolver::detected(model.entity("account"));
        let working = record(json!({"balance": 7, "owner": "x"}), 1);
        let persisted = record(json!({"balance": 8, "owner": "y"}), 2);

        let resolution = resolver
            .resolve_update(&working, &attrs(json!({"balance": 5, "owner": "x"})), &persisted)
            .unwrap();
        assert_eq!(
            resolution,
            Resolution::Write {
                attributes: attrs(json!({"balance": 10, "owner": "y"})),
                merged_attributes: vec!["balance".to_string()],
            }
        );
    }

    #[test]
    fn test_residual_change_falls_through_to_throw() {
        let model = model(ConflictPolicy::ThrowOnConflict, true);
        let mut resolver = ConflictResolver::detected(model.entity("account"));
        let working = record(json!({"balance": 7, "owner": "z"}), 1);
        let persisted = record(json!({"balance": 8, "owner": "y"}), 2);

        let err = resolver
            .resolve_update(&working, &attrs(json!({"balance": 5, "owner": "x"})), &persisted)
            .unwrap_err();
        assert!(matches!(err, ResolveError::Conflict(_)));
    }

    #[test]
    fn test_residual_change_overwrite_keeps_merge() {
        let model = model(ConflictPolicy::Overwrite, true);
        let mut resolver = ConflictResolver::detected(model.entity("account"));
        let working = record(json!({"balance": 7, "owner": "z"}), 1);
        let persisted = record(json!({"balance": 8, "owner": "y"}), 2);

        match resolver
            .resolve_update(&working, &attrs(json!({"balance": 5, "owner": "x"})), &persisted)
            .unwrap()
        {
            Resolution::Write { attributes, .. } => {
                assert_eq!(attributes, attrs(json!({"balance": 10, "owner": "z"})))
            }
            other => panic!("expected write, got {:?}", other),
        }
    }

    #[test]
    fn test_invalid_merge_fails_resolver() {
        let model = model(ConflictPolicy::Overwrite, true);
        let mut resolver = ConflictResolver::detected(model.entity("account"));
        let working = record(json!({"balance": "seven"}), 1);
        let persisted = record(json!({"balance": 8}), 2);

        let err = resolver
            .resolve_update(&working, &attrs(json!({"balance": 5})), &persisted)
            .unwrap_err();
        assert!(matches!(err, ResolveError::InvalidMerge(_)));
        assert_eq!(resolver.state(), ResolutionState::Failed);
    }

    #[test]
    fn test_removal_policies() {
        let working = record(json!({}), 1);
        let persisted = record(json!({}), 2);
        let cases = [
            (ConflictPolicy::Ignore, Some(Resolution::Discard)),
            (ConflictPolicy::Overwrite, Some(Resolution::Remove)),
            (ConflictPolicy::Reconstruct, Some(Resolution::Reconstruct(persisted.clone()))),
            (ConflictPolicy::ThrowOnConflict, None),
        ];
        for (policy, expected) in cases {
            let model = model(policy, false);
            let mut resolver = ConflictResolver::detected(model.entity("account"));
            let result = resolver.resolve_removal(&working, &persisted);
            assert_eq!(result.ok(), expected, "policy {}", policy);
        }
    }
}
