//! Immutable model built once from static configuration
//!
//! `Model` is shared as `Arc<Model>` by every unit of work. It holds no
//! interior mutability, so concurrent readers need no synchronization.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use super::errors::{ModelError, ModelResult};
use super::types::{
    AttributeType, CombinePolicy, ConflictPolicy, EntityConfig, LogicDeletionDescriptor,
    ModelConfig, TenantDescriptor,
};
use super::validator::ModelValidator;
use crate::observability::{log_event_with_fields, Event};

/// Outcome of the two-tier policy lookup for one attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyLookup {
    /// The attribute declares its own combine policy
    Attribute(CombinePolicy),
    /// No attribute policy; the entity-level policy applies
    Entity(ConflictPolicy),
}

/// Resolved configuration of one entity type
#[derive(Debug, Clone)]
pub struct EntityModel {
    name: String,
    conflict_policy: ConflictPolicy,
    combine: HashMap<String, CombinePolicy>,
    attribute_types: BTreeMap<String, AttributeType>,
    tenant: Option<TenantDescriptor>,
    logic_deletion: Option<LogicDeletionDescriptor>,
}

impl EntityModel {
    fn from_config(cfg: EntityConfig, combine: HashMap<String, CombinePolicy>) -> Self {
        Self {
            name: cfg.name,
            conflict_policy: cfg.conflict_policy,
            combine,
            attribute_types: cfg.attributes,
            tenant: cfg.tenant,
            logic_deletion: cfg.logic_deletion,
        }
    }

    /// Model for entity types that were never configured
    fn unconfigured() -> Self {
        Self {
            name: String::new(),
            conflict_policy: ConflictPolicy::default(),
            combine: HashMap::new(),
            attribute_types: BTreeMap::new(),
            tenant: None,
            logic_deletion: None,
        }
    }

    /// Entity type name; empty for the unconfigured fallback
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn conflict_policy(&self) -> ConflictPolicy {
        self.conflict_policy
    }

    pub fn combine_policy(&self, attribute: &str) -> Option<CombinePolicy> {
        self.combine.get(attribute).copied()
    }

    pub fn has_combine_policies(&self) -> bool {
        !self.combine.is_empty()
    }

    /// Attribute first, entity-level policy as fallback
    pub fn resolve(&self, attribute: &str) -> PolicyLookup {
        match self.combine_policy(attribute) {
            Some(policy) => PolicyLookup::Attribute(policy),
            None => PolicyLookup::Entity(self.conflict_policy),
        }
    }

    /// Combine policies sorted by attribute name
    pub fn combine_policies(&self) -> Vec<(&str, CombinePolicy)> {
        let mut out: Vec<_> = self.combine.iter().map(|(k, v)| (k.as_str(), *v)).collect();
        out.sort_by_key(|(k, _)| *k);
        out
    }

    pub fn attribute_type(&self, attribute: &str) -> Option<AttributeType> {
        self.attribute_types.get(attribute).copied()
    }

    pub fn tenant(&self) -> Option<&TenantDescriptor> {
        self.tenant.as_ref()
    }

    pub fn logic_deletion(&self) -> Option<&LogicDeletionDescriptor> {
        self.logic_deletion.as_ref()
    }
}

/// The complete, validated model
#[derive(Debug)]
pub struct Model {
    entities: HashMap<String, EntityModel>,
    fallback: EntityModel,
}

impl Model {
    /// Validates `config` and builds the shared model.
    ///
    /// Any malformed entity rejects the whole model.
    pub fn build(config: ModelConfig) -> ModelResult<Arc<Model>> {
        match Self::build_inner(config) {
            Ok(model) => {
                let count = model.entities.len().to_string();
                log_event_with_fields(Event::ModelBuilt, &[("entities", count.as_str())]);
                Ok(Arc::new(model))
            }
            Err(e) => {
                log_event_with_fields(Event::ModelRejected, &[("code", e.code()), ("reason", e.to_string().as_str())]);
                Err(e)
            }
        }
    }

    fn build_inner(config: ModelConfig) -> ModelResult<Model> {
        let mut entities = HashMap::with_capacity(config.entities.len());

        for cfg in config.entities {
            let combine = ModelValidator::validate_entity(&cfg)?;
            if entities.contains_key(&cfg.name) {
                return Err(ModelError::DuplicateEntity(cfg.name));
            }
            let name = cfg.name.clone();
            entities.insert(name, EntityModel::from_config(cfg, combine));
        }

        Ok(Model {
            entities,
            fallback: EntityModel::unconfigured(),
        })
    }

    /// A model with no configured entity types
    pub fn empty() -> Arc<Model> {
        Arc::new(Model {
            entities: HashMap::new(),
            fallback: EntityModel::unconfigured(),
        })
    }

    /// Configuration of `entity_type`.
    ///
    /// Unconfigured types get the defaults: ThrowOnConflict, no combine
    /// policies, no tenant scoping, hard delete only.
    pub fn entity(&self, entity_type: &str) -> &EntityModel {
        self.entities.get(entity_type).unwrap_or(&self.fallback)
    }

    pub fn is_configured(&self, entity_type: &str) -> bool {
        self.entities.contains_key(entity_type)
    }

    /// Configured entity type names, sorted
    pub fn entity_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.entities.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// First tenant-scoped entity type, if any
    pub fn first_tenant_scoped(&self) -> Option<&str> {
        self.entity_names()
            .into_iter()
            .find(|name| self.entity(name).tenant().is_some())
    }
}
