//! Build-time validation of entity configuration
//!
//! Every check here runs once, before any unit of work exists. A model that
//! passes validation cannot make the tenant injector or the deletion marker
//! fail at runtime.

use std::collections::HashMap;

use serde_json::Value;

use super::errors::{ModelError, ModelResult};
use super::types::{CombinePolicy, EntityConfig, LogicDeletionDescriptor, TenantDescriptor};

/// Validates one entity configuration and returns its combine policy map
pub(crate) struct ModelValidator;

impl ModelValidator {
    pub(crate) fn validate_entity(cfg: &EntityConfig) -> ModelResult<HashMap<String, CombinePolicy>> {
        if cfg.name.trim().is_empty() {
            return Err(ModelError::EmptyName("entity type".to_string()));
        }

        for name in cfg.attributes.keys() {
            if name.trim().is_empty() {
                return Err(ModelError::EmptyName(format!("attribute declaration of {}", cfg.name)));
            }
        }

        let combine = Self::collect_combine_policies(cfg)?;

        if let Some(tenant) = &cfg.tenant {
            Self::validate_tenant(cfg, tenant, &combine)?;
        }

        if let Some(deletion) = &cfg.logic_deletion {
            Self::validate_deletion(cfg, deletion, &combine)?;
        }

        Ok(combine)
    }

    fn collect_combine_policies(cfg: &EntityConfig) -> ModelResult<HashMap<String, CombinePolicy>> {
        let mut combine: HashMap<String, CombinePolicy> = HashMap::new();

        for decl in &cfg.combine_policies {
            if decl.attribute.trim().is_empty() {
                return Err(ModelError::EmptyName(format!("combine policy of {}", cfg.name)));
            }

            // Repeating the same policy is harmless; two different ones are not.
            if let Some(existing) = combine.get(&decl.attribute) {
                if *existing != decl.policy {
                    return Err(ModelError::ConflictingCombinePolicies {
                        entity: cfg.name.clone(),
                        attribute: decl.attribute.clone(),
                        first: existing.to_string(),
                        second: decl.policy.to_string(),
                    });
                }
                continue;
            }

            if decl.policy == CombinePolicy::Accumulate {
                if let Some(declared) = cfg.attributes.get(&decl.attribute) {
                    if !declared.is_numeric() {
                        return Err(ModelError::NonNumericAccumulate {
                            entity: cfg.name.clone(),
                            attribute: decl.attribute.clone(),
                            declared: declared.type_name().to_string(),
                        });
                    }
                }
            }

            combine.insert(decl.attribute.clone(), decl.policy);
        }

        Ok(combine)
    }

    fn validate_tenant(
        cfg: &EntityConfig,
        tenant: &TenantDescriptor,
        combine: &HashMap<String, CombinePolicy>,
    ) -> ModelResult<()> {
        if tenant.attribute.trim().is_empty() {
            return Err(ModelError::EmptyName(format!("tenant discriminator of {}", cfg.name)));
        }

        let expected = tenant.value_type.attribute_type();
        if let Some(declared) = cfg.attributes.get(&tenant.attribute) {
            if *declared != expected {
                return Err(ModelError::DiscriminatorType {
                    entity: cfg.name.clone(),
                    attribute: tenant.attribute.clone(),
                    expected: expected.type_name().to_string(),
                    declared: declared.type_name().to_string(),
                });
            }
        }

        if let Some(sentinel) = &tenant.global_sentinel {
            if !tenant.value_type.accepts(sentinel) {
                return Err(ModelError::InvalidTenantDescriptor {
                    entity: cfg.name.clone(),
                    reason: format!(
                        "global sentinel {} is not a {} value",
                        sentinel,
                        tenant.value_type.type_name()
                    ),
                });
            }
            // A placeholder sentinel would be overwritten on attach
            if *sentinel == tenant.value_type.placeholder() {
                return Err(ModelError::InvalidTenantDescriptor {
                    entity: cfg.name.clone(),
                    reason: "global sentinel must differ from the unset placeholder".to_string(),
                });
            }
        }

        if combine.contains_key(&tenant.attribute) {
            return Err(ModelError::CombineOnReservedAttribute {
                entity: cfg.name.clone(),
                attribute: tenant.attribute.clone(),
                role: "tenant discriminator".to_string(),
            });
        }

        Ok(())
    }

    fn validate_deletion(
        cfg: &EntityConfig,
        deletion: &LogicDeletionDescriptor,
        combine: &HashMap<String, CombinePolicy>,
    ) -> ModelResult<()> {
        let invalid = |reason: String| ModelError::InvalidDeletionDescriptor {
            entity: cfg.name.clone(),
            reason,
        };

        if deletion.attribute.trim().is_empty() {
            return Err(ModelError::EmptyName(format!("deletion flag of {}", cfg.name)));
        }

        for (label, value) in [("active", &deletion.active), ("deleted", &deletion.deleted)] {
            if !is_scalar(value) {
                return Err(invalid(format!("{} value {} must be a non-null scalar", label, value)));
            }
            if let Some(declared) = cfg.attributes.get(&deletion.attribute) {
                if !declared.accepts(value) {
                    return Err(invalid(format!(
                        "{} value {} does not match declared type {}",
                        label,
                        value,
                        declared.type_name()
                    )));
                }
            }
        }

        if deletion.active == deletion.deleted {
            return Err(invalid("active and deleted values must differ".to_string()));
        }

        if let Some(tenant) = &cfg.tenant {
            if tenant.attribute == deletion.attribute {
                return Err(invalid(format!(
                    "flag attribute {} is also the tenant discriminator",
                    deletion.attribute
                )));
            }
        }

        if combine.contains_key(&deletion.attribute) {
            return Err(ModelError::CombineOnReservedAttribute {
                entity: cfg.name.clone(),
                attribute: deletion.attribute.clone(),
                role: "logic deletion flag".to_string(),
            });
        }

        Ok(())
    }
}

fn is_scalar(value: &Value) -> bool {
    matches!(value, Value::Bool(_) | Value::Number(_) | Value::String(_))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::types::{AttributeType, TenantValueType};
    use serde_json::json;

    #[test]
    fn test_same_policy_twice_is_accepted() {
        let cfg = EntityConfig::new("a")
            .combine("n", CombinePolicy::Overwrite)
            .combine("n", CombinePolicy::Overwrite);
        let combine = ModelValidator::validate_entity(&cfg).unwrap();
        assert_eq!(combine.len(), 1);
    }

    #[test]
    fn test_conflicting_policies_rejected() {
        let cfg = EntityConfig::new("a")
            .combine("n", CombinePolicy::Accumulate)
            .combine("n", CombinePolicy::Ignore);
        assert!(matches!(
            ModelValidator::validate_entity(&cfg),
            Err(ModelError::ConflictingCombinePolicies { .. })
        ));
    }

    #[test]
    fn test_accumulate_on_string_rejected() {
        let cfg = EntityConfig::new("a")
            .attribute("title", AttributeType::String)
            .combine("title", CombinePolicy::Accumulate);
        assert!(matches!(
            ModelValidator::validate_entity(&cfg),
            Err(ModelError::NonNumericAccumulate { .. })
        ));
    }

    #[test]
    fn test_wrong_discriminator_type_rejected() {
        let cfg = EntityConfig::new("a")
            .attribute("tenant_id", AttributeType::Int)
            .tenant(TenantDescriptor::new("tenant_id", TenantValueType::String));
        assert!(matches!(
            ModelValidator::validate_entity(&cfg),
            Err(ModelError::DiscriminatorType { .. })
        ));
    }

    #[test]
    fn test_sentinel_type_mismatch_rejected() {
        let cfg = EntityConfig::new("a").tenant(
            TenantDescriptor::new("tenant_id", TenantValueType::Int).with_global_sentinel(json!("*")),
        );
        assert!(matches!(
            ModelValidator::validate_entity(&cfg),
            Err(ModelError::InvalidTenantDescriptor { .. })
        ));
    }

    #[test]
    fn test_placeholder_sentinel_rejected() {
        let cfg = EntityConfig::new("a").tenant(
            TenantDescriptor::new("tenant_id", TenantValueType::String).with_global_sentinel(json!("")),
        );
        assert!(ModelValidator::validate_entity(&cfg).is_err());
    }

    #[test]
    fn test_identical_deletion_values_rejected() {
        let cfg = EntityConfig::new("a")
            .logic_deletion(LogicDeletionDescriptor::new("flag", json!(1), json!(1)));
        assert!(matches!(
            ModelValidator::validate_entity(&cfg),
            Err(ModelError::InvalidDeletionDescriptor { .. })
        ));
    }

    #[test]
    fn test_flag_equal_to_discriminator_rejected() {
        let cfg = EntityConfig::new("a")
            .tenant(TenantDescriptor::new("scope", TenantValueType::String))
            .logic_deletion(LogicDeletionDescriptor::new("scope", json!("live"), json!("gone")));
        assert!(ModelValidator::validate_entity(&cfg).is_err());
    }

    #[test]
    fn test_combine_on_flag_rejected() {
        let cfg = EntityConfig::new("a")
            .logic_deletion(LogicDeletionDescriptor::boolean("is_deleted"))
            .combine("is_deleted", CombinePolicy::Overwrite);
        assert!(matches!(
            ModelValidator::validate_entity(&cfg),
            Err(ModelError::CombineOnReservedAttribute { .. })
        ));
    }

    #[test]
    fn test_empty_entity_name_rejected() {
        let cfg = EntityConfig::new("  ");
        assert!(matches!(ModelValidator::validate_entity(&cfg), Err(ModelError::EmptyName(_))));
    }
}
