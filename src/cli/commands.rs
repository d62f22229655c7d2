//! CLI command implementations
//!
//! Both commands load and validate a model, then print one JSON object.
//! Neither touches a store or a tenant source.

use std::convert::Infallible;
use std::path::Path;
use std::sync::Arc;

use serde_json::{json, Value};

use crate::deletion::LogicDeletionMarker;
use crate::model::{EntityModel, Model, ModelConfig, PolicyLookup};
use crate::query::{DeletionPartition, TenantScope};
use crate::tenant::TenantFilterInjector;

use super::args::Command;
use super::errors::{CliError, CliResult};
use super::io::{write_error, write_response};

/// Stands in for the runtime tenant in explain output
const CURRENT_TENANT_PLACEHOLDER: &str = "$current_tenant";

/// Main CLI entry point
///
/// Parses arguments and dispatches to the appropriate command.
pub fn run() -> CliResult<()> {
    let cli = super::args::Cli::parse_args();
    run_command(cli.command)
}

/// Run the appropriate command based on CLI args
pub fn run_command(cmd: Command) -> CliResult<()> {
    let result = match cmd {
        Command::Check { model } => check(&model),
        Command::Explain {
            model,
            entity,
            attribute,
        } => explain(&model, &entity, attribute.as_deref()),
    };

    if let Err(e) = &result {
        write_error(e.code_str(), e.message())?;
    }
    result
}

/// Validate a model and print a summary of its entity types
pub fn check(model_path: &Path) -> CliResult<()> {
    let model = load_model(model_path)?;
    write_response(check_report(&model))
}

/// Print the policies that apply to one entity type
pub fn explain(model_path: &Path, entity: &str, attribute: Option<&str>) -> CliResult<()> {
    let model = load_model(model_path)?;
    write_response(explain_report(&model, entity, attribute)?)
}

fn load_model(path: &Path) -> CliResult<Arc<Model>> {
    let config = ModelConfig::load(path)?;
    Ok(Model::build(config)?)
}

pub(crate) fn check_report(model: &Model) -> Value {
    let entities: Vec<Value> = model
        .entity_names()
        .into_iter()
        .map(|name| {
            let entity = model.entity(name);
            json!({
                "name": name,
                "conflict_policy": entity.conflict_policy().as_str(),
                "combine_policies": entity.combine_policies().len(),
                "tenant_scoped": entity.tenant().is_some(),
                "logic_deletion": entity.logic_deletion().is_some(),
            })
        })
        .collect();

    json!({
        "valid": true,
        "count": entities.len(),
        "entities": entities,
    })
}

pub(crate) fn explain_report(model: &Model, entity_type: &str, attribute: Option<&str>) -> CliResult<Value> {
    if !model.is_configured(entity_type) {
        return Err(CliError::unknown_entity(entity_type));
    }
    let entity = model.entity(entity_type);

    let combine: Vec<Value> = entity
        .combine_policies()
        .into_iter()
        .map(|(attr, policy)| json!({ "attribute": attr, "policy": policy.as_str() }))
        .collect();

    let mut report = json!({
        "entity": entity_type,
        "conflict_policy": entity.conflict_policy().as_str(),
        "combine_policies": combine,
        "tenant": serde_json::to_value(entity.tenant())?,
        "logic_deletion": serde_json::to_value(entity.logic_deletion())?,
        "read_predicates": read_predicates(entity, entity_type),
    });

    if let Some(attr) = attribute {
        let resolved = match entity.resolve(attr) {
            PolicyLookup::Attribute(policy) => json!({
                "name": attr,
                "source": "attribute",
                "policy": policy.as_str(),
            }),
            PolicyLookup::Entity(policy) => json!({
                "name": attr,
                "source": "entity",
                "policy": policy.as_str(),
            }),
        };
        report["attribute"] = resolved;
    }

    Ok(report)
}

/// Implicit predicates a default query (current tenant, active partition) gets
fn read_predicates(entity: &EntityModel, entity_type: &str) -> Vec<Value> {
    let mut out = Vec::new();

    if let Some(descriptor) = entity.tenant() {
        let placeholder = || Ok::<Value, Infallible>(Value::String(CURRENT_TENANT_PLACEHOLDER.to_string()));
        if let Ok(Some(predicate)) = TenantFilterInjector::query_predicate(descriptor, TenantScope::Current, placeholder) {
            out.push(predicate.to_json());
        }
    }

    // The active partition never fails
    if let Ok(Some(predicate)) = LogicDeletionMarker::partition_predicate(entity, entity_type, DeletionPartition::Active) {
        out.push(predicate.to_json());
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::errors::CliErrorCode;
    use std::fs;
    use tempfile::TempDir;

    const MODEL: &str = r#"{
        "entities": [
            {
                "name": "account",
                "conflict_policy": "overwrite",
                "attributes": {"balance": "int"},
                "combine_policies": [{"attribute": "balance", "policy": "accumulate"}],
                "tenant": {"attribute": "tenant_id", "value_type": "string", "global_sentinel": "*"},
                "logic_deletion": {"attribute": "is_deleted", "active": false, "deleted": true}
            },
            {"name": "audit"}
        ]
    }"#;

    fn write_model(dir: &TempDir, content: &str) -> std::path::PathBuf {
        let path = dir.path().join("model.json");
        fs::write(&path, content).unwrap();
        path
    }

    fn loaded(content: &str) -> Arc<Model> {
        let dir = TempDir::new().unwrap();
        let path = write_model(&dir, content);
        load_model(&path).unwrap()
    }

    #[test]
    fn test_check_report_lists_entities() {
        let report = check_report(&loaded(MODEL));
        assert_eq!(report["count"], 2);
        assert_eq!(report["entities"][0]["name"], "account");
        assert_eq!(report["entities"][0]["tenant_scoped"], true);
        assert_eq!(report["entities"][1]["conflict_policy"], "throw_on_conflict");
    }

    #[test]
    fn test_rejected_model_maps_to_cli_error() {
        let dir = TempDir::new().unwrap();
        let path = write_model(
            &dir,
            r#"{"entities": [{"name": "a"}, {"name": "a"}]}"#,
        );
        let err = load_model(&path).unwrap_err();
        assert_eq!(err.code(), &CliErrorCode::ModelRejected);
        assert!(err.message().contains("MODEL_DUPLICATE_ENTITY"));
    }

    #[test]
    fn test_explain_attribute_policy_wins() {
        let report = explain_report(&loaded(MODEL), "account", Some("balance")).unwrap();
        assert_eq!(report["attribute"]["source"], "attribute");
        assert_eq!(report["attribute"]["policy"], "accumulate");
    }

    #[test]
    fn test_explain_falls_back_to_entity_policy() {
        let report = explain_report(&loaded(MODEL), "account", Some("name")).unwrap();
        assert_eq!(report["attribute"]["source"], "entity");
        assert_eq!(report["attribute"]["policy"], "overwrite");
    }

    #[test]
    fn test_explain_read_predicates() {
        let report = explain_report(&loaded(MODEL), "account", None).unwrap();
        let predicates = report["read_predicates"].as_array().unwrap();
        assert_eq!(predicates.len(), 2);
        assert_eq!(predicates[0]["field"], "tenant_id");
        assert_eq!(predicates[0]["op"], "in");
        assert_eq!(predicates[0]["value"], json!(["$current_tenant", "*"]));
        assert_eq!(predicates[1], json!({"field": "is_deleted", "op": "eq", "value": false}));
        assert!(report.get("attribute").is_none());
    }

    #[test]
    fn test_explain_plain_entity_has_no_predicates() {
        let report = explain_report(&loaded(MODEL), "audit", None).unwrap();
        assert!(report["read_predicates"].as_array().unwrap().is_empty());
        assert!(report["tenant"].is_null());
    }

    #[test]
    fn test_explain_unknown_entity() {
        let err = explain_report(&loaded(MODEL), "ghost", None).unwrap_err();
        assert_eq!(err.code(), &CliErrorCode::UnknownEntity);
    }
}
