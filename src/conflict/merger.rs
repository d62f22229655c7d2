//! AttributeMerger - per-attribute combine rules applied on conflict
//!
//! Attributes with a declared `CombinePolicy` are merged here. Every other
//! attribute the caller changed is reported back as a residual change for
//! the entity-level policy to decide.

use serde_json::{Number, Value};

use super::errors::InvalidMergeError;
use crate::model::{CombinePolicy, EntityModel};
use crate::record::Attributes;

/// Result of merging one conflicting record
#[derive(Debug, Clone, PartialEq)]
pub struct MergeOutcome {
    /// Persisted attributes with every combine policy applied
    pub merged: Attributes,
    /// Combined attributes whose value differs from the persisted one
    pub merged_attributes: Vec<String>,
    /// Attributes without a combine policy that the caller changed, sorted
    pub residual_changes: Vec<String>,
}

impl MergeOutcome {
    pub fn has_residual_changes(&self) -> bool {
        !self.residual_changes.is_empty()
    }
}

/// Applies combine policies attribute by attribute
pub struct AttributeMerger;

impl AttributeMerger {
    /// Merges the caller's changes (`original` -> `incoming`) onto `persisted`.
    ///
    /// `original` is the state the caller loaded; `persisted` is the row
    /// read in the writing transaction.
    pub fn merge(
        entity: &EntityModel,
        original: &Attributes,
        incoming: &Attributes,
        persisted: &Attributes,
    ) -> Result<MergeOutcome, InvalidMergeError> {
        let mut merged = persisted.clone();
        let mut merged_attributes = Vec::new();

        for (attribute, policy) in entity.combine_policies() {
            let combined = Self::combine(
                entity.name(),
                attribute,
                policy,
                original.get(attribute),
                incoming.get(attribute),
                persisted.get(attribute),
            )?;
            if combined.as_ref() != persisted.get(attribute) {
                merged_attributes.push(attribute.to_string());
            }
            match combined {
                Some(value) => {
                    merged.insert(attribute.to_string(), value);
                }
                None => {
                    merged.remove(attribute);
                }
            }
        }

        let mut residual_changes: Vec<String> = original
            .keys()
            .chain(incoming.keys())
            .filter(|k| entity.combine_policy(k).is_none())
            .filter(|k| original.get(k.as_str()) != incoming.get(k.as_str()))
            .cloned()
            .collect();
        residual_changes.sort();
        residual_changes.dedup();

        Ok(MergeOutcome {
            merged,
            merged_attributes,
            residual_changes,
        })
    }

    /// Combines one attribute. `None` means the attribute is absent after
    /// the merge.
    pub fn combine(
        entity_type: &str,
        attribute: &str,
        policy: CombinePolicy,
        original: Option<&Value>,
        incoming: Option<&Value>,
        persisted: Option<&Value>,
    ) -> Result<Option<Value>, InvalidMergeError> {
        match policy {
            CombinePolicy::Ignore => Ok(persisted.cloned()),
            CombinePolicy::Overwrite => Ok(incoming.cloned()),
            // Untouched by the caller: nothing to replay
            CombinePolicy::Accumulate if original == incoming => Ok(persisted.cloned()),
            CombinePolicy::Accumulate => {
                let invalid = |reason: String| InvalidMergeError {
                    entity_type: entity_type.to_string(),
                    attribute: attribute.to_string(),
                    reason,
                };
                let original = numeric(original, "originally loaded").map_err(invalid)?;
                let incoming = numeric(incoming, "incoming").map_err(invalid)?;
                let persisted = numeric(persisted, "persisted").map_err(invalid)?;
                accumulate(original, incoming, persisted).map(Some).map_err(invalid)
            }
        }
    }
}

fn numeric<'a>(value: Option<&'a Value>, role: &str) -> Result<&'a Number, String> {
    match value {
        Some(Value::Number(n)) => Ok(n),
        Some(other) => Err(format!("{} value {} is not numeric", role, other)),
        None => Err(format!("{} value is missing", role)),
    }
}

/// persisted + (incoming - original)
fn accumulate(original: &Number, incoming: &Number, persisted: &Number) -> Result<Value, String> {
    if let (Some(o), Some(i), Some(p)) = (original.as_i64(), incoming.as_i64(), persisted.as_i64()) {
        return i
            .checked_sub(o)
            .and_then(|delta| p.checked_add(delta))
            .map(Value::from)
            .ok_or_else(|| "integer overflow".to_string());
    }

    let (o, i, p) = match (original.as_f64(), incoming.as_f64(), persisted.as_f64()) {
        (Some(o), Some(i), Some(p)) => (o, i, p),
        _ => return Err("value is not representable as a float".to_string()),
    };
    Number::from_f64(p + (i - o))
        .map(Value::Number)
        .ok_or_else(|| "result is not a finite number".to_string())
}
