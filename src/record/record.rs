//! VersionedRecord - one entity instance as seen by the pipeline
//!
//! A record is an identity, an optional version key and a JSON object of
//! attribute values. Nested objects are embedded sub-values of the record,
//! not records of their own.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use super::VersionKey;

/// Attribute values of a record
pub type Attributes = Map<String, Value>;

/// Predicate field name that addresses the record identity
pub const IDENTITY_FIELD: &str = "_id";

/// Identity of a record, unique within its entity type
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Identity(String);

impl Identity {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// A fresh random identity
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Identity {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for Identity {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// One entity instance with its version key.
///
/// The version key is `None` until a store accepts the record.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VersionedRecord {
    entity_type: String,
    identity: Identity,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    version: Option<VersionKey>,
    attributes: Attributes,
}

impl VersionedRecord {
    /// Creates an unpersisted record.
    pub fn new(entity_type: impl Into<String>, identity: impl Into<Identity>, attributes: Attributes) -> Self {
        Self {
            entity_type: entity_type.into(),
            identity: identity.into(),
            version: None,
            attributes,
        }
    }

    /// Creates an unpersisted record from a JSON object.
    ///
    /// Returns `None` if `value` is not an object.
    pub fn from_json(entity_type: impl Into<String>, identity: impl Into<Identity>, value: Value) -> Option<Self> {
        match value {
            Value::Object(attributes) => Some(Self::new(entity_type, identity, attributes)),
            _ => None,
        }
    }

    /// Returns this record as persisted under `version`.
    ///
    /// Called by store implementations when they accept a write.
    pub fn into_persisted(mut self, version: VersionKey) -> Self {
        self.version = Some(version);
        self
    }

    pub fn entity_type(&self) -> &str {
        &self.entity_type
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn version(&self) -> Option<VersionKey> {
        self.version
    }

    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    pub fn attributes_mut(&mut self) -> &mut Attributes {
        &mut self.attributes
    }

    pub fn get(&self, attribute: &str) -> Option<&Value> {
        self.attributes.get(attribute)
    }

    /// Sets an attribute, returning the previous value.
    pub fn set(&mut self, attribute: impl Into<String>, value: Value) -> Option<Value> {
        self.attributes.insert(attribute.into(), value)
    }

    pub fn remove(&mut self, attribute: &str) -> Option<Value> {
        self.attributes.remove(attribute)
    }

    /// Replaces every attribute and the version key with those of `other`.
    pub(crate) fn replace_with(&mut self, other: &VersionedRecord) {
        self.attributes = other.attributes.clone();
        self.version = other.version;
    }

    pub(crate) fn set_version(&mut self, version: VersionKey) {
        self.version = Some(version);
    }

    /// Returns the record as a single JSON object including `_id`.
    pub fn to_json(&self) -> Value {
        let mut obj = self.attributes.clone();
        obj.insert(IDENTITY_FIELD.to_string(), Value::String(self.identity.0.clone()));
        Value::Object(obj)
    }
}

/// Names of attributes whose values differ between `before` and `after`,
/// including attributes present on only one side. Sorted.
pub fn diff_attributes(before: &Attributes, after: &Attributes) -> Vec<String> {
    let keys: BTreeSet<&String> = before.keys().chain(after.keys()).collect();
    keys.into_iter()
        .filter(|k| before.get(k.as_str()) != after.get(k.as_str()))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_new_record_is_unversioned() {
        let record = VersionedRecord::from_json("account", "a1", json!({"balance": 5})).unwrap();
        assert_eq!(record.version(), None);
        assert_eq!(record.get("balance"), Some(&json!(5)));
    }

    #[test]
    fn test_from_json_rejects_non_object() {
        assert!(VersionedRecord::from_json("account", "a1", json!([1, 2])).is_none());
    }

    #[test]
    fn test_into_persisted_sets_version() {
        let record = VersionedRecord::from_json("account", "a1", json!({}))
            .unwrap()
            .into_persisted(VersionKey::new(9));
        assert_eq!(record.version(), Some(VersionKey::new(9)));
    }

    #[test]
    fn test_to_json_includes_identity() {
        let record = VersionedRecord::from_json("account", "a1", json!({"x": 1})).unwrap();
        let value = record.to_json();
        assert_eq!(value["_id"], "a1");
        assert_eq!(value["x"], 1);
    }

    #[test]
    fn test_diff_attributes() {
        let before = json!({"a": 1, "b": 2, "c": 3}).as_object().cloned().unwrap();
        let after = json!({"a": 1, "b": 5, "d": 4}).as_object().cloned().unwrap();
        assert_eq!(diff_attributes(&before, &after), vec!["b", "c", "d"]);
    }

    #[test]
    fn test_diff_attributes_equal() {
        let before = json!({"a": {"nested": true}}).as_object().cloned().unwrap();
        assert!(diff_attributes(&before, &before.clone()).is_empty());
    }

    #[test]
    fn test_generated_identities_differ() {
        assert_ne!(Identity::generate(), Identity::generate());
    }
}
