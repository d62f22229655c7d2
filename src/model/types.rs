//! Static configuration types
//!
//! Everything here is plain data deserialized from a model file or built
//! programmatically. Validation happens once in `Model::build`.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Whole-entity policy applied when a version conflict is detected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictPolicy {
    /// Keep the persisted state, drop the incoming change silently
    Ignore,
    /// Fail the unit of work with a conflict error
    #[default]
    ThrowOnConflict,
    /// Write the incoming state regardless of the persisted one
    Overwrite,
    /// Replace the caller's working copy with the persisted snapshot
    Reconstruct,
}

impl ConflictPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConflictPolicy::Ignore => "ignore",
            ConflictPolicy::ThrowOnConflict => "throw_on_conflict",
            ConflictPolicy::Overwrite => "overwrite",
            ConflictPolicy::Reconstruct => "reconstruct",
        }
    }
}

impl fmt::Display for ConflictPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-attribute merge rule applied on conflict
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CombinePolicy {
    /// Replay the caller's numeric delta on top of the persisted value
    Accumulate,
    /// Keep the persisted value
    Ignore,
    /// Take the incoming value
    Overwrite,
}

impl CombinePolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            CombinePolicy::Accumulate => "accumulate",
            CombinePolicy::Ignore => "ignore",
            CombinePolicy::Overwrite => "overwrite",
        }
    }
}

impl fmt::Display for CombinePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Declared attribute type, used only for build-time checks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttributeType {
    String,
    Int,
    Float,
    Bool,
    Object,
    Array,
}

impl AttributeType {
    pub fn type_name(&self) -> &'static str {
        match self {
            AttributeType::String => "string",
            AttributeType::Int => "int",
            AttributeType::Float => "float",
            AttributeType::Bool => "bool",
            AttributeType::Object => "object",
            AttributeType::Array => "array",
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, AttributeType::Int | AttributeType::Float)
    }

    /// Returns true if `value` is of this type. Null never matches.
    pub fn accepts(&self, value: &Value) -> bool {
        match self {
            AttributeType::String => value.is_string(),
            AttributeType::Int => value.is_i64() || value.is_u64(),
            AttributeType::Float => value.is_number(),
            AttributeType::Bool => value.is_boolean(),
            AttributeType::Object => value.is_object(),
            AttributeType::Array => value.is_array(),
        }
    }
}

/// Value type of a tenant discriminator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TenantValueType {
    String,
    Int,
}

impl TenantValueType {
    pub fn type_name(&self) -> &'static str {
        match self {
            TenantValueType::String => "string",
            TenantValueType::Int => "int",
        }
    }

    /// The attribute type a discriminator of this value type must be declared as
    pub fn attribute_type(&self) -> AttributeType {
        match self {
            TenantValueType::String => AttributeType::String,
            TenantValueType::Int => AttributeType::Int,
        }
    }

    pub fn accepts(&self, value: &Value) -> bool {
        match self {
            TenantValueType::String => value.is_string(),
            TenantValueType::Int => value.is_i64(),
        }
    }

    /// The zero value that marks a discriminator as "fill me in"
    pub fn placeholder(&self) -> Value {
        match self {
            TenantValueType::String => Value::String(String::new()),
            TenantValueType::Int => Value::from(0),
        }
    }
}

/// A tenant value handed out by the host's tenant-id source
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TenantId {
    Integer(i64),
    Text(String),
}

impl TenantId {
    pub fn value_type(&self) -> TenantValueType {
        match self {
            TenantId::Integer(_) => TenantValueType::Int,
            TenantId::Text(_) => TenantValueType::String,
        }
    }

    pub fn to_value(&self) -> Value {
        match self {
            TenantId::Integer(i) => Value::from(*i),
            TenantId::Text(s) => Value::String(s.clone()),
        }
    }
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TenantId::Integer(i) => write!(f, "{}", i),
            TenantId::Text(s) => f.write_str(s),
        }
    }
}

impl From<&str> for TenantId {
    fn from(s: &str) -> Self {
        TenantId::Text(s.to_string())
    }
}

impl From<String> for TenantId {
    fn from(s: String) -> Self {
        TenantId::Text(s)
    }
}

impl From<i64> for TenantId {
    fn from(i: i64) -> Self {
        TenantId::Integer(i)
    }
}

/// Tenant scoping for one entity type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TenantDescriptor {
    /// Discriminator attribute
    pub attribute: String,
    /// Discriminator value type
    pub value_type: TenantValueType,
    /// Discriminator value that makes a row visible to every tenant
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub global_sentinel: Option<Value>,
}

impl TenantDescriptor {
    pub fn new(attribute: impl Into<String>, value_type: TenantValueType) -> Self {
        Self {
            attribute: attribute.into(),
            value_type,
            global_sentinel: None,
        }
    }

    pub fn with_global_sentinel(mut self, sentinel: Value) -> Self {
        self.global_sentinel = Some(sentinel);
        self
    }

    /// Missing, null, or the value type's zero value
    pub fn is_unset(&self, value: Option<&Value>) -> bool {
        match value {
            None | Some(Value::Null) => true,
            Some(v) => *v == self.value_type.placeholder(),
        }
    }

    pub fn is_global(&self, value: &Value) -> bool {
        self.global_sentinel.as_ref() == Some(value)
    }
}

/// Logical deletion flag for one entity type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LogicDeletionDescriptor {
    /// Flag attribute
    pub attribute: String,
    /// Flag value of live rows
    pub active: Value,
    /// Flag value of deleted rows
    pub deleted: Value,
}

impl LogicDeletionDescriptor {
    pub fn new(attribute: impl Into<String>, active: Value, deleted: Value) -> Self {
        Self {
            attribute: attribute.into(),
            active,
            deleted,
        }
    }

    /// Boolean flag: `false` when active, `true` when deleted
    pub fn boolean(attribute: impl Into<String>) -> Self {
        Self::new(attribute, Value::Bool(false), Value::Bool(true))
    }
}

/// One (attribute, combine policy) declaration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AttributePolicy {
    pub attribute: String,
    pub policy: CombinePolicy,
}

/// Configuration for one entity type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EntityConfig {
    /// Entity type name
    pub name: String,
    /// Whole-entity conflict policy (default: throw_on_conflict)
    #[serde(default)]
    pub conflict_policy: ConflictPolicy,
    /// Optional attribute type declarations
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, AttributeType>,
    /// Per-attribute combine policies
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub combine_policies: Vec<AttributePolicy>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant: Option<TenantDescriptor>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logic_deletion: Option<LogicDeletionDescriptor>,
}

impl EntityConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            conflict_policy: ConflictPolicy::default(),
            attributes: BTreeMap::new(),
            combine_policies: Vec::new(),
            tenant: None,
            logic_deletion: None,
        }
    }

    pub fn conflict_policy(mut self, policy: ConflictPolicy) -> Self {
        self.conflict_policy = policy;
        self
    }

    pub fn attribute(mut self, name: impl Into<String>, ty: AttributeType) -> Self {
        self.attributes.insert(name.into(), ty);
        self
    }

    pub fn combine(mut self, attribute: impl Into<String>, policy: CombinePolicy) -> Self {
        self.combine_policies.push(AttributePolicy {
            attribute: attribute.into(),
            policy,
        });
        self
    }

    pub fn tenant(mut self, descriptor: TenantDescriptor) -> Self {
        self.tenant = Some(descriptor);
        self
    }

    pub fn logic_deletion(mut self, descriptor: LogicDeletionDescriptor) -> Self {
        self.logic_deletion = Some(descriptor);
        self
    }
}

/// A complete model file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ModelConfig {
    #[serde(default)]
    pub entities: Vec<EntityConfig>,
}

impl ModelConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entity(mut self, entity: EntityConfig) -> Self {
        self.entities.push(entity);
        self
    }
}
