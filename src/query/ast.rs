//! Query representation
//!
//! A `Query` names an entity type, explicit predicates (AND semantics) and
//! the partitions the caller asks for. Implicit tenant and deletion
//! predicates are added when the query is built into a `ScopedQuery`.

use serde_json::Value;

/// Filter operation types
#[derive(Debug, Clone, PartialEq)]
pub enum FilterOp {
    /// field = value
    Eq(Value),
    /// field != value (missing fields do not match)
    Ne(Value),
    /// field is one of the values
    In(Vec<Value>),
    /// field >= value
    Gte(Value),
    /// field > value
    Gt(Value),
    /// field <= value
    Lte(Value),
    /// field < value
    Lt(Value),
}

impl FilterOp {
    /// Operation name for explain output
    pub fn op_name(&self) -> &'static str {
        match self {
            FilterOp::Eq(_) => "eq",
            FilterOp::Ne(_) => "ne",
            FilterOp::In(_) => "in",
            FilterOp::Gte(_) => "gte",
            FilterOp::Gt(_) => "gt",
            FilterOp::Lte(_) => "lte",
            FilterOp::Lt(_) => "lt",
        }
    }
}

/// A single predicate (field + operation)
#[derive(Debug, Clone, PartialEq)]
pub struct Predicate {
    pub field: String,
    pub op: FilterOp,
}

impl Predicate {
    pub fn eq(field: impl Into<String>, value: Value) -> Self {
        Self { field: field.into(), op: FilterOp::Eq(value) }
    }

    pub fn ne(field: impl Into<String>, value: Value) -> Self {
        Self { field: field.into(), op: FilterOp::Ne(value) }
    }

    pub fn one_of(field: impl Into<String>, values: Vec<Value>) -> Self {
        Self { field: field.into(), op: FilterOp::In(values) }
    }

    pub fn gte(field: impl Into<String>, value: Value) -> Self {
        Self { field: field.into(), op: FilterOp::Gte(value) }
    }

    pub fn gt(field: impl Into<String>, value: Value) -> Self {
        Self { field: field.into(), op: FilterOp::Gt(value) }
    }

    pub fn lte(field: impl Into<String>, value: Value) -> Self {
        Self { field: field.into(), op: FilterOp::Lte(value) }
    }

    pub fn lt(field: impl Into<String>, value: Value) -> Self {
        Self { field: field.into(), op: FilterOp::Lt(value) }
    }

    /// `{"field": ..., "op": ..., "value": ...}` for explain output
    pub fn to_json(&self) -> Value {
        let value = match &self.op {
            FilterOp::In(values) => Value::Array(values.clone()),
            FilterOp::Eq(v)
            | FilterOp::Ne(v)
            | FilterOp::Gte(v)
            | FilterOp::Gt(v)
            | FilterOp::Lte(v)
            | FilterOp::Lt(v) => v.clone(),
        };
        serde_json::json!({ "field": self.field, "op": self.op.op_name(), "value": value })
    }
}

/// Which tenants' rows a query may see
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TenantScope {
    /// Current tenant plus globally exempt rows
    #[default]
    Current,
    /// Only rows carrying the global sentinel
    Global,
    /// No tenant predicate at all
    Unrestricted,
}

/// Which logical-deletion partition a query reads
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeletionPartition {
    /// Rows whose flag is the active value
    #[default]
    Active,
    /// Rows whose flag is the deleted value
    Deleted,
    /// Both partitions
    All,
}

/// A caller-level query before implicit predicates are injected
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    entity_type: String,
    predicates: Vec<Predicate>,
    tenant_scope: TenantScope,
    partition: DeletionPartition,
}

impl Query {
    pub fn new(entity_type: impl Into<String>) -> Self {
        Self {
            entity_type: entity_type.into(),
            predicates: Vec::new(),
            tenant_scope: TenantScope::default(),
            partition: DeletionPartition::default(),
        }
    }

    pub fn filter(mut self, predicate: Predicate) -> Self {
        self.predicates.push(predicate);
        self
    }

    pub fn filters(mut self, predicates: impl IntoIterator<Item = Predicate>) -> Self {
        self.predicates.extend(predicates);
        self
    }

    pub fn tenant_scope(mut self, scope: TenantScope) -> Self {
        self.tenant_scope = scope;
        self
    }

    pub fn partition(mut self, partition: DeletionPartition) -> Self {
        self.partition = partition;
        self
    }

    pub fn entity_type(&self) -> &str {
        &self.entity_type
    }

    pub fn predicates(&self) -> &[Predicate] {
        &self.predicates
    }

    pub fn scope(&self) -> TenantScope {
        self.tenant_scope
    }

    pub fn requested_partition(&self) -> DeletionPartition {
        self.partition
    }
}

/// A query with its implicit predicates injected, ready for the store
#[derive(Debug, Clone, PartialEq)]
pub struct ScopedQuery {
    entity_type: String,
    explicit: Vec<Predicate>,
    implicit: Vec<Predicate>,
}

impl ScopedQuery {
    pub(crate) fn new(entity_type: String, explicit: Vec<Predicate>, implicit: Vec<Predicate>) -> Self {
        Self { entity_type, explicit, implicit }
    }

    pub fn entity_type(&self) -> &str {
        &self.entity_type
    }

    /// Predicates added by tenant scoping and logical deletion
    pub fn implicit_predicates(&self) -> &[Predicate] {
        &self.implicit
    }

    /// Every predicate, explicit first
    pub fn predicates(&self) -> impl Iterator<Item = &Predicate> {
        self.explicit.iter().chain(self.implicit.iter())
    }
}
