//! # Change Notices
//!
//! One notice per root entity with a net change in a committed unit of work.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::record::Identity;

/// Kind of committed change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChangeKind {
    /// New row written
    Insert,
    /// Existing row changed (including recover)
    Update,
    /// Row logically or physically deleted
    Delete,
}

impl std::fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChangeKind::Insert => write!(f, "INSERT"),
            ChangeKind::Update => write!(f, "UPDATE"),
            ChangeKind::Delete => write!(f, "DELETE"),
        }
    }
}

/// A committed change of one root entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeNotice {
    pub entity_type: String,

    pub identity: Identity,

    pub kind: ChangeKind,

    /// Attributes whose persisted value changed, sorted
    pub changed_attributes: Vec<String>,

    /// When the unit of work committed
    pub timestamp: DateTime<Utc>,

    /// Unit of work that committed the change
    pub unit_of_work: Uuid,
}

impl ChangeNotice {
    pub fn new(
        entity_type: impl Into<String>,
        identity: Identity,
        kind: ChangeKind,
        mut changed_attributes: Vec<String>,
        unit_of_work: Uuid,
        timestamp: DateTime<Utc>,
    ) -> Self {
        changed_attributes.sort();
        changed_attributes.dedup();
        Self {
            entity_type: entity_type.into(),
            identity,
            kind,
            changed_attributes,
            timestamp,
            unit_of_work,
        }
    }

    /// Serialize for transport
    pub fn to_wire_format(&self) -> Value {
        serde_json::json!({
            "type": self.kind.to_string(),
            "entity_type": self.entity_type,
            "identity": self.identity.as_str(),
            "changed": self.changed_attributes,
            "timestamp": self.timestamp.to_rfc3339(),
            "unit_of_work": self.unit_of_work.to_string(),
        })
    }
}
