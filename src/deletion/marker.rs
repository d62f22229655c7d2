//! LogicDeletionMarker - delete and recover as flag mutations
//!
//! Rows are never physically removed by a logical delete. Default reads
//! see only the active partition.

use thiserror::Error;

use crate::model::{EntityModel, LogicDeletionDescriptor};
use crate::query::{DeletionPartition, Predicate};
use crate::record::VersionedRecord;

/// Logical operation against an entity type without a deletion descriptor
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Entity type {entity_type} does not support {operation}: no logic deletion descriptor")]
pub struct UnsupportedOperationError {
    pub entity_type: String,
    pub operation: &'static str,
}

/// Applies a `LogicDeletionDescriptor` to records and queries
pub struct LogicDeletionMarker;

impl LogicDeletionMarker {
    /// The entity's descriptor, or an error naming the attempted operation.
    pub fn require<'m>(
        entity: &'m EntityModel,
        entity_type: &str,
        operation: &'static str,
    ) -> Result<&'m LogicDeletionDescriptor, UnsupportedOperationError> {
        entity.logic_deletion().ok_or_else(|| UnsupportedOperationError {
            entity_type: entity_type.to_string(),
            operation,
        })
    }

    /// The implicit read predicate for `partition`.
    ///
    /// Entity types without a descriptor have a single partition: reading
    /// it as `Active` or `All` adds nothing, asking for `Deleted` fails.
    pub fn partition_predicate(
        entity: &EntityModel,
        entity_type: &str,
        partition: DeletionPartition,
    ) -> Result<Option<Predicate>, UnsupportedOperationError> {
        match (partition, entity.logic_deletion()) {
            (DeletionPartition::All, _) | (DeletionPartition::Active, None) => Ok(None),
            (DeletionPartition::Active, Some(d)) => Ok(Some(Predicate::eq(d.attribute.clone(), d.active.clone()))),
            (DeletionPartition::Deleted, _) => {
                let d = Self::require(entity, entity_type, "reading the deleted partition")?;
                Ok(Some(Predicate::eq(d.attribute.clone(), d.deleted.clone())))
            }
        }
    }

    pub fn is_active(descriptor: &LogicDeletionDescriptor, record: &VersionedRecord) -> bool {
        record.get(&descriptor.attribute) == Some(&descriptor.active)
    }

    pub fn is_deleted(descriptor: &LogicDeletionDescriptor, record: &VersionedRecord) -> bool {
        record.get(&descriptor.attribute) == Some(&descriptor.deleted)
    }

    /// Flags an active record deleted. Returns false if it was not active.
    pub fn mark_deleted(descriptor: &LogicDeletionDescriptor, record: &mut VersionedRecord) -> bool {
        if !Self::is_active(descriptor, record) {
            return false;
        }
        record.set(descriptor.attribute.clone(), descriptor.deleted.clone());
        true
    }

    /// Flags a deleted record active. Returns false if it was not deleted.
    pub fn mark_recovered(descriptor: &LogicDeletionDescriptor, record: &mut VersionedRecord) -> bool {
        if !Self::is_deleted(descriptor, record) {
            return false;
        }
        record.set(descriptor.attribute.clone(), descriptor.active.clone());
        true
    }

    /// Stamps the active value on a record inserted without a flag.
    pub fn stamp_active(descriptor: &LogicDeletionDescriptor, record: &mut VersionedRecord) -> bool {
        match record.get(&descriptor.attribute) {
            None | Some(serde_json::Value::Null) => {
                record.set(descriptor.attribute.clone(), descriptor.active.clone());
                true
            }
            Some(_) => false,
        }
    }
}
