//! Logical Deletion Tests
//!
//! - Removing a flagged entity type flips its flag instead of deleting
//! - Default reads see only the active partition
//! - Recover flips the flag back
//! - Logical operations on unflagged types are rejected

use std::sync::Arc;

use commitguard::model::{ConflictPolicy, EntityConfig, LogicDeletionDescriptor, Model, ModelConfig};
use commitguard::notify::ChangeKind;
use commitguard::pipeline::{Pipeline, PipelineError, UnitOfWork};
use commitguard::query::{DeletionPartition, Predicate, Query};
use commitguard::record::VersionedRecord;
use commitguard::store::MemoryStore;
use serde_json::{json, Value};

// =============================================================================
// Helper Functions
// =============================================================================

fn pipeline() -> (Pipeline, Arc<MemoryStore>) {
    let model = Model::build(
        ModelConfig::new()
            .entity(EntityConfig::new("post").logic_deletion(LogicDeletionDescriptor::boolean("is_deleted")))
            .entity(EntityConfig::new("ticket").logic_deletion(LogicDeletionDescriptor::new(
                "status",
                json!("live"),
                json!("archived"),
            )))
            .entity(
                EntityConfig::new("note")
                    .conflict_policy(ConflictPolicy::Overwrite)
                    .logic_deletion(LogicDeletionDescriptor::boolean("is_deleted")),
            )
            .entity(EntityConfig::new("audit")),
    )
    .unwrap();
    let store = Arc::new(MemoryStore::new());
    let pipeline = Pipeline::builder(model).store(store.clone()).build().unwrap();
    (pipeline, store)
}

fn insert(pipeline: &Pipeline, entity: &str, id: &str, value: Value) {
    let mut uow = UnitOfWork::new();
    pipeline
        .attach(&mut uow, VersionedRecord::from_json(entity, id, value).unwrap())
        .unwrap();
    pipeline.commit(&mut uow).unwrap();
}

fn ids(pipeline: &Pipeline, query: Query) -> Vec<String> {
    pipeline
        .query(&query)
        .unwrap()
        .iter()
        .map(|r| r.identity().as_str().to_string())
        .collect()
}

// =============================================================================
// Remove Through a Unit of Work
// =============================================================================

/// Removing a flagged entity writes the deleted flag and keeps the row.
#[test]
fn test_remove_flags_row() {
    let (pipeline, store) = pipeline();
    insert(&pipeline, "post", "p1", json!({"title": "hello"}));

    let mut uow = UnitOfWork::new();
    pipeline.load(&mut uow, "post", "p1").unwrap();
    uow.remove("post", "p1").unwrap();
    let outcome = pipeline.commit(&mut uow).unwrap();

    assert_eq!(outcome.written, 1);
    assert_eq!(outcome.removed, 0);
    assert_eq!(outcome.notices.len(), 1);
    assert_eq!(outcome.notices[0].kind, ChangeKind::Delete);
    assert_eq!(outcome.notices[0].changed_attributes, vec!["is_deleted"]);
    assert!(uow.is_empty());

    let rows = store.rows("post").unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].get("is_deleted"), Some(&json!(true)));
    assert_eq!(rows[0].get("title"), Some(&json!("hello")));
}

/// Default reads skip deleted rows; the deleted and all partitions do not.
#[test]
fn test_partitions() {
    let (pipeline, _store) = pipeline();
    insert(&pipeline, "post", "p1", json!({}));
    insert(&pipeline, "post", "p2", json!({}));
    pipeline
        .delete_logical("post", vec![Predicate::eq("_id", json!("p1"))])
        .unwrap();

    assert_eq!(ids(&pipeline, Query::new("post")), vec!["p2"]);
    assert_eq!(
        ids(&pipeline, Query::new("post").partition(DeletionPartition::Deleted)),
        vec!["p1"]
    );
    assert_eq!(
        ids(&pipeline, Query::new("post").partition(DeletionPartition::All)),
        vec!["p1", "p2"]
    );

    let mut uow = UnitOfWork::new();
    assert_eq!(pipeline.load(&mut uow, "post", "p1").unwrap_err().code(), "RECORD_NOT_FOUND");
}

/// Hard removal bypasses the flag.
#[test]
fn test_remove_hard() {
    let (pipeline, store) = pipeline();
    insert(&pipeline, "post", "p1", json!({}));

    let mut uow = UnitOfWork::new();
    pipeline.load(&mut uow, "post", "p1").unwrap();
    uow.remove_hard("post", "p1").unwrap();
    let outcome = pipeline.commit(&mut uow).unwrap();

    assert_eq!(outcome.removed, 1);
    assert_eq!(outcome.notices[0].kind, ChangeKind::Delete);
    assert!(outcome.notices[0].changed_attributes.is_empty());
    assert!(store.rows("post").unwrap().is_empty());
}

/// Removing a row that is already flagged deleted changes nothing.
#[test]
fn test_remove_already_deleted_is_noop() {
    let (pipeline, _store) = pipeline();
    insert(&pipeline, "post", "p1", json!({"is_deleted": true}));

    let row = pipeline
        .query(&Query::new("post").partition(DeletionPartition::Deleted))
        .unwrap()
        .remove(0);
    let mut uow = UnitOfWork::new();
    pipeline.attach(&mut uow, row).unwrap();
    uow.remove("post", "p1").unwrap();

    let outcome = pipeline.commit(&mut uow).unwrap();
    assert_eq!(outcome.written, 0);
    assert!(outcome.notices.is_empty());
}

/// Removing an entity that was never committed just forgets it.
#[test]
fn test_remove_added_entity() {
    let (pipeline, store) = pipeline();
    let mut uow = UnitOfWork::new();
    pipeline
        .attach(&mut uow, VersionedRecord::from_json("post", "p1", json!({})).unwrap())
        .unwrap();
    uow.remove("post", "p1").unwrap();

    let outcome = pipeline.commit(&mut uow).unwrap();
    assert_eq!(outcome.written, 0);
    assert!(store.is_empty().unwrap());
}

/// Unflagged entity types are removed physically.
#[test]
fn test_remove_unflagged_type() {
    let (pipeline, store) = pipeline();
    insert(&pipeline, "audit", "a1", json!({}));

    let mut uow = UnitOfWork::new();
    pipeline.load(&mut uow, "audit", "a1").unwrap();
    uow.remove("audit", "a1").unwrap();
    pipeline.commit(&mut uow).unwrap();

    assert!(store.rows("audit").unwrap().is_empty());
}

// =============================================================================
// Bulk Operations
// =============================================================================

/// Bulk delete then recover, with custom flag values.
#[test]
fn test_delete_and_recover() {
    let (pipeline, store) = pipeline();
    insert(&pipeline, "ticket", "t1", json!({"queue": "ops"}));
    insert(&pipeline, "ticket", "t2", json!({"queue": "ops"}));
    insert(&pipeline, "ticket", "t3", json!({"queue": "dev"}));
    assert_eq!(store.rows("ticket").unwrap()[0].get("status"), Some(&json!("live")));

    let deleted = pipeline
        .delete_logical("ticket", vec![Predicate::eq("queue", json!("ops"))])
        .unwrap();
    assert_eq!(deleted.written, 2);
    assert!(deleted.notices.iter().all(|n| n.kind == ChangeKind::Delete));
    assert_eq!(ids(&pipeline, Query::new("ticket")), vec!["t3"]);

    let recovered = pipeline
        .recover("ticket", vec![Predicate::eq("_id", json!("t2"))])
        .unwrap();
    assert_eq!(recovered.written, 1);
    assert_eq!(recovered.notices[0].kind, ChangeKind::Update);
    assert_eq!(recovered.notices[0].changed_attributes, vec!["status"]);
    assert_eq!(ids(&pipeline, Query::new("ticket")), vec!["t2", "t3"]);
}

/// Bulk delete only touches active rows; rerunning it is a no-op.
#[test]
fn test_delete_logical_idempotent() {
    let (pipeline, _store) = pipeline();
    insert(&pipeline, "post", "p1", json!({}));

    assert_eq!(pipeline.delete_logical("post", Vec::new()).unwrap().written, 1);
    let again = pipeline.delete_logical("post", Vec::new()).unwrap();
    assert_eq!(again.written, 0);
    assert!(again.notices.is_empty());
}

/// Hard delete removes rows in both partitions.
#[test]
fn test_hard_delete_both_partitions() {
    let (pipeline, store) = pipeline();
    insert(&pipeline, "post", "p1", json!({}));
    insert(&pipeline, "post", "p2", json!({"is_deleted": true}));

    let outcome = pipeline.hard_delete("post", Vec::new()).unwrap();
    assert_eq!(outcome.removed, 2);
    assert!(store.rows("post").unwrap().is_empty());
}

/// A stale Overwrite keeps a concurrent logical delete.
#[test]
fn test_stale_overwrite_keeps_deleted_flag() {
    let (pipeline, store) = pipeline();
    insert(&pipeline, "note", "n1", json!({"title": "hello"}));

    let mut stale = UnitOfWork::new();
    pipeline.load(&mut stale, "note", "n1").unwrap();
    pipeline
        .delete_logical("note", vec![Predicate::eq("_id", json!("n1"))])
        .unwrap();

    stale.get_mut("note", "n1").unwrap().set("title", json!("mine"));
    let outcome = pipeline.commit(&mut stale).unwrap();

    assert_eq!(outcome.conflicts, 1);
    assert_eq!(outcome.notices[0].kind, ChangeKind::Update);
    assert_eq!(outcome.notices[0].changed_attributes, vec!["title"]);
    assert!(ids(&pipeline, Query::new("note")).is_empty());

    let row = &store.rows("note").unwrap()[0];
    assert_eq!(row.get("is_deleted"), Some(&json!(true)));
    assert_eq!(row.get("title"), Some(&json!("mine")));
    assert_eq!(stale.get("note", "n1").unwrap().get("is_deleted"), Some(&json!(true)));
}

// =============================================================================
// Unsupported Operations
// =============================================================================

/// Logical operations on a type without a descriptor are rejected.
#[test]
fn test_logical_ops_on_unflagged_type() {
    let (pipeline, store) = pipeline();
    insert(&pipeline, "audit", "a1", json!({}));

    for result in [
        pipeline.delete_logical("audit", Vec::new()),
        pipeline.recover("audit", Vec::new()),
    ] {
        match result {
            Err(PipelineError::Unsupported(e)) => assert_eq!(e.entity_type, "audit"),
            other => panic!("expected Unsupported, got {:?}", other),
        }
    }

    let err = pipeline
        .query(&Query::new("audit").partition(DeletionPartition::Deleted))
        .unwrap_err();
    assert_eq!(err.code(), "UNSUPPORTED_OPERATION");

    // Hard delete needs no descriptor
    assert_eq!(pipeline.hard_delete("audit", Vec::new()).unwrap().removed, 1);
    assert!(store.rows("audit").unwrap().is_empty());
}
