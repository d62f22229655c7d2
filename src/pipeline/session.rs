//! # Pipeline
//!
//! Runs the commit-time policies around a transactional store.
//!
//! ## Flow
//! - attach: stamp tenant discriminator and active flag, start tracking
//! - commit: one transaction; version check, resolution and merging per
//!   entry; notices dispatched only after the store committed
//! - query: tenant and deletion predicates injected before the scan
//! - bulk delete / recover / hard delete: one transaction each, notified
//!   like commits
//!
//! Any error before the store commits drops the transaction, so nothing is
//! persisted, the unit of work is left untouched and no notice is sent.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::Value;
use uuid::Uuid;

use super::errors::{PipelineError, PipelineResult};
use super::unit_of_work::{Applied, Entry, EntryState, UnitOfWork};
use crate::conflict::{ConflictResolver, ResolveError, Resolution, VersionCheck, VersionGuard};
use crate::deletion::LogicDeletionMarker;
use crate::model::{EntityModel, Model, ModelError, ModelResult, TenantDescriptor, TenantId};
use crate::notify::{
    ChangeKind, ChangeNotice, ChangeNotificationDispatcher, ChangeSender, DispatchReport, FailureReceiver,
    NullSender,
};
use crate::observability::{
    log_event_with_fields, Event, Logger, MetricsSnapshot, ObservationScope, PipelineMetrics,
};
use crate::query::{DeletionPartition, Predicate, Query, ScopedQuery};
use crate::record::{diff_attributes, Attributes, Identity, VersionKey, VersionedRecord, IDENTITY_FIELD};
use crate::store::{MemoryStore, RecordStore, StoreTransaction};
use crate::tenant::{TenantFilterInjector, TenantIdSource};

/// Result of a successful commit or bulk operation
#[derive(Debug, Clone, PartialEq)]
pub struct CommitOutcome {
    pub unit_of_work: Uuid,
    /// Rows written, including flag mutations
    pub written: usize,
    /// Rows physically removed
    pub removed: usize,
    /// Version conflicts detected and resolved
    pub conflicts: usize,
    /// Notices built for this commit, in commit order
    pub notices: Vec<ChangeNotice>,
    pub dispatch: DispatchReport,
}

/// Builds a `Pipeline`
pub struct PipelineBuilder {
    model: Arc<Model>,
    store: Option<Arc<dyn RecordStore>>,
    tenant_source: Option<Arc<dyn TenantIdSource>>,
    sender: Option<Arc<dyn ChangeSender>>,
    metrics: Option<Arc<PipelineMetrics>>,
}

impl PipelineBuilder {
    /// Defaults to an empty `MemoryStore`
    pub fn store(mut self, store: Arc<dyn RecordStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Required when any entity type is tenant scoped
    pub fn tenant_source(mut self, source: Arc<dyn TenantIdSource>) -> Self {
        self.tenant_source = Some(source);
        self
    }

    /// Defaults to `NullSender`
    pub fn sender(mut self, sender: Arc<dyn ChangeSender>) -> Self {
        self.sender = Some(sender);
        self
    }

    pub fn metrics(mut self, metrics: Arc<PipelineMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn build(self) -> ModelResult<Pipeline> {
        if self.tenant_source.is_none() {
            if let Some(entity) = self.model.first_tenant_scoped() {
                let err = ModelError::MissingTenantSource(entity.to_string());
                log_event_with_fields(Event::ModelRejected, &[("code", err.code()), ("entity", entity)]);
                return Err(err);
            }
        }

        let metrics = self.metrics.unwrap_or_default();
        let sender: Arc<dyn ChangeSender> = match self.sender {
            Some(sender) => sender,
            None => Arc::new(NullSender),
        };
        let store: Arc<dyn RecordStore> = match self.store {
            Some(store) => store,
            None => Arc::new(MemoryStore::new()),
        };
        Ok(Pipeline {
            model: self.model,
            store,
            tenant_source: self.tenant_source,
            dispatcher: ChangeNotificationDispatcher::new(sender, metrics.clone()),
            metrics,
        })
    }
}

/// The commit-time policy pipeline. Shared across threads as `Arc<Pipeline>`.
pub struct Pipeline {
    model: Arc<Model>,
    store: Arc<dyn RecordStore>,
    tenant_source: Option<Arc<dyn TenantIdSource>>,
    dispatcher: ChangeNotificationDispatcher,
    metrics: Arc<PipelineMetrics>,
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("entities", &self.model.entity_names())
            .field("tenant_source", &self.tenant_source.is_some())
            .field("dispatcher", &self.dispatcher)
            .finish_non_exhaustive()
    }
}

impl Pipeline {
    pub fn builder(model: Arc<Model>) -> PipelineBuilder {
        PipelineBuilder {
            model,
            store: None,
            tenant_source: None,
            sender: None,
            metrics: None,
        }
    }

    pub fn model(&self) -> &Arc<Model> {
        &self.model
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Receives every notice delivery failure from now on
    pub fn subscribe_failures(&self) -> FailureReceiver {
        self.dispatcher.subscribe_failures()
    }

    // ==================================================================
    // Attach
    // ==================================================================

    /// Starts tracking `record` in `uow`.
    ///
    /// New records (no version key) get their tenant discriminator and
    /// active flag stamped; loaded records are tracked as they are.
    pub fn attach(&self, uow: &mut UnitOfWork, mut record: VersionedRecord) -> PipelineResult<()> {
        if record.version().is_none() {
            let entity_type = record.entity_type().to_string();
            let entity = self.model.entity(&entity_type);

            if let Some(descriptor) = entity.tenant() {
                if TenantFilterInjector::needs_stamp(descriptor, &record) {
                    let tenant = self.tenant_context().discriminator(&entity_type, descriptor)?;
                    let tenant_text = value_text(&tenant);
                    TenantFilterInjector::stamp(descriptor, &mut record, tenant);
                    log_event_with_fields(
                        Event::TenantStamped,
                        &[
                            ("entity", entity_type.as_str()),
                            ("identity", record.identity().as_str()),
                            ("tenant", tenant_text.as_str()),
                        ],
                    );
                }
            }
            if let Some(descriptor) = entity.logic_deletion() {
                LogicDeletionMarker::stamp_active(descriptor, &mut record);
            }
        }
        uow.track(record)
    }

    /// Reads one row through the default query scope and attaches it.
    pub fn load(&self, uow: &mut UnitOfWork, entity_type: &str, identity: &str) -> PipelineResult<()> {
        let query = Query::new(entity_type).filter(Predicate::eq(IDENTITY_FIELD, Value::String(identity.to_string())));
        let record = self
            .query(&query)?
            .into_iter()
            .next()
            .ok_or_else(|| PipelineError::RecordNotFound {
                entity_type: entity_type.to_string(),
                identity: identity.to_string(),
            })?;
        self.attach(uow, record)
    }

    // ==================================================================
    // Query
    // ==================================================================

    /// Adds the implicit tenant and deletion predicates to `query`.
    pub fn build_query(&self, query: &Query) -> PipelineResult<ScopedQuery> {
        self.scope_query(query, &mut self.tenant_context())
    }

    pub fn query(&self, query: &Query) -> PipelineResult<Vec<VersionedRecord>> {
        let scoped = self.build_query(query)?;
        let rows = self.store.begin()?.scan(&scoped)?;
        self.metrics.increment_queries();

        let count = rows.len().to_string();
        Logger::trace(
            "QUERY_EXECUTED",
            &[("entity", query.entity_type()), ("rows", count.as_str())],
        );
        Ok(rows)
    }

    fn scope_query(&self, query: &Query, tenant: &mut TenantContext<'_>) -> PipelineResult<ScopedQuery> {
        let entity_type = query.entity_type();
        let entity = self.model.entity(entity_type);
        let mut implicit = Vec::new();

        if let Some(descriptor) = entity.tenant() {
            let predicate = TenantFilterInjector::query_predicate(descriptor, query.scope(), || {
                tenant.discriminator(entity_type, descriptor)
            })?;
            implicit.extend(predicate);
        }
        implicit.extend(LogicDeletionMarker::partition_predicate(
            entity,
            entity_type,
            query.requested_partition(),
        )?);

        Ok(ScopedQuery::new(entity_type.to_string(), query.predicates().to_vec(), implicit))
    }

    // ==================================================================
    // Commit
    // ==================================================================

    /// Commits every pending change in `uow` in one transaction.
    ///
    /// On success the working copies carry their new version keys. On error
    /// nothing was persisted and `uow` is unchanged.
    pub fn commit(&self, uow: &mut UnitOfWork) -> PipelineResult<CommitOutcome> {
        let id = uow.id().to_string();
        let scope = ObservationScope::with_fields("COMMIT", &[("unit_of_work", id.as_str())]);

        match self.execute_commit(uow.id(), uow.entries()) {
            Ok(mut staged) => {
                uow.apply(std::mem::take(&mut staged.applied));
                Ok(self.finish(staged, scope))
            }
            Err(err) => {
                self.rolled_back(&id, &err, scope);
                Err(err)
            }
        }
    }

    fn execute_commit(&self, unit_of_work: Uuid, entries: &[Entry]) -> PipelineResult<Staged> {
        let mut tenant = self.tenant_context();
        // Ask the tenant source before the store is locked
        if let Some(entity_type) = entries
            .iter()
            .filter(|entry| touches_store(entry))
            .map(|entry| entry.working.entity_type())
            .find(|entity_type| self.model.entity(entity_type).tenant().is_some())
        {
            tenant.resolve(entity_type)?;
        }

        let mut txn = self.store.begin()?;
        let mut staged = Staged::new(unit_of_work);

        for (index, entry) in entries.iter().enumerate() {
            let entity = self.model.entity(entry.working.entity_type());
            match entry.state {
                EntryState::Added => self.stage_insert(&mut *txn, index, entry, entity, &mut tenant, &mut staged)?,
                EntryState::Tracked if entry.is_dirty() => {
                    self.stage_update(&mut *txn, index, entry, entity, &mut tenant, &mut staged)?
                }
                EntryState::Tracked => {}
                EntryState::Removed { hard } => {
                    self.stage_removal(&mut *txn, index, entry, entity, hard, &mut tenant, &mut staged)?
                }
            }
        }

        txn.commit()?;
        Ok(staged)
    }

    fn stage_insert(
        &self,
        txn: &mut dyn StoreTransaction,
        index: usize,
        entry: &Entry,
        entity: &EntityModel,
        tenant: &mut TenantContext<'_>,
        staged: &mut Staged,
    ) -> PipelineResult<()> {
        let record = &entry.working;
        if let Some(descriptor) = entity.tenant() {
            let current = tenant.discriminator(record.entity_type(), descriptor)?;
            let written = record.get(&descriptor.attribute);
            if !TenantFilterInjector::insertable(descriptor, written, &current) {
                return Err(tenant_violation(record, descriptor, written));
            }
        }

        if txn.get(record.entity_type(), record.identity().as_str())?.is_some() {
            return Err(PipelineError::DuplicateIdentity {
                entity_type: record.entity_type().to_string(),
                identity: record.identity().as_str().to_string(),
            });
        }

        let version = txn.put(record.clone())?;
        staged.written += 1;
        staged.applied.push(Applied::Written {
            index,
            version,
            attributes: record.attributes().clone(),
        });
        staged.notice(record, ChangeKind::Insert, record.attributes().keys().cloned().collect());
        Ok(())
    }

    fn stage_update(
        &self,
        txn: &mut dyn StoreTransaction,
        index: usize,
        entry: &Entry,
        entity: &EntityModel,
        tenant: &mut TenantContext<'_>,
        staged: &mut Staged,
    ) -> PipelineResult<()> {
        let working = &entry.working;
        let persisted = self.read_visible(txn, entity, working, tenant)?;

        match VersionGuard::check(working.version(), persisted.as_ref()) {
            VersionCheck::Vanished => Err(PipelineError::RecordNotFound {
                entity_type: working.entity_type().to_string(),
                identity: working.identity().as_str().to_string(),
            }),
            VersionCheck::NoConflict => {
                let Some(row) = persisted.as_ref() else {
                    return Ok(());
                };
                self.write_update(txn, index, entity, working, row, working.attributes().clone(), staged)
            }
            VersionCheck::Conflict { persisted: row } => {
                staged.conflicts += 1;
                self.conflict_detected(entity, working, row);

                let original = entry.original.as_ref().unwrap_or_else(|| working.attributes());
                let mut resolver = ConflictResolver::detected(entity);
                let result = resolver.resolve_update(working, original, row);
                let resolution = self.resolved(&resolver, working, result)?;
                self.settle(txn, index, entry, entity, row, resolution, false, staged)
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn stage_removal(
        &self,
        txn: &mut dyn StoreTransaction,
        index: usize,
        entry: &Entry,
        entity: &EntityModel,
        hard: bool,
        tenant: &mut TenantContext<'_>,
        staged: &mut Staged,
    ) -> PipelineResult<()> {
        let working = &entry.working;
        let persisted = self.read_visible(txn, entity, working, tenant)?;

        match VersionGuard::check(working.version(), persisted.as_ref()) {
            // Already gone: nothing left to remove
            VersionCheck::Vanished => {
                staged.applied.push(Applied::Dropped { index });
                Ok(())
            }
            VersionCheck::NoConflict => match persisted.as_ref() {
                Some(row) => self.remove_row(txn, index, entity, row, hard, staged),
                None => Ok(()),
            },
            VersionCheck::Conflict { persisted: row } => {
                staged.conflicts += 1;
                self.conflict_detected(entity, working, row);

                let mut resolver = ConflictResolver::detected(entity);
                let result = resolver.resolve_removal(working, row);
                let resolution = self.resolved(&resolver, working, result)?;
                self.settle(txn, index, entry, entity, row, resolution, hard, staged)
            }
        }
    }

    /// Applies a resolution inside the commit transaction.
    #[allow(clippy::too_many_arguments)]
    fn settle(
        &self,
        txn: &mut dyn StoreTransaction,
        index: usize,
        entry: &Entry,
        entity: &EntityModel,
        persisted: &VersionedRecord,
        resolution: Resolution,
        hard: bool,
        staged: &mut Staged,
    ) -> PipelineResult<()> {
        match resolution {
            Resolution::Write {
                attributes,
                merged_attributes,
            } => {
                self.metrics.add_attributes_merged(merged_attributes.len() as u64);
                for attribute in &merged_attributes {
                    log_event_with_fields(
                        Event::AttributeMerged,
                        &[
                            ("attribute", attribute.as_str()),
                            ("entity", entry.working.entity_type()),
                            ("identity", entry.working.identity().as_str()),
                        ],
                    );
                }
                self.write_update(txn, index, entity, &entry.working, persisted, attributes, staged)
            }
            Resolution::Discard => Ok(()),
            Resolution::Reconstruct(snapshot) => {
                staged.applied.push(Applied::Refreshed { index, snapshot });
                Ok(())
            }
            Resolution::Remove => self.remove_row(txn, index, entity, persisted, hard, staged),
        }
    }

    /// Writes `attributes` over `persisted`; a write that changes nothing is
    /// skipped and the working copy is synced to the persisted row instead.
    #[allow(clippy::too_many_arguments)]
    fn write_update(
        &self,
        txn: &mut dyn StoreTransaction,
        index: usize,
        entity: &EntityModel,
        working: &VersionedRecord,
        persisted: &VersionedRecord,
        attributes: Attributes,
        staged: &mut Staged,
    ) -> PipelineResult<()> {
        let changed = diff_attributes(persisted.attributes(), &attributes);
        if changed.is_empty() {
            staged.applied.push(Applied::Refreshed {
                index,
                snapshot: persisted.clone(),
            });
            return Ok(());
        }
        if let Some(descriptor) = entity.tenant() {
            if !TenantFilterInjector::keeps_discriminator(descriptor, persisted, &attributes) {
                return Err(tenant_violation(working, descriptor, attributes.get(&descriptor.attribute)));
            }
        }

        let record = VersionedRecord::new(working.entity_type(), working.identity().clone(), attributes.clone());
        let version = txn.put(record)?;
        staged.written += 1;
        staged.applied.push(Applied::Written {
            index,
            version,
            attributes,
        });
        staged.notice(working, ChangeKind::Update, changed);
        Ok(())
    }

    /// Flags or physically removes a persisted row.
    fn remove_row(
        &self,
        txn: &mut dyn StoreTransaction,
        index: usize,
        entity: &EntityModel,
        persisted: &VersionedRecord,
        hard: bool,
        staged: &mut Staged,
    ) -> PipelineResult<()> {
        match entity.logic_deletion() {
            Some(descriptor) if !hard => {
                let mut flagged = persisted.clone();
                if LogicDeletionMarker::mark_deleted(descriptor, &mut flagged) {
                    txn.put(flagged)?;
                    staged.written += 1;
                    staged.notice(persisted, ChangeKind::Delete, vec![descriptor.attribute.clone()]);
                }
            }
            _ => {
                if txn.remove(persisted.entity_type(), persisted.identity().as_str())? {
                    staged.removed += 1;
                    staged.notice(persisted, ChangeKind::Delete, Vec::new());
                }
            }
        }
        staged.applied.push(Applied::Dropped { index });
        Ok(())
    }

    /// The persisted row, or `None` if it is gone or belongs to another tenant.
    fn read_visible(
        &self,
        txn: &dyn StoreTransaction,
        entity: &EntityModel,
        working: &VersionedRecord,
        tenant: &mut TenantContext<'_>,
    ) -> PipelineResult<Option<VersionedRecord>> {
        let Some(row) = txn.get(working.entity_type(), working.identity().as_str())? else {
            return Ok(None);
        };
        if let Some(descriptor) = entity.tenant() {
            let current = tenant.discriminator(working.entity_type(), descriptor)?;
            if !TenantFilterInjector::is_visible(descriptor, &row, &current) {
                return Ok(None);
            }
        }
        Ok(Some(row))
    }

    fn conflict_detected(&self, entity: &EntityModel, working: &VersionedRecord, persisted: &VersionedRecord) {
        self.metrics.increment_conflicts_detected();
        let loaded = version_text(working.version());
        let current = version_text(persisted.version());
        log_event_with_fields(
            Event::ConflictDetected,
            &[
                ("entity", working.entity_type()),
                ("identity", working.identity().as_str()),
                ("loaded", loaded.as_str()),
                ("persisted", current.as_str()),
                ("policy", entity.conflict_policy().as_str()),
            ],
        );
    }

    fn resolved(
        &self,
        resolver: &ConflictResolver<'_>,
        working: &VersionedRecord,
        result: Result<Resolution, ResolveError>,
    ) -> PipelineResult<Resolution> {
        // A failed merge never reached the entity policy
        if !matches!(result, Err(ResolveError::InvalidMerge(_))) {
            self.metrics.record_resolution(resolver.policy());
        }
        let resolution = result?;
        log_event_with_fields(
            Event::ConflictResolved,
            &[
                ("entity", working.entity_type()),
                ("identity", working.identity().as_str()),
                ("outcome", resolution_name(&resolution)),
                ("policy", resolver.policy().as_str()),
                ("state", resolver.state().as_str()),
            ],
        );
        Ok(resolution)
    }

    // ==================================================================
    // Bulk logical deletion
    // ==================================================================

    /// Flags every active row matching `predicates` deleted.
    pub fn delete_logical(&self, entity_type: &str, predicates: Vec<Predicate>) -> PipelineResult<CommitOutcome> {
        self.bulk(BulkOp::Delete, entity_type, predicates)
    }

    /// Flags every deleted row matching `predicates` active again.
    pub fn recover(&self, entity_type: &str, predicates: Vec<Predicate>) -> PipelineResult<CommitOutcome> {
        self.bulk(BulkOp::Recover, entity_type, predicates)
    }

    /// Physically removes every row matching `predicates`, in either partition.
    pub fn hard_delete(&self, entity_type: &str, predicates: Vec<Predicate>) -> PipelineResult<CommitOutcome> {
        self.bulk(BulkOp::HardDelete, entity_type, predicates)
    }

    fn bulk(&self, op: BulkOp, entity_type: &str, predicates: Vec<Predicate>) -> PipelineResult<CommitOutcome> {
        let unit_of_work = Uuid::new_v4();
        let id = unit_of_work.to_string();
        let scope = ObservationScope::with_fields(
            op.scope_name(),
            &[("entity", entity_type), ("unit_of_work", id.as_str())],
        );

        match self.execute_bulk(op, entity_type, predicates, unit_of_work) {
            Ok(staged) => Ok(self.finish(staged, scope)),
            Err(err) => {
                self.rolled_back(&id, &err, scope);
                Err(err)
            }
        }
    }

    fn execute_bulk(
        &self,
        op: BulkOp,
        entity_type: &str,
        predicates: Vec<Predicate>,
        unit_of_work: Uuid,
    ) -> PipelineResult<Staged> {
        let entity = self.model.entity(entity_type);
        let descriptor = match op {
            BulkOp::HardDelete => None,
            BulkOp::Delete | BulkOp::Recover => {
                Some(LogicDeletionMarker::require(entity, entity_type, op.operation())?)
            }
        };

        let query = Query::new(entity_type).filters(predicates).partition(op.partition());
        let scoped = self.scope_query(&query, &mut self.tenant_context())?;

        let mut txn = self.store.begin()?;
        let mut staged = Staged::new(unit_of_work);

        for row in txn.scan(&scoped)? {
            let Some(descriptor) = descriptor else {
                if txn.remove(entity_type, row.identity().as_str())? {
                    staged.removed += 1;
                    staged.notice(&row, ChangeKind::Delete, Vec::new());
                }
                continue;
            };

            let mut flagged = row.clone();
            let (changed, kind) = match op {
                BulkOp::Recover => (LogicDeletionMarker::mark_recovered(descriptor, &mut flagged), ChangeKind::Update),
                _ => (LogicDeletionMarker::mark_deleted(descriptor, &mut flagged), ChangeKind::Delete),
            };
            if changed {
                txn.put(flagged)?;
                staged.written += 1;
                staged.notice(&row, kind, vec![descriptor.attribute.clone()]);
            }
        }

        txn.commit()?;

        let rows = staged.pending.len().to_string();
        log_event_with_fields(op.event(), &[("entity", entity_type), ("rows", rows.as_str())]);
        Ok(staged)
    }

    // ==================================================================
    // Completion
    // ==================================================================

    /// Counts, dispatches and logs a committed transaction.
    fn finish(&self, staged: Staged, scope: ObservationScope<'_>) -> CommitOutcome {
        self.metrics.increment_commits();
        self.metrics.add_records_written(staged.written as u64);
        self.metrics.add_records_removed(staged.removed as u64);

        let unit_of_work = staged.unit_of_work;
        let (written, removed, conflicts) = (staged.written, staged.removed, staged.conflicts);
        let notices = staged.into_notices(Utc::now());
        let dispatch = self.dispatcher.dispatch(&notices);

        let written_text = written.to_string();
        let notices_text = notices.len().to_string();
        let failures_text = dispatch.failures.len().to_string();
        scope.complete_with_fields(&[
            ("written", written_text.as_str()),
            ("notices", notices_text.as_str()),
            ("failures", failures_text.as_str()),
        ]);

        CommitOutcome {
            unit_of_work,
            written,
            removed,
            conflicts,
            notices,
            dispatch,
        }
    }

    fn rolled_back(&self, unit_of_work: &str, err: &PipelineError, scope: ObservationScope<'_>) {
        self.metrics.increment_rollbacks();
        let reason = err.to_string();
        log_event_with_fields(
            Event::CommitRolledBack,
            &[("code", err.code()), ("reason", reason.as_str()), ("unit_of_work", unit_of_work)],
        );
        scope.fail(err.code());
    }

    fn tenant_context(&self) -> TenantContext<'_> {
        TenantContext {
            source: self.tenant_source.as_deref(),
            current: None,
        }
    }
}

/// Consults the tenant source at most once per operation
struct TenantContext<'p> {
    source: Option<&'p dyn TenantIdSource>,
    current: Option<TenantId>,
}

impl TenantContext<'_> {
    fn resolve(&mut self, entity_type: &str) -> PipelineResult<TenantId> {
        if let Some(tenant) = &self.current {
            return Ok(tenant.clone());
        }
        let source = self
            .source
            .ok_or_else(|| ModelError::MissingTenantSource(entity_type.to_string()))?;
        let tenant = source.current_tenant_id();
        self.current = Some(tenant.clone());
        Ok(tenant)
    }

    fn discriminator(&mut self, entity_type: &str, descriptor: &TenantDescriptor) -> PipelineResult<Value> {
        let tenant = self.resolve(entity_type)?;
        Ok(TenantFilterInjector::discriminator_value(entity_type, descriptor, &tenant)?)
    }
}

/// A change waiting for the commit timestamp
#[derive(Debug)]
struct PendingNotice {
    entity_type: String,
    identity: Identity,
    kind: ChangeKind,
    changed: Vec<String>,
}

/// Everything a transaction did, held until the store commits
#[derive(Debug)]
struct Staged {
    unit_of_work: Uuid,
    applied: Vec<Applied>,
    pending: Vec<PendingNotice>,
    written: usize,
    removed: usize,
    conflicts: usize,
}

impl Staged {
    fn new(unit_of_work: Uuid) -> Self {
        Self {
            unit_of_work,
            applied: Vec::new(),
            pending: Vec::new(),
            written: 0,
            removed: 0,
            conflicts: 0,
        }
    }

    fn notice(&mut self, record: &VersionedRecord, kind: ChangeKind, changed: Vec<String>) {
        self.pending.push(PendingNotice {
            entity_type: record.entity_type().to_string(),
            identity: record.identity().clone(),
            kind,
            changed,
        });
    }

    fn into_notices(self, timestamp: DateTime<Utc>) -> Vec<ChangeNotice> {
        let unit_of_work = self.unit_of_work;
        self.pending
            .into_iter()
            .map(|p| ChangeNotice::new(p.entity_type, p.identity, p.kind, p.changed, unit_of_work, timestamp))
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BulkOp {
    Delete,
    Recover,
    HardDelete,
}

impl BulkOp {
    fn scope_name(&self) -> &'static str {
        match self {
            BulkOp::Delete => "LOGIC_DELETE",
            BulkOp::Recover => "LOGIC_RECOVER",
            BulkOp::HardDelete => "HARD_DELETE",
        }
    }

    fn event(&self) -> Event {
        match self {
            BulkOp::Delete => Event::LogicDelete,
            BulkOp::Recover => Event::LogicRecover,
            BulkOp::HardDelete => Event::HardDelete,
        }
    }

    fn operation(&self) -> &'static str {
        match self {
            BulkOp::Delete => "logical delete",
            BulkOp::Recover => "recover",
            BulkOp::HardDelete => "hard delete",
        }
    }

    /// Rows a bulk operation can affect
    fn partition(&self) -> DeletionPartition {
        match self {
            BulkOp::Delete => DeletionPartition::Active,
            BulkOp::Recover => DeletionPartition::Deleted,
            BulkOp::HardDelete => DeletionPartition::All,
        }
    }
}

/// True if committing `entry` reads or writes the store
fn touches_store(entry: &Entry) -> bool {
    !matches!(entry.state, EntryState::Tracked) || entry.is_dirty()
}

fn tenant_violation(record: &VersionedRecord, descriptor: &TenantDescriptor, written: Option<&Value>) -> PipelineError {
    PipelineError::TenantViolation {
        entity_type: record.entity_type().to_string(),
        identity: record.identity().as_str().to_string(),
        attribute: descriptor.attribute.clone(),
        value: written.map(Value::to_string).unwrap_or_else(|| "null".to_string()),
    }
}

fn resolution_name(resolution: &Resolution) -> &'static str {
    match resolution {
        Resolution::Write { .. } => "write",
        Resolution::Discard => "discard",
        Resolution::Reconstruct(_) => "reconstruct",
        Resolution::Remove => "remove",
    }
}

fn version_text(version: Option<VersionKey>) -> String {
    version.map(|v| v.to_string()).unwrap_or_else(|| "none".to_string())
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
