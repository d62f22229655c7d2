//! Unit of work - the changes collected before one commit
//!
//! Entries keep the order they were tracked in; commit processes and
//! notifies in that order.

use uuid::Uuid;

use super::errors::{PipelineError, PipelineResult};
use crate::record::{Attributes, VersionKey, VersionedRecord};

/// Pending operation of one tracked entity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryState {
    /// Never persisted; commit inserts it
    Added,
    /// Loaded from the store; commit writes it if its attributes changed
    Tracked,
    /// Loaded from the store and marked for removal
    Removed {
        /// Bypass logical deletion
        hard: bool,
    },
}

#[derive(Debug, Clone)]
pub(crate) struct Entry {
    pub(crate) working: VersionedRecord,
    /// Attributes as loaded; `None` for added entities
    pub(crate) original: Option<Attributes>,
    pub(crate) state: EntryState,
}

impl Entry {
    fn matches(&self, entity_type: &str, identity: &str) -> bool {
        self.working.entity_type() == entity_type && self.working.identity().as_str() == identity
    }

    /// True if the working copy differs from what was loaded
    pub(crate) fn is_dirty(&self) -> bool {
        match &self.original {
            Some(original) => original != self.working.attributes(),
            None => true,
        }
    }
}

/// What commit did to one entry
#[derive(Debug, Clone)]
pub(crate) enum Applied {
    /// Written under a new version; `attributes` replace the working copy's
    Written {
        index: usize,
        version: VersionKey,
        attributes: Attributes,
    },
    /// Working copy replaced by the persisted snapshot
    Refreshed { index: usize, snapshot: VersionedRecord },
    /// Row gone; entry leaves the unit of work
    Dropped { index: usize },
}

/// Changes collected for a single commit
#[derive(Debug, Clone)]
pub struct UnitOfWork {
    id: Uuid,
    entries: Vec<Entry>,
}

impl Default for UnitOfWork {
    fn default() -> Self {
        Self::new()
    }
}

impl UnitOfWork {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            entries: Vec::new(),
        }
    }

    /// Identifier carried by every notice this unit of work produces
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Working copies in tracking order
    pub fn records(&self) -> impl Iterator<Item = &VersionedRecord> {
        self.entries.iter().map(|e| &e.working)
    }

    pub fn get(&self, entity_type: &str, identity: &str) -> Option<&VersionedRecord> {
        self.position(entity_type, identity).map(|i| &self.entries[i].working)
    }

    /// Mutable working copy; changes are written on the next commit
    pub fn get_mut(&mut self, entity_type: &str, identity: &str) -> Option<&mut VersionedRecord> {
        self.position(entity_type, identity)
            .map(move |i| &mut self.entries[i].working)
    }

    pub fn state(&self, entity_type: &str, identity: &str) -> Option<EntryState> {
        self.position(entity_type, identity).map(|i| self.entries[i].state)
    }

    /// Marks an entity for removal. Logically deletable types are flagged
    /// deleted instead of removed.
    pub fn remove(&mut self, entity_type: &str, identity: &str) -> PipelineResult<()> {
        self.mark_removed(entity_type, identity, false)
    }

    /// Marks an entity for physical removal, bypassing logical deletion.
    pub fn remove_hard(&mut self, entity_type: &str, identity: &str) -> PipelineResult<()> {
        self.mark_removed(entity_type, identity, true)
    }

    fn mark_removed(&mut self, entity_type: &str, identity: &str, hard: bool) -> PipelineResult<()> {
        let index = self
            .position(entity_type, identity)
            .ok_or_else(|| PipelineError::UntrackedEntity {
                entity_type: entity_type.to_string(),
                identity: identity.to_string(),
            })?;

        // Never persisted: forgetting it is enough
        if self.entries[index].state == EntryState::Added {
            self.entries.remove(index);
            return Ok(());
        }
        self.entries[index].state = EntryState::Removed { hard };
        Ok(())
    }

    /// Starts tracking a record. Records without a version key are inserted
    /// on commit; records with one are treated as loaded.
    pub(crate) fn track(&mut self, record: VersionedRecord) -> PipelineResult<()> {
        if self.position(record.entity_type(), record.identity().as_str()).is_some() {
            return Err(PipelineError::DuplicateIdentity {
                entity_type: record.entity_type().to_string(),
                identity: record.identity().as_str().to_string(),
            });
        }

        let entry = match record.version() {
            None => Entry {
                working: record,
                original: None,
                state: EntryState::Added,
            },
            Some(_) => Entry {
                original: Some(record.attributes().clone()),
                working: record,
                state: EntryState::Tracked,
            },
        };
        self.entries.push(entry);
        Ok(())
    }

    pub(crate) fn entries(&self) -> &[Entry] {
        &self.entries
    }

    /// Applies the effects of a committed transaction.
    pub(crate) fn apply(&mut self, applied: Vec<Applied>) {
        let mut dropped = Vec::new();
        for effect in applied {
            match effect {
                Applied::Written {
                    index,
                    version,
                    attributes,
                } => {
                    let entry = &mut self.entries[index];
                    *entry.working.attributes_mut() = attributes;
                    entry.working.set_version(version);
                    entry.original = Some(entry.working.attributes().clone());
                    entry.state = EntryState::Tracked;
                }
                Applied::Refreshed { index, snapshot } => {
                    let entry = &mut self.entries[index];
                    entry.working.replace_with(&snapshot);
                    entry.original = Some(snapshot.attributes().clone());
                    entry.state = EntryState::Tracked;
                }
                Applied::Dropped { index } => dropped.push(index),
            }
        }

        // Highest index first so earlier indices stay valid
        dropped.sort_unstable_by(|a, b| b.cmp(a));
        for index in dropped {
            self.entries.remove(index);
        }
    }

    fn position(&self, entity_type: &str, identity: &str) -> Option<usize> {
        self.entries.iter().position(|e| e.matches(entity_type, identity))
    }
}
