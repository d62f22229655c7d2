//! Observable pipeline events
//!
//! Events are explicit and typed; the string form is what the logger emits.

use std::fmt;

/// Observable events in the commit pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    // Model
    /// Model configuration built and validated
    ModelBuilt,
    /// Model configuration rejected
    ModelRejected,

    // Attach / tenant
    /// Discriminator stamped on an attached entity
    TenantStamped,

    // Commit
    /// Version conflict detected for a record
    ConflictDetected,
    /// Conflict resolved by policy
    ConflictResolved,
    /// Attribute merged by combine policy
    AttributeMerged,
    /// Unit of work rolled back
    CommitRolledBack,

    // Logical deletion
    /// Rows flagged deleted
    LogicDelete,
    /// Rows flagged active again
    LogicRecover,
    /// Rows physically removed
    HardDelete,

    // Notifications
    /// Notice handed to the sender
    NoticeDelivered,
    /// Sender rejected a notice
    NoticeDeliveryFailed,
}

impl Event {
    /// Returns the string representation of the event
    pub fn as_str(&self) -> &'static str {
        match self {
            Event::ModelBuilt => "MODEL_BUILT",
            Event::ModelRejected => "MODEL_REJECTED",
            Event::TenantStamped => "TENANT_STAMPED",
            Event::ConflictDetected => "CONFLICT_DETECTED",
            Event::ConflictResolved => "CONFLICT_RESOLVED",
            Event::AttributeMerged => "ATTRIBUTE_MERGED",
            Event::CommitRolledBack => "COMMIT_ROLLED_BACK",
            Event::LogicDelete => "LOGIC_DELETE",
            Event::LogicRecover => "LOGIC_RECOVER",
            Event::HardDelete => "HARD_DELETE",
            Event::NoticeDelivered => "NOTICE_DELIVERED",
            Event::NoticeDeliveryFailed => "NOTICE_DELIVERY_FAILED",
        }
    }

    /// Returns true if the event reports a failed operation
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            Event::ModelRejected | Event::CommitRolledBack | Event::NoticeDeliveryFailed
        )
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
