//! # Pipeline Errors
//!
//! Every error that can abort a commit, a query or a bulk operation.
//! Any error returned from `commit` means nothing was persisted and no
//! notice was sent.

use thiserror::Error;

use crate::conflict::{ConflictError, InvalidMergeError, ResolveError};
use crate::deletion::UnsupportedOperationError;
use crate::model::ModelError;
use crate::store::StoreError;
use crate::tenant::TenantMismatchError;

pub type PipelineResult<T> = Result<T, PipelineError>;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Conflict(#[from] ConflictError),

    #[error(transparent)]
    InvalidMerge(#[from] InvalidMergeError),

    #[error(transparent)]
    Unsupported(#[from] UnsupportedOperationError),

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    TenantMismatch(#[from] TenantMismatchError),

    /// The persisted row of a tracked update is gone or belongs to another tenant
    #[error("Record not found: {entity_type}/{identity}")]
    RecordNotFound { entity_type: String, identity: String },

    /// Identity already tracked by the unit of work, or already persisted on insert
    #[error("Duplicate identity: {entity_type}/{identity}")]
    DuplicateIdentity { entity_type: String, identity: String },

    #[error("Entity not tracked by this unit of work: {entity_type}/{identity}")]
    UntrackedEntity { entity_type: String, identity: String },

    /// A write would move a row out of the current tenant's scope
    #[error("Tenant discriminator {attribute} of {entity_type}/{identity} cannot be written as {value}")]
    TenantViolation {
        entity_type: String,
        identity: String,
        attribute: String,
        value: String,
    },
}

impl PipelineError {
    pub fn code(&self) -> &'static str {
        match self {
            PipelineError::Conflict(_) => "CONFLICT",
            PipelineError::InvalidMerge(_) => "INVALID_MERGE",
            PipelineError::Unsupported(_) => "UNSUPPORTED_OPERATION",
            PipelineError::Model(e) => e.code(),
            PipelineError::Store(e) => e.code(),
            PipelineError::TenantMismatch(_) => "TENANT_MISMATCH",
            PipelineError::RecordNotFound { .. } => "RECORD_NOT_FOUND",
            PipelineError::DuplicateIdentity { .. } => "DUPLICATE_IDENTITY",
            PipelineError::UntrackedEntity { .. } => "UNTRACKED_ENTITY",
            PipelineError::TenantViolation { .. } => "TENANT_VIOLATION",
        }
    }

    /// Reload and retry may succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            PipelineError::Conflict(e) => e.is_retryable(),
            PipelineError::RecordNotFound { .. } => true,
            _ => false,
        }
    }
}

impl From<ResolveError> for PipelineError {
    fn from(err: ResolveError) -> Self {
        match err {
            ResolveError::Conflict(e) => PipelineError::Conflict(e),
            ResolveError::InvalidMerge(e) => PipelineError::InvalidMerge(e),
        }
    }
}
