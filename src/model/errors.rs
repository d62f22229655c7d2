//! # Model Errors
//!
//! Configuration rejected at model-build or load time.

use thiserror::Error;

/// Result type for model operations
pub type ModelResult<T> = Result<T, ModelError>;

/// Malformed static configuration
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModelError {
    // ==================
    // Structure
    // ==================
    /// Entity or attribute name is empty
    #[error("Empty name in {0}")]
    EmptyName(String),

    /// Entity type declared twice
    #[error("Entity type declared more than once: {0}")]
    DuplicateEntity(String),

    // ==================
    // Combine policies
    // ==================
    /// Two different combine policies on one attribute
    #[error("Conflicting combine policies on {entity}.{attribute}: {first} and {second}")]
    ConflictingCombinePolicies {
        entity: String,
        attribute: String,
        first: String,
        second: String,
    },

    /// Accumulate on an attribute declared non-numeric
    #[error("Accumulate requires a numeric attribute: {entity}.{attribute} is declared {declared}")]
    NonNumericAccumulate {
        entity: String,
        attribute: String,
        declared: String,
    },

    /// Combine policy on the discriminator or the deletion flag
    #[error("Combine policy not allowed on {entity}.{attribute}: attribute is the {role}")]
    CombineOnReservedAttribute {
        entity: String,
        attribute: String,
        role: String,
    },

    // ==================
    // Descriptors
    // ==================
    /// Discriminator declared with a type other than the tenant value type
    #[error("Discriminator {entity}.{attribute} must be {expected}, declared {declared}")]
    DiscriminatorType {
        entity: String,
        attribute: String,
        expected: String,
        declared: String,
    },

    /// Tenant descriptor inconsistent in some other way
    #[error("Invalid tenant descriptor on {entity}: {reason}")]
    InvalidTenantDescriptor { entity: String, reason: String },

    /// Logic deletion descriptor inconsistent
    #[error("Invalid logic deletion descriptor on {entity}: {reason}")]
    InvalidDeletionDescriptor { entity: String, reason: String },

    /// Tenant descriptors configured but the pipeline has no tenant-id source
    #[error("Entity {0} is tenant scoped but no tenant-id source was supplied")]
    MissingTenantSource(String),

    // ==================
    // Loading
    // ==================
    /// Model file could not be read
    #[error("Failed to read model {path}: {message}")]
    Io { path: String, message: String },

    /// Model file is not valid model JSON
    #[error("Invalid model JSON in {path}: {message}")]
    Parse { path: String, message: String },
}

impl ModelError {
    /// Stable error code
    pub fn code(&self) -> &'static str {
        match self {
            ModelError::EmptyName(_) => "MODEL_EMPTY_NAME",
            ModelError::DuplicateEntity(_) => "MODEL_DUPLICATE_ENTITY",
            ModelError::ConflictingCombinePolicies { .. } => "MODEL_CONFLICTING_COMBINE_POLICIES",
            ModelError::NonNumericAccumulate { .. } => "MODEL_NON_NUMERIC_ACCUMULATE",
            ModelError::CombineOnReservedAttribute { .. } => "MODEL_COMBINE_ON_RESERVED_ATTRIBUTE",
            ModelError::DiscriminatorType { .. } => "MODEL_DISCRIMINATOR_TYPE",
            ModelError::InvalidTenantDescriptor { .. } => "MODEL_INVALID_TENANT_DESCRIPTOR",
            ModelError::InvalidDeletionDescriptor { .. } => "MODEL_INVALID_DELETION_DESCRIPTOR",
            ModelError::MissingTenantSource(_) => "MODEL_MISSING_TENANT_SOURCE",
            ModelError::Io { .. } => "MODEL_IO",
            ModelError::Parse { .. } => "MODEL_PARSE",
        }
    }
}
