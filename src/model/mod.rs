//! # Model
//!
//! Static per-entity configuration: conflict policy, combine policies,
//! tenant descriptor and logic deletion descriptor.
//!
//! ## Rules
//! - Built once, validated once, immutable afterwards
//! - Malformed configuration is rejected at build time, never at commit time
//! - Policy lookup is attribute first, entity-level as fallback

mod errors;
mod loader;
mod registry;
mod types;
mod validator;

pub use errors::{ModelError, ModelResult};
pub use registry::{EntityModel, Model, PolicyLookup};
pub use types::{
    AttributePolicy, AttributeType, CombinePolicy, ConflictPolicy, EntityConfig,
    LogicDeletionDescriptor, ModelConfig, TenantDescriptor, TenantId, TenantValueType,
};
