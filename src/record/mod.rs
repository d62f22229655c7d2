//! Record vocabulary
//!
//! - `VersionKey` - opaque version token assigned by the store
//! - `Identity` - record key within an entity type
//! - `VersionedRecord` - identity, version key and attribute values

#[allow(clippy::module_inception)]
mod record;
mod version_key;

pub use record::{diff_attributes, Attributes, Identity, VersionedRecord, IDENTITY_FIELD};
pub use version_key::VersionKey;
