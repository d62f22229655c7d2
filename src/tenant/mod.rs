//! Tenant scoping
//!
//! The host supplies a `TenantIdSource`; `TenantFilterInjector` applies an
//! entity type's `TenantDescriptor` on attach, query build and commit.

mod injector;
mod source;

pub use injector::{TenantFilterInjector, TenantMismatchError};
pub use source::{FixedTenant, SwitchableTenant, TenantIdSource};
